//! Content blocks
//!
//! A [`ContentBlock`] is one unit of legacy content: a wiki text fragment, a
//! legacy web part, or a media element extracted from rich text. Blocks are
//! ordered solely by their [`BlockPosition`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Spacing between analyzer-assigned orders inside one zone.
///
/// Leaves room for the fragments the splitter inserts after a block.
pub const ORDER_SPACING: u32 = 1000;

/// Ordered property bag carried by blocks and web parts
pub type PropertyMap = IndexMap<String, String>;

/// Well-known block types produced by the pipeline itself
pub mod block_types {
    /// Rich text markup (wiki text, blog body, split fragments)
    pub const RICH_TEXT: &str = "RichText";
    /// Image or embed extracted from rich text
    pub const MEDIA: &str = "Media";
    /// Page title bar, never migrated
    pub const TITLE_BAR: &str = "TitleBar";
}

/// Well-known property keys
pub mod keys {
    pub const TEXT: &str = "Text";
    pub const TITLE: &str = "Title";
    pub const MEDIA_KIND: &str = "MediaKind";
    pub const IMAGE_URL: &str = "ImageUrl";
    pub const ALTERNATE_TEXT: &str = "AlternateText";
    pub const ANCHOR: &str = "Anchor";
    pub const CAPTION: &str = "Caption";
    pub const URL: &str = "Url";
    pub const WIDTH: &str = "Width";
    pub const HEIGHT: &str = "Height";
    pub const WEB_PART_ID: &str = "WebPartId";
}

/// Placement ordering key
///
/// Field order matters: the derived `Ord` compares row, then column, then order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    pub row: u32,
    pub column: u32,
    pub order: u32,
}

impl BlockPosition {
    #[inline]
    #[must_use]
    pub fn new(row: u32, column: u32, order: u32) -> Self {
        Self { row, column, order }
    }
}

/// One unit of legacy page content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Source type name, matched against the rule table
    pub block_type: String,
    /// 1-based row
    pub row: u32,
    /// 1-based column within the row
    pub column: u32,
    /// Order within `(row, column)`
    pub order: u32,
    /// Block properties used for selector input and token substitution
    #[serde(default)]
    pub properties: PropertyMap,
    /// Closed blocks are never placed
    #[serde(default)]
    pub closed: bool,
}

impl ContentBlock {
    /// Create open block at position
    #[inline]
    #[must_use]
    pub fn new(block_type: impl Into<String>, row: u32, column: u32, order: u32) -> Self {
        Self {
            block_type: block_type.into(),
            row,
            column,
            order,
            properties: PropertyMap::new(),
            closed: false,
        }
    }

    /// Rich text block holding `html` in its `Text` property
    #[must_use]
    pub fn rich_text(html: impl Into<String>, row: u32, column: u32, order: u32) -> Self {
        Self::new(block_types::RICH_TEXT, row, column, order).with_property(keys::TEXT, html)
    }

    /// Add property
    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge properties, overwriting existing keys
    #[must_use]
    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in properties {
            self.properties.insert(k.into(), v.into());
        }
        self
    }

    /// Mark block as closed
    #[inline]
    #[must_use]
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Get property value
    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Rich text markup, empty for non-text blocks
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        self.property(keys::TEXT).unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn is_rich_text(&self) -> bool {
        self.block_type == block_types::RICH_TEXT
    }

    /// Ordering key of this block
    #[inline]
    #[must_use]
    pub fn position(&self) -> BlockPosition {
        BlockPosition::new(self.row, self.column, self.order)
    }

    /// Move block to a new position, keeping type and properties
    #[inline]
    pub fn move_to(&mut self, position: BlockPosition) {
        self.row = position.row;
        self.column = position.column;
        self.order = position.order;
    }
}

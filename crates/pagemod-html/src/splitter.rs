//! Wiki HTML splitter
//!
//! Pulls images and iframes out of rich text blocks into standalone `Media`
//! blocks while keeping the surrounding markup structure intact.
//!
//! # Algorithm
//!
//! For each rich text block the markup is parsed once and media elements are
//! visited in document order:
//! - Splittable media (no table or list ancestor): the text before it becomes
//!   a `RichText` block, the media becomes a `Media` block at the next order,
//!   and the walk continues on the remaining markup.
//! - Media inside a table or list: the markup is left alone. Images are
//!   optionally copied into trailing `Media` blocks; iframes are always moved
//!   out since text surfaces cannot embed them.
//!
//! The fragment counter restarts at each original block's `order` and stays
//! below the next [`ORDER_SPACING`] step, so a block yields at most 499
//! splits. Media past that limit stay inline in the last text fragment.

use crate::dom::Fragment;
use ego_tree::NodeId;
use pagemod_model::{block_types, keys, BlockPosition, ContentBlock, ORDER_SPACING};
use serde::{Deserialize, Serialize};

/// Ancestors that cannot be split without breaking the markup
const UNSPLITTABLE: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "td", "th", "ul", "ol", "li",
];

const MEDIA_ELEMENTS: &[&str] = &["img", "iframe"];

/// Kind of extracted media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    /// iframe embed
    Embed,
}

impl MediaKind {
    fn of(element_name: &str) -> Self {
        if element_name == "iframe" {
            Self::Embed
        } else {
            Self::Image
        }
    }

    /// Value stored in the `MediaKind` property
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Embed => "Embed",
        }
    }
}

/// Splitter behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterOptions {
    /// Copy images nested in tables or lists into trailing media blocks
    #[serde(default = "default_true")]
    pub extract_nested_media: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            extract_nested_media: true,
        }
    }
}

/// Splits rich text blocks around embedded media
#[derive(Debug, Clone, Default)]
pub struct WikiHtmlSplitter {
    options: SplitterOptions,
}

impl WikiHtmlSplitter {
    #[inline]
    #[must_use]
    pub fn new(options: SplitterOptions) -> Self {
        Self { options }
    }

    /// Split every rich text block of a page
    ///
    /// Non-text and closed blocks pass through untouched. Media that could
    /// not be split out in place is appended after the page's last block.
    #[must_use]
    pub fn split(&self, blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut trailing = Vec::new();

        for block in blocks {
            if block.is_rich_text() && !block.closed {
                self.split_block(block, &mut out, &mut trailing);
            } else {
                out.push(block);
            }
        }

        if !trailing.is_empty() {
            append_trailing(&mut out, trailing);
        }
        out
    }

    fn split_block(
        &self,
        block: ContentBlock,
        out: &mut Vec<ContentBlock>,
        trailing: &mut Vec<ContentBlock>,
    ) {
        let fragment = Fragment::parse(block.text());
        let media = fragment.elements_named(MEDIA_ELEMENTS);
        if media.is_empty() {
            out.push(block);
            return;
        }

        let mut current = fragment;
        let mut counter = block.order;
        // last order before the next analyzed block
        let last_order = block.order.saturating_add(ORDER_SPACING - 1);
        let mut splits = 0usize;
        let mut left_inline = 0usize;
        let mut modified = false;

        for id in media {
            if !current.is_attached(id) {
                continue;
            }
            let Some(kind) = current.element(id).map(|e| MediaKind::of(e.value().name())) else {
                continue;
            };

            if current.has_ancestor(id, UNSPLITTABLE) {
                match kind {
                    MediaKind::Image if self.options.extract_nested_media => {
                        trailing.push(media_block(&current, id, id, kind));
                    }
                    MediaKind::Image => {}
                    MediaKind::Embed => {
                        trailing.push(media_block(&current, id, id, kind));
                        current.remove(id);
                        modified = true;
                    }
                }
                continue;
            }

            // text before, media, text after
            if counter.saturating_add(2) > last_order {
                left_inline += 1;
                continue;
            }

            let target = anchor_wrapper(&current, id).unwrap_or(id);
            let mut extracted = media_block(&current, id, target, kind);
            let (before, after) = current.split_at(target);

            emit_text(&block, before, counter, out);
            counter += 1;

            extracted.move_to(BlockPosition::new(block.row, block.column, counter));
            out.push(extracted);
            counter += 1;

            current = after;
            splits += 1;
        }

        if left_inline > 0 {
            tracing::warn!(
                row = block.row,
                column = block.column,
                splits,
                left_inline,
                "order range of block exhausted, remaining media left inline"
            );
        }

        if splits > 0 {
            emit_text(&block, current, counter, out);
            tracing::debug!(
                row = block.row,
                column = block.column,
                splits,
                "split rich text block around media"
            );
        } else if modified {
            let mut block = block;
            block
                .properties
                .insert(keys::TEXT.to_string(), current.to_html());
            out.push(block);
        } else {
            out.push(block);
        }
    }
}

/// Emit a text fragment unless the split left nothing behind
fn emit_text(original: &ContentBlock, mut fragment: Fragment, order: u32, out: &mut Vec<ContentBlock>) {
    fragment.strip_empty_wrappers();
    if fragment.is_semantically_empty() {
        return;
    }
    let mut block = original.clone();
    block.order = order;
    block
        .properties
        .insert(keys::TEXT.to_string(), fragment.to_html());
    out.push(block);
}

/// Anchor that wraps the media element and no other media
fn anchor_wrapper(fragment: &Fragment, id: NodeId) -> Option<NodeId> {
    let parent = fragment.parent_element(id)?;
    if parent.value().name() != "a" {
        return None;
    }
    let other_media = parent
        .descendants()
        .skip(1)
        .filter_map(scraper::ElementRef::wrap)
        .any(|e| e.id() != id && MEDIA_ELEMENTS.contains(&e.value().name()));
    (!other_media).then(|| parent.id())
}

/// Build a media block from the element at `id`, wrapped by `target`
fn media_block(fragment: &Fragment, id: NodeId, target: NodeId, kind: MediaKind) -> ContentBlock {
    let mut block = ContentBlock::new(block_types::MEDIA, 0, 0, 0)
        .with_property(keys::MEDIA_KIND, kind.as_str());

    if let Some(element) = fragment.element(id) {
        let value = element.value();
        let source_key = match kind {
            MediaKind::Image => keys::IMAGE_URL,
            MediaKind::Embed => keys::URL,
        };
        let attrs = [
            (source_key, value.attr("src")),
            (keys::ALTERNATE_TEXT, value.attr("alt")),
            (keys::WIDTH, value.attr("width")),
            (keys::HEIGHT, value.attr("height")),
        ];
        for (key, attr) in attrs {
            if let Some(v) = attr.map(str::trim).filter(|v| !v.is_empty()) {
                block.properties.insert(key.to_string(), v.to_string());
            }
        }
    }

    if target != id {
        if let Some(anchor) = fragment.element(target) {
            if let Some(href) = anchor.value().attr("href") {
                block.properties.insert(keys::ANCHOR.to_string(), href.to_string());
            }
            let text = fragment.text_of(target);
            let caption = match text.trim() {
                "" => anchor.value().attr("title").unwrap_or_default().trim(),
                t => t,
            };
            if !caption.is_empty() {
                block.properties.insert(keys::CAPTION.to_string(), caption.to_string());
            }
        }
    }
    block
}

/// Place trailing media after the last block on the page
fn append_trailing(out: &mut Vec<ContentBlock>, trailing: Vec<ContentBlock>) {
    let last = out
        .iter()
        .map(ContentBlock::position)
        .max()
        .unwrap_or(BlockPosition::new(1, 1, 0));

    for (offset, mut block) in (1u32..).zip(trailing) {
        block.move_to(BlockPosition::new(last.row, last.column, last.order + offset));
        out.push(block);
    }
}

//! Source pages
//!
//! What the analyzer receives: the raw page markup plus the legacy web parts
//! the page hosts, as fetched by the caller.

use crate::block::PropertyMap;
use crate::error::ModelError;
use crate::item::SourceItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Legacy page format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageType {
    /// Wiki page with rich text zones and embedded web parts
    Wiki,
    /// Web part page with zone-hosted web parts
    WebPart,
    /// Blog post
    Blog,
    /// Already a modern page
    Modern,
    /// Plain document in a pages library
    Document,
    /// Publishing page
    Publishing,
}

impl PageType {
    /// Whether the analyzer can process this page type
    #[inline]
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Wiki | Self::WebPart | Self::Blog)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wiki => "wiki",
            Self::WebPart => "webpart",
            Self::Blog => "blog",
            Self::Modern => "modern",
            Self::Document => "document",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wiki" | "wikipage" => Ok(Self::Wiki),
            "webpart" | "web-part" | "webpartpage" => Ok(Self::WebPart),
            "blog" | "blogpage" => Ok(Self::Blog),
            "modern" | "clientside" | "clientsidepage" => Ok(Self::Modern),
            "document" | "aspx" => Ok(Self::Document),
            "publishing" | "publishingpage" => Ok(Self::Publishing),
            other => Err(ModelError::UnknownPageType(other.to_string())),
        }
    }
}

/// Detected source layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutCategory {
    OneColumn,
    TwoColumns,
    TwoColumnsWithSidebar,
    TwoColumnsWithHeader,
    TwoColumnsWithHeaderAndFooter,
    ThreeColumns,
    ThreeColumnsWithHeader,
    ThreeColumnsWithHeaderAndFooter,
    FullPageVertical,
    HeaderFooterThreeColumns,
    HeaderLeftColumnBody,
    HeaderRightColumnBody,
    HeaderFooter2Columns4Rows,
    HeaderFooter4ColumnsTopRow,
    LeftColumnHeaderFooterTopRow3Columns,
    RightColumnHeaderFooterTopRow3Columns,
    /// Layout the analyzer could not classify
    Custom,
}

impl FromStr for LayoutCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let layout = match normalized.as_str() {
            "onecolumn" => Self::OneColumn,
            "twocolumns" => Self::TwoColumns,
            "twocolumnswithsidebar" => Self::TwoColumnsWithSidebar,
            "twocolumnswithheader" => Self::TwoColumnsWithHeader,
            "twocolumnswithheaderandfooter" => Self::TwoColumnsWithHeaderAndFooter,
            "threecolumns" => Self::ThreeColumns,
            "threecolumnswithheader" => Self::ThreeColumnsWithHeader,
            "threecolumnswithheaderandfooter" => Self::ThreeColumnsWithHeaderAndFooter,
            "fullpagevertical" => Self::FullPageVertical,
            "headerfooterthreecolumns" => Self::HeaderFooterThreeColumns,
            "headerleftcolumnbody" => Self::HeaderLeftColumnBody,
            "headerrightcolumnbody" => Self::HeaderRightColumnBody,
            "headerfooter2columns4rows" => Self::HeaderFooter2Columns4Rows,
            "headerfooter4columnstoprow" => Self::HeaderFooter4ColumnsTopRow,
            "leftcolumnheaderfootertoprow3columns" => Self::LeftColumnHeaderFooterTopRow3Columns,
            "rightcolumnheaderfootertoprow3columns" => Self::RightColumnHeaderFooterTopRow3Columns,
            "custom" => Self::Custom,
            _ => return Err(ModelError::UnknownLayout(s.to_string())),
        };
        Ok(layout)
    }
}

/// Legacy web part hosted on a source page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceWebPart {
    /// Web part id, referenced from wiki markup as `div_<id>`
    pub id: String,
    /// Web part type name
    pub type_name: String,
    #[serde(default)]
    pub title: String,
    /// Hosting zone on web part pages
    #[serde(default)]
    pub zone_id: String,
    /// Position inside the zone
    #[serde(default)]
    pub zone_index: u32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl SourceWebPart {
    #[must_use]
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn in_zone(mut self, zone_id: impl Into<String>, zone_index: u32) -> Self {
        self.zone_id = zone_id.into();
        self.zone_index = zone_index;
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Id normalized for lookups: lower case without braces
    #[must_use]
    pub fn normalized_id(&self) -> String {
        normalize_id(&self.id)
    }
}

/// Normalize a web part id for comparison
pub(crate) fn normalize_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_lowercase()
}

/// A legacy page ready for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    /// Page file name, e.g. `home.aspx`
    pub name: String,
    pub page_type: PageType,
    /// Wiki or blog body markup
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub web_parts: Vec<SourceWebPart>,
    /// Layout of web part pages, derived by the caller from the page template
    #[serde(default)]
    pub layout: Option<LayoutCategory>,
    /// List item backing the page
    #[serde(default)]
    pub item: SourceItem,
}

impl SourcePage {
    #[must_use]
    pub fn new(name: impl Into<String>, page_type: PageType) -> Self {
        Self {
            name: name.into(),
            page_type,
            content: None,
            web_parts: Vec::new(),
            layout: None,
            item: SourceItem::default(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_web_part(mut self, web_part: SourceWebPart) -> Self {
        self.web_parts.push(web_part);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutCategory) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn with_item(mut self, item: SourceItem) -> Self {
        self.item = item;
        self
    }

    /// Find a hosted web part by id, ignoring case and braces
    #[must_use]
    pub fn web_part(&self, id: &str) -> Option<&SourceWebPart> {
        let wanted = normalize_id(id);
        self.web_parts.iter().find(|wp| wp.normalized_id() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_parse() {
        assert_eq!("Wiki".parse::<PageType>().unwrap(), PageType::Wiki);
        assert_eq!("web-part".parse::<PageType>().unwrap(), PageType::WebPart);
        assert!("spreadsheet".parse::<PageType>().is_err());
    }

    #[test]
    fn supported_page_types() {
        assert!(PageType::Wiki.is_supported());
        assert!(PageType::Blog.is_supported());
        assert!(!PageType::Publishing.is_supported());
        assert!(!PageType::Modern.is_supported());
    }

    #[test]
    fn layout_parse_ignores_separators() {
        assert_eq!(
            "two-columns with header".parse::<LayoutCategory>().unwrap(),
            LayoutCategory::TwoColumnsWithHeader
        );
        assert!("zigzag".parse::<LayoutCategory>().is_err());
    }

    #[test]
    fn web_part_lookup_ignores_braces_and_case() {
        let page = SourcePage::new("home.aspx", PageType::Wiki)
            .with_web_part(SourceWebPart::new("{ABC-1}", "ListView"));

        assert!(page.web_part("abc-1").is_some());
        assert!(page.web_part("abc-2").is_none());
    }
}

//! Page analyzer
//!
//! Turns a [`SourcePage`] into an ordered list of [`ContentBlock`]s plus the
//! detected [`LayoutCategory`].
//!
//! - Wiki pages: rows and columns come from the `layoutsTable` markup, each
//!   cell's zone is cut into text fragments and embedded web parts.
//! - Blog pages: the body is one zone.
//! - Web part pages: web parts are positioned through a per-layout zone map.

use crate::dom::Fragment;
use crate::error::HtmlError;
use ego_tree::NodeId;
use pagemod_model::{
    block_types, keys, ContentBlock, LayoutCategory, PageType, SourcePage, SourceWebPart,
    ORDER_SPACING,
};
use scraper::ElementRef;
use std::collections::{BTreeMap, BTreeSet};

const LAYOUTS_TABLE_ID: &str = "layoutsTable";
const LAYOUTS_DATA_ID: &str = "layoutsData";
const ZONE_CLASS: &str = "ms-rte-layoutszone-inner";
const WEB_PART_BOX_CLASS: &str = "ms-rte-wpbox";
const WEB_PART_MARKER_PREFIX: &str = "div_";

/// Field holding the markup of wiki pages
pub const WIKI_FIELD: &str = "WikiField";
/// Field holding the markup of blog posts
pub const BLOG_BODY_FIELD: &str = "Body";

/// Result of analyzing one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAnalysis {
    pub layout: LayoutCategory,
    pub blocks: Vec<ContentBlock>,
}

/// Page analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAnalyzer;

impl PageAnalyzer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze a page
    ///
    /// # Errors
    /// - [`HtmlError::UnsupportedPageType`] for modern, document and publishing pages
    /// - [`HtmlError::MissingRequiredField`] for wiki or blog pages without markup
    pub fn analyze(&self, page: &SourcePage) -> Result<PageAnalysis, HtmlError> {
        let analysis = match page.page_type {
            PageType::Wiki => analyze_wiki(page)?,
            PageType::Blog => analyze_blog(page)?,
            PageType::WebPart => analyze_web_part_page(page),
            other => return Err(HtmlError::UnsupportedPageType(other)),
        };

        tracing::debug!(
            page = %page.name,
            layout = ?analysis.layout,
            blocks = analysis.blocks.len(),
            "analyzed page"
        );
        Ok(analysis)
    }
}

fn required_content<'a>(page: &'a SourcePage, field: &str) -> Result<&'a str, HtmlError> {
    page.content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| HtmlError::missing_field(&page.name, field))
}

fn analyze_wiki(page: &SourcePage) -> Result<PageAnalysis, HtmlError> {
    let content = required_content(page, WIKI_FIELD)?;
    let document = Fragment::parse(content);

    let Some(table) = find_by_id(&document, "table", LAYOUTS_TABLE_ID) else {
        return Ok(PageAnalysis {
            layout: LayoutCategory::OneColumn,
            blocks: zone_blocks(page, content, 1, 1),
        });
    };

    let rows = table_rows(&document, table);
    let mut blocks = Vec::new();
    let mut zone_rows = BTreeSet::new();
    for (row_idx, cells) in (1u32..).zip(&rows) {
        if cells.is_empty() {
            continue;
        }
        zone_rows.insert(row_idx);
        for (col_idx, cell) in (1u32..).zip(cells) {
            let zone = zone_of(&document, *cell);
            let markup = document
                .element(zone)
                .map(|e| e.inner_html())
                .unwrap_or_default();
            blocks.extend(zone_blocks(page, &markup, row_idx, col_idx));
        }
    }
    normalize_rows(&mut blocks, &zone_rows);

    let filled: Vec<&Vec<NodeId>> = rows.iter().filter(|r| !r.is_empty()).collect();
    let sidebar = filled
        .iter()
        .any(|cells| cells.len() == 2 && is_wide_cell(&document, cells[0]));
    let layout = layout_from_data(&document)
        .map(|(header, footer, columns)| classify(header, footer, columns, sidebar))
        .unwrap_or_else(|| layout_from_shape(&filled, sidebar));

    Ok(PageAnalysis { layout, blocks })
}

fn analyze_blog(page: &SourcePage) -> Result<PageAnalysis, HtmlError> {
    let content = required_content(page, BLOG_BODY_FIELD)?;
    let mut blocks = zone_blocks(page, content, 1, 1);
    normalize_rows(&mut blocks, &BTreeSet::from([1]));
    Ok(PageAnalysis {
        layout: LayoutCategory::OneColumn,
        blocks,
    })
}

fn analyze_web_part_page(page: &SourcePage) -> PageAnalysis {
    let layout = page.layout.unwrap_or(LayoutCategory::Custom);

    let mut zones: BTreeMap<(u32, u32), Vec<&SourceWebPart>> = BTreeMap::new();
    for web_part in &page.web_parts {
        let position = zone_position(layout, &web_part.zone_id);
        zones.entry(position).or_default().push(web_part);
    }

    let mut blocks = Vec::with_capacity(page.web_parts.len());
    for ((row, column), mut web_parts) in zones {
        web_parts.sort_by_key(|wp| wp.zone_index);
        for (position, web_part) in (1u32..).zip(web_parts) {
            let mut block = web_part_block(web_part);
            block.row = row;
            block.column = column;
            block.order = position * ORDER_SPACING;
            blocks.push(block);
        }
    }

    PageAnalysis { layout, blocks }
}

/// Cut one zone's markup into text fragments and web part blocks
fn zone_blocks(page: &SourcePage, markup: &str, row: u32, column: u32) -> Vec<ContentBlock> {
    let mut current = Fragment::parse(markup);
    let boxes = web_part_boxes(&current);
    let mut blocks = Vec::new();

    if boxes.is_empty() {
        if !current.is_semantically_empty() {
            blocks.push(ContentBlock::rich_text(markup.trim(), row, column, 0));
        }
    } else {
        for web_part_box in boxes {
            if !current.is_attached(web_part_box) {
                continue;
            }
            let marker = web_part_marker(&current, web_part_box);
            let (mut before, after) = current.split_at(web_part_box);

            before.strip_empty_wrappers();
            if !before.is_semantically_empty() {
                blocks.push(ContentBlock::rich_text(before.to_html(), row, column, 0));
            }

            match marker.as_deref().and_then(|id| page.web_part(id)) {
                Some(web_part) => blocks.push(web_part_block(web_part)),
                None => tracing::warn!(
                    page = %page.name,
                    marker = ?marker,
                    "embedded web part not found on page, skipping"
                ),
            }
            current = after;
        }
        current.strip_empty_wrappers();
        if !current.is_semantically_empty() {
            blocks.push(ContentBlock::rich_text(current.to_html(), row, column, 0));
        }
    }

    for (position, block) in (1u32..).zip(blocks.iter_mut()) {
        block.row = row;
        block.column = column;
        block.order = position * ORDER_SPACING;
    }
    blocks
}

fn web_part_block(web_part: &SourceWebPart) -> ContentBlock {
    let mut block = ContentBlock::new(&web_part.type_name, 1, 1, 0)
        .with_properties(web_part.properties.clone())
        .with_property(keys::TITLE, &web_part.title)
        .with_property(keys::WEB_PART_ID, web_part.normalized_id());
    if web_part.hidden || is_never_migrated(&web_part.type_name) {
        block = block.closed();
    }
    block
}

/// Web part types that have no counterpart on modern pages
fn is_never_migrated(type_name: &str) -> bool {
    type_name == block_types::TITLE_BAR || type_name.ends_with("TitleBarWebPart")
}

/// Collapse gaps in row numbering onto `1..=n`
fn normalize_rows(blocks: &mut [ContentBlock], rows: &BTreeSet<u32>) {
    let ranks: BTreeMap<u32, u32> = rows.iter().copied().zip(1u32..).collect();
    for block in blocks {
        if let Some(rank) = ranks.get(&block.row) {
            block.row = *rank;
        }
    }
}

fn classify(header: bool, footer: bool, columns: usize, sidebar: bool) -> LayoutCategory {
    match (columns, header, footer) {
        (1, _, _) => LayoutCategory::OneColumn,
        (2, false, false) if sidebar => LayoutCategory::TwoColumnsWithSidebar,
        (2, false, false) => LayoutCategory::TwoColumns,
        (2, true, false) => LayoutCategory::TwoColumnsWithHeader,
        (2, true, true) => LayoutCategory::TwoColumnsWithHeaderAndFooter,
        (3, false, false) => LayoutCategory::ThreeColumns,
        (3, true, false) => LayoutCategory::ThreeColumnsWithHeader,
        (3, true, true) => LayoutCategory::ThreeColumnsWithHeaderAndFooter,
        _ => LayoutCategory::Custom,
    }
}

/// Parse the hidden `header,footer,columns` layout marker
fn layout_from_data(document: &Fragment) -> Option<(bool, bool, usize)> {
    let span = find_by_id(document, "span", LAYOUTS_DATA_ID)?;
    let text = document.text_of(span);
    let mut parts = text.split(',').map(str::trim);
    let header = parts.next()?.eq_ignore_ascii_case("true");
    let footer = parts.next()?.eq_ignore_ascii_case("true");
    let columns = parts.next()?.parse().ok()?;
    Some((header, footer, columns))
}

fn layout_from_shape(rows: &[&Vec<NodeId>], sidebar: bool) -> LayoutCategory {
    let header = rows.len() > 1 && rows[0].len() == 1;
    let footer = rows.len() > 2 && rows[rows.len() - 1].len() == 1;
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(1);
    classify(header, footer, columns, sidebar)
}

fn find_by_id(document: &Fragment, tag: &str, id: &str) -> Option<NodeId> {
    document.elements_named(&[tag]).into_iter().find(|node| {
        document
            .element(*node)
            .and_then(|e| e.value().id())
            .is_some_and(|v| v.eq_ignore_ascii_case(id))
    })
}

/// Cells of each direct row of `table`, rows kept even when cell-less
fn table_rows(document: &Fragment, table: NodeId) -> Vec<Vec<NodeId>> {
    let Some(table) = document.element(table) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }

    rows.into_iter()
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|e| matches!(e.value().name(), "td" | "th"))
                .map(|e| e.id())
                .collect()
        })
        .collect()
}

/// Zone container inside a layout cell, or the cell itself
fn zone_of(document: &Fragment, cell: NodeId) -> NodeId {
    document
        .element(cell)
        .and_then(|cell| {
            cell.descendants()
                .filter_map(ElementRef::wrap)
                .find(|e| has_class(e, ZONE_CLASS))
                .map(|e| e.id())
        })
        .unwrap_or(cell)
}

fn is_wide_cell(document: &Fragment, cell: NodeId) -> bool {
    document
        .element(cell)
        .and_then(|e| e.value().attr("style"))
        .is_some_and(|style| {
            let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            compact.contains("width:66")
        })
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .classes()
        .any(|c| c.eq_ignore_ascii_case(class))
}

/// Outermost web part boxes in document order
fn web_part_boxes(document: &Fragment) -> Vec<NodeId> {
    document
        .elements_named(&["div"])
        .into_iter()
        .filter(|id| document.element(*id).is_some_and(|e| has_class(&e, WEB_PART_BOX_CLASS)))
        .filter(|id| {
            document.element(*id).is_some_and(|e| {
                !e.ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|a| has_class(&a, WEB_PART_BOX_CLASS))
            })
        })
        .collect()
}

/// Web part id referenced by a box's `div_<id>` marker
fn web_part_marker(document: &Fragment, web_part_box: NodeId) -> Option<String> {
    let element = document.element(web_part_box)?;
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|e| {
            e.value()
                .id()
                .and_then(|id| id.strip_prefix(WEB_PART_MARKER_PREFIX))
                .or_else(|| e.value().attr("webpartid"))
                .map(str::to_string)
        })
}

/// Row and column of a web part page zone
fn zone_position(layout: LayoutCategory, zone_id: &str) -> (u32, u32) {
    use LayoutCategory as L;

    let zone: String = zone_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();

    let map: &[(&str, u32, u32)] = match layout {
        L::FullPageVertical => &[("fullpage", 1, 1)],
        L::HeaderFooterThreeColumns => &[
            ("header", 1, 1),
            ("leftcolumn", 2, 1),
            ("middlecolumn", 2, 2),
            ("rightcolumn", 2, 3),
            ("footer", 3, 1),
        ],
        L::HeaderLeftColumnBody => &[("header", 1, 1), ("leftcolumn", 2, 1), ("body", 2, 2)],
        L::HeaderRightColumnBody => &[("header", 1, 1), ("body", 2, 1), ("rightcolumn", 2, 2)],
        L::HeaderFooter2Columns4Rows => &[
            ("header", 1, 1),
            ("leftcolumn", 2, 1),
            ("rightcolumn", 2, 2),
            ("centerleftcolumn", 3, 1),
            ("centerrightcolumn", 3, 2),
            ("footer", 4, 1),
        ],
        L::HeaderFooter4ColumnsTopRow => &[
            ("header", 1, 1),
            ("toprow", 2, 1),
            ("leftcolumn", 3, 1),
            ("centerleftcolumn", 3, 2),
            ("centerrightcolumn", 3, 2),
            ("rightcolumn", 3, 3),
            ("footer", 4, 1),
        ],
        L::LeftColumnHeaderFooterTopRow3Columns => &[
            ("header", 1, 1),
            ("leftcolumn", 2, 1),
            ("toprow", 2, 2),
            ("centerleftcolumn", 3, 1),
            ("centercolumn", 3, 2),
            ("centerrightcolumn", 3, 3),
            ("footer", 4, 1),
        ],
        L::RightColumnHeaderFooterTopRow3Columns => &[
            ("header", 1, 1),
            ("toprow", 2, 1),
            ("rightcolumn", 2, 2),
            ("centerleftcolumn", 3, 1),
            ("centercolumn", 3, 2),
            ("centerrightcolumn", 3, 3),
            ("footer", 4, 1),
        ],
        _ => &[],
    };

    map.iter()
        .find(|(name, _, _)| *name == zone)
        .map_or((1, 1), |(_, row, column)| (*row, *column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemod_model::SourceWebPart;
    use pretty_assertions::assert_eq;

    fn wiki(content: &str) -> SourcePage {
        SourcePage::new("home.aspx", PageType::Wiki).with_content(content)
    }

    fn layout_table(data: &str, rows: &[&[&str]]) -> String {
        let mut html = String::from("<table id=\"layoutsTable\"><tbody>");
        for cells in rows {
            html.push_str("<tr>");
            for cell in *cells {
                html.push_str(&format!(
                    "<td><div class=\"ms-rte-layoutszone-outer\"><div class=\"ms-rte-layoutszone-inner\">{cell}</div></div></td>"
                ));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
        html.push_str(&format!("<span id=\"layoutsData\" style=\"display:none\">{data}</span>"));
        html
    }

    fn positions(blocks: &[ContentBlock]) -> Vec<(String, u32, u32, u32)> {
        blocks
            .iter()
            .map(|b| (b.block_type.clone(), b.row, b.column, b.order))
            .collect()
    }

    #[test]
    fn unsupported_page_types_fail() {
        let analyzer = PageAnalyzer::new();
        for page_type in [PageType::Modern, PageType::Document, PageType::Publishing] {
            let err = analyzer
                .analyze(&SourcePage::new("p.aspx", page_type))
                .unwrap_err();
            assert_eq!(err, HtmlError::UnsupportedPageType(page_type));
        }
    }

    #[test]
    fn wiki_without_content_is_missing_field() {
        let err = PageAnalyzer::new()
            .analyze(&SourcePage::new("p.aspx", PageType::Wiki))
            .unwrap_err();
        assert!(matches!(err, HtmlError::MissingRequiredField { .. }));
    }

    #[test]
    fn wiki_without_layout_table_is_one_zone() {
        let analysis = PageAnalyzer::new().analyze(&wiki("<p>Hello</p>")).unwrap();

        assert_eq!(analysis.layout, LayoutCategory::OneColumn);
        assert_eq!(
            positions(&analysis.blocks),
            vec![("RichText".to_string(), 1, 1, 1000)]
        );
    }

    #[test]
    fn wiki_two_columns_with_header() {
        let content = layout_table(
            "true,false,2",
            &[&["<p>head</p>"], &["<p>left</p>", "<p>right</p>"]],
        );
        let analysis = PageAnalyzer::new().analyze(&wiki(&content)).unwrap();

        assert_eq!(analysis.layout, LayoutCategory::TwoColumnsWithHeader);
        assert_eq!(
            positions(&analysis.blocks),
            vec![
                ("RichText".to_string(), 1, 1, 1000),
                ("RichText".to_string(), 2, 1, 1000),
                ("RichText".to_string(), 2, 2, 1000),
            ]
        );
        assert_eq!(analysis.blocks[2].text(), "<p>right</p>");
    }

    #[test]
    fn layout_inferred_from_shape_without_marker() {
        let content = "<table id=\"layoutsTable\"><tbody>\
            <tr><td>h</td></tr>\
            <tr><td>a</td><td>b</td><td>c</td></tr>\
            <tr><td>f</td></tr></tbody></table>";
        let analysis = PageAnalyzer::new().analyze(&wiki(content)).unwrap();
        assert_eq!(analysis.layout, LayoutCategory::ThreeColumnsWithHeaderAndFooter);
    }

    #[test]
    fn sidebar_detected_from_cell_width() {
        let content = "<table id=\"layoutsTable\"><tbody><tr>\
            <td style=\"width: 66.6%\">main</td><td style=\"width:33.3%\">side</td>\
            </tr></tbody></table><span id=\"layoutsData\">false,false,2</span>";
        let analysis = PageAnalyzer::new().analyze(&wiki(content)).unwrap();
        assert_eq!(analysis.layout, LayoutCategory::TwoColumnsWithSidebar);
    }

    #[test]
    fn cell_less_rows_are_collapsed() {
        let content = "<table id=\"layoutsTable\"><tbody>\
            <tr></tr><tr><td>a</td></tr></tbody></table>";
        let analysis = PageAnalyzer::new().analyze(&wiki(content)).unwrap();
        assert_eq!(analysis.blocks[0].row, 1);
    }

    #[test]
    fn embedded_web_parts_split_zone_text() {
        let content = "<p>before</p>\
            <div class=\"ms-rte-wpbox\"><div class=\"ms-rtestate-notify\" id=\"div_{ABC}\"></div></div>\
            <p>after</p>";
        let page = wiki(content).with_web_part(
            SourceWebPart::new("abc", "XsltListViewWebPart")
                .with_title("Documents")
                .with_property("ListId", "42"),
        );
        let analysis = PageAnalyzer::new().analyze(&page).unwrap();

        assert_eq!(
            positions(&analysis.blocks),
            vec![
                ("RichText".to_string(), 1, 1, 1000),
                ("XsltListViewWebPart".to_string(), 1, 1, 2000),
                ("RichText".to_string(), 1, 1, 3000),
            ]
        );
        let web_part = &analysis.blocks[1];
        assert_eq!(web_part.property("Title"), Some("Documents"));
        assert_eq!(web_part.property("ListId"), Some("42"));
        assert_eq!(analysis.blocks[2].text(), "<p>after</p>");
    }

    #[test]
    fn unknown_embedded_web_part_is_skipped() {
        let content = "<p>x</p><div class=\"ms-rte-wpbox\"><div id=\"div_missing\"></div></div>";
        let analysis = PageAnalyzer::new().analyze(&wiki(content)).unwrap();
        assert_eq!(analysis.blocks.len(), 1);
        assert_eq!(analysis.blocks[0].text(), "<p>x</p>");
    }

    #[test]
    fn web_part_page_uses_zone_map_without_normalizing() {
        let page = SourcePage::new("default.aspx", PageType::WebPart)
            .with_layout(LayoutCategory::HeaderFooterThreeColumns)
            .with_web_part(SourceWebPart::new("1", "ContentEditor").in_zone("Footer", 0))
            .with_web_part(SourceWebPart::new("2", "ListView").in_zone("RightColumn", 1))
            .with_web_part(SourceWebPart::new("3", "Image").in_zone("RightColumn", 0))
            .with_web_part(SourceWebPart::new("4", "TitleBarWebPart").in_zone("Header", 0));
        let analysis = PageAnalyzer::new().analyze(&page).unwrap();

        assert_eq!(
            positions(&analysis.blocks),
            vec![
                ("TitleBarWebPart".to_string(), 1, 1, 1000),
                ("Image".to_string(), 2, 3, 1000),
                ("ListView".to_string(), 2, 3, 2000),
                ("ContentEditor".to_string(), 3, 1, 1000),
            ]
        );
        assert!(analysis.blocks[0].closed);
    }

    #[test]
    fn hidden_web_parts_are_closed() {
        let page = SourcePage::new("default.aspx", PageType::WebPart)
            .with_web_part(SourceWebPart::new("1", "ListView").hidden());
        let analysis = PageAnalyzer::new().analyze(&page).unwrap();
        assert_eq!(analysis.layout, LayoutCategory::Custom);
        assert!(analysis.blocks[0].closed);
    }

    #[test]
    fn blog_is_single_zone() {
        let page = SourcePage::new("post.aspx", PageType::Blog).with_content("<p>post</p>");
        let analysis = PageAnalyzer::new().analyze(&page).unwrap();
        assert_eq!(analysis.layout, LayoutCategory::OneColumn);
        assert_eq!(analysis.blocks.len(), 1);
    }
}

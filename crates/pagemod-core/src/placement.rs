//! Content placement engine
//!
//! Places resolved blocks onto the target canvas.
//!
//! # Algorithm
//!
//! 1. One section per layout template; rows past the last template append
//!    one-column sections
//! 2. Blocks are placed in `(row, column, order)` order. Each block reads
//!    the highest order already in its target column and numbers its
//!    outputs upwards from there, so orders never collide
//! 3. Columns past a section's width fall into its last column
//! 4. Components resolve against the target catalog by id or title
//! 5. Cleanup: empty text controls go, then empty sections, then empty
//!    columns, with the remaining columns re-spread over the full width

use crate::stage::Place;
use pagemod_html::is_semantically_empty;
use pagemod_model::{BlockPosition, Control, Section, SectionTemplate};
use pagemod_rules::{ResolvedBlock, ResolvedOutput, SkipReason};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Component available on the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: String,
    pub title: String,
}

impl ComponentDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    /// Whether `key` names this component by id or title
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        trim_braces(&self.id).eq_ignore_ascii_case(trim_braces(key))
            || self.title.eq_ignore_ascii_case(key)
    }
}

fn trim_braces(id: &str) -> &str {
    id.trim().trim_start_matches('{').trim_end_matches('}')
}

/// Components installed on the target
pub trait ComponentCatalog: Send + Sync {
    fn components(&self) -> Vec<ComponentDefinition>;
}

impl ComponentCatalog for Vec<ComponentDefinition> {
    fn components(&self) -> Vec<ComponentDefinition> {
        self.clone()
    }
}

/// Output that did not make it onto the canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedOutput {
    pub position: BlockPosition,
    pub reason: SkipReason,
}

/// Placed canvas
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Placement {
    pub sections: Vec<Section>,
    pub dropped: Vec<DroppedOutput>,
}

impl Placement {
    /// Total controls across all sections
    #[must_use]
    pub fn control_count(&self) -> usize {
        self.sections.iter().map(Section::control_count).sum()
    }
}

/// Default placement stage
///
/// Without a catalog, component outputs are placed with their key as both
/// id and title.
#[derive(Clone, Default)]
pub struct ContentPlacement {
    catalog: Option<Arc<dyn ComponentCatalog>>,
}

impl std::fmt::Debug for ContentPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentPlacement")
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

impl ContentPlacement {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn ComponentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Place `blocks` into sections built from `templates`
    #[must_use]
    pub fn place_blocks(&self, templates: &[SectionTemplate], blocks: &[ResolvedBlock]) -> Placement {
        let mut sections: Vec<Section> = templates
            .iter()
            .zip(1..)
            .map(|(template, order)| Section::new(order, *template))
            .collect();
        if sections.is_empty() {
            sections.push(Section::new(1, SectionTemplate::OneColumn));
        }

        let catalog = self.catalog.as_ref().map(|c| c.components());
        let mut dropped = Vec::new();

        let mut ordered: Vec<&ResolvedBlock> = blocks.iter().collect();
        ordered.sort_by_key(|b| b.position);

        for block in ordered {
            let row = block.position.row.max(1) as usize - 1;
            while sections.len() <= row {
                let order = sections.len() as u32 + 1;
                sections.push(Section::new(order, SectionTemplate::OneColumn));
            }
            let section = &mut sections[row];
            let last = section.columns.len() - 1;
            let column = &mut section.columns[(block.position.column.max(1) as usize - 1).min(last)];

            let mut next = column.max_order().unwrap_or(0);
            for output in &block.outputs {
                let control = match output {
                    ResolvedOutput::Text { html, .. } => Control::text(next + 1, html.clone()),
                    ResolvedOutput::Component { component, data, .. } => {
                        match lookup_component(catalog.as_deref(), component) {
                            Some(def) => Control::component(next + 1, def.id, def.title, data.clone()),
                            None => {
                                tracing::warn!(
                                    component = %component,
                                    source_type = %block.source_type,
                                    "component not available on target, dropping control"
                                );
                                dropped.push(DroppedOutput {
                                    position: block.position,
                                    reason: SkipReason::UnknownComponent(component.clone()),
                                });
                                continue;
                            }
                        }
                    }
                };
                next += 1;
                column.insert(control);
            }
        }

        let sections = cleanup(sections);
        tracing::debug!(sections = sections.len(), dropped = dropped.len(), "content placed");
        Placement { sections, dropped }
    }
}

impl Place for ContentPlacement {
    fn place(&self, templates: &[SectionTemplate], blocks: &[ResolvedBlock]) -> Placement {
        self.place_blocks(templates, blocks)
    }
}

fn lookup_component(catalog: Option<&[ComponentDefinition]>, key: &str) -> Option<ComponentDefinition> {
    match catalog {
        Some(components) => components.iter().find(|c| c.matches(key)).cloned(),
        None => Some(ComponentDefinition::new(key, key)),
    }
}

fn cleanup(sections: Vec<Section>) -> Vec<Section> {
    let mut kept: Vec<Section> = sections
        .into_iter()
        .map(|mut section| {
            for column in &mut section.columns {
                column
                    .controls
                    .retain(|c| c.html().map_or(true, |html| !is_semantically_empty(html)));
            }
            section
        })
        .filter(|section| !section.is_empty())
        .collect();

    for section in &mut kept {
        collapse_empty_columns(section);
    }
    for (section, order) in kept.iter_mut().zip(1..) {
        section.order = order;
    }
    kept
}

/// Drop empty columns of multi-column sections
fn collapse_empty_columns(section: &mut Section) {
    if section.columns.len() < 2 || section.columns.iter().all(|c| !c.is_empty()) {
        return;
    }
    section.columns.retain(|c| !c.is_empty());
    if let Some(template) = SectionTemplate::for_column_count(section.columns.len()) {
        tracing::debug!(from = ?section.template, to = ?template, "collapsed empty columns");
        section.retemplate(template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text_block(row: u32, column: u32, order: u32, html: &[&str]) -> ResolvedBlock {
        ResolvedBlock {
            position: BlockPosition::new(row, column, order),
            source_type: "RichText".to_string(),
            variant: None,
            outputs: html
                .iter()
                .zip(1..)
                .map(|(h, o)| ResolvedOutput::Text {
                    order: o,
                    html: (*h).to_string(),
                })
                .collect(),
        }
    }

    fn component_block(row: u32, column: u32, order: u32, component: &str) -> ResolvedBlock {
        ResolvedBlock {
            position: BlockPosition::new(row, column, order),
            source_type: "ListView".to_string(),
            variant: None,
            outputs: vec![ResolvedOutput::Component {
                order: 1,
                component: component.to_string(),
                data: json!({"list": "Docs"}),
            }],
        }
    }

    fn htmls(section: &Section, column: usize) -> Vec<(u32, String)> {
        section.columns[column]
            .controls
            .iter()
            .map(|c| (c.order, c.html().unwrap_or("<component>").to_string()))
            .collect()
    }

    #[test]
    fn places_in_position_order_with_increasing_orders() {
        let blocks = vec![
            text_block(1, 1, 2000, &["<p>second</p>"]),
            text_block(1, 1, 1000, &["<p>first</p>", "<p>first b</p>"]),
        ];
        let placement = ContentPlacement::new().place_blocks(&[SectionTemplate::OneColumn], &blocks);

        assert_eq!(
            htmls(&placement.sections[0], 0),
            vec![
                (1, "<p>first</p>".to_string()),
                (2, "<p>first b</p>".to_string()),
                (3, "<p>second</p>".to_string()),
            ]
        );
    }

    #[test]
    fn extra_rows_and_columns_are_absorbed() {
        let blocks = vec![
            text_block(1, 3, 1000, &["<p>overflow</p>"]),
            text_block(1, 1, 1000, &["<p>left</p>"]),
            text_block(3, 1, 1000, &["<p>row three</p>"]),
        ];
        let placement = ContentPlacement::new().place_blocks(&[SectionTemplate::TwoColumn], &blocks);

        assert_eq!(placement.sections.len(), 2);
        assert_eq!(placement.sections[0].template, SectionTemplate::TwoColumn);
        assert_eq!(htmls(&placement.sections[0], 1), vec![(1, "<p>overflow</p>".to_string())]);
        // the empty second row is dropped and the third renumbered
        assert_eq!(placement.sections[1].order, 2);
        assert_eq!(placement.sections[1].template, SectionTemplate::OneColumn);
    }

    #[test]
    fn empty_text_and_sections_are_removed() {
        let blocks = vec![
            text_block(1, 1, 1000, &["<p>&nbsp;</p>", "<div><br/></div>"]),
            text_block(2, 1, 1000, &["<p>kept</p>"]),
        ];
        let placement = ContentPlacement::new()
            .place_blocks(&[SectionTemplate::OneColumn, SectionTemplate::OneColumn], &blocks);

        assert_eq!(placement.sections.len(), 1);
        assert_eq!(placement.sections[0].order, 1);
        assert_eq!(htmls(&placement.sections[0], 0), vec![(1, "<p>kept</p>".to_string())]);
    }

    #[test]
    fn three_columns_with_one_empty_collapse_to_two() {
        let blocks = vec![
            text_block(1, 1, 1000, &["<p>a</p>"]),
            text_block(1, 3, 1000, &["<p>c</p>"]),
        ];
        let placement = ContentPlacement::new().place_blocks(&[SectionTemplate::ThreeColumn], &blocks);

        let section = &placement.sections[0];
        assert_eq!(section.template, SectionTemplate::TwoColumn);
        assert_eq!(section.columns.iter().map(|c| c.factor).collect::<Vec<_>>(), vec![6, 6]);
        assert_eq!(htmls(section, 1), vec![(1, "<p>c</p>".to_string())]);
    }

    #[test]
    fn sidebar_with_empty_side_becomes_one_column() {
        let blocks = vec![text_block(1, 1, 1000, &["<p>body</p>"])];
        let placement = ContentPlacement::new().place_blocks(&[SectionTemplate::TwoColumnLeft], &blocks);

        let section = &placement.sections[0];
        assert_eq!(section.template, SectionTemplate::OneColumn);
        assert_eq!(section.columns[0].factor, 12);
    }

    #[test]
    fn components_resolve_by_id_or_title() {
        let catalog: Arc<dyn ComponentCatalog> = Arc::new(vec![
            ComponentDefinition::new("{F92BF067-BC19-489E-A556-7FE95F508720}", "List"),
            ComponentDefinition::new("490d7c76-1824-45b2-9de3-676421c997fa", "Embed"),
        ]);
        let blocks = vec![
            component_block(1, 1, 1000, "list"),
            component_block(1, 1, 2000, "490D7C76-1824-45B2-9DE3-676421C997FA"),
            component_block(1, 1, 3000, "Hero"),
        ];
        let placement = ContentPlacement::new()
            .with_catalog(catalog)
            .place_blocks(&[SectionTemplate::OneColumn], &blocks);

        let controls = &placement.sections[0].columns[0].controls;
        assert_eq!(controls.len(), 2);
        assert_eq!(
            controls[0],
            Control::component(1, "{F92BF067-BC19-489E-A556-7FE95F508720}", "List", json!({"list": "Docs"}))
        );
        assert_eq!(controls[1].order, 2);
        assert_eq!(
            placement.dropped,
            vec![DroppedOutput {
                position: BlockPosition::new(1, 1, 3000),
                reason: SkipReason::UnknownComponent("Hero".to_string()),
            }]
        );
    }

    #[test]
    fn no_templates_still_yields_a_section() {
        let blocks = vec![text_block(1, 1, 1000, &["<p>x</p>"])];
        let placement = ContentPlacement::new().place_blocks(&[], &blocks);
        assert_eq!(placement.sections.len(), 1);
        assert_eq!(placement.control_count(), 1);
    }
}

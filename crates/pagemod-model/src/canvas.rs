//! Modern page canvas
//!
//! Sections hold columns, columns hold ordered controls. A section's column
//! count always matches its [`SectionTemplate`].

use serde::{Deserialize, Serialize};

/// Total width of a section in grid units
pub const GRID_WIDTH: u8 = 12;

/// Section shape on the target page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionTemplate {
    OneColumn,
    TwoColumn,
    /// Wide left column, narrow right column
    TwoColumnLeft,
    /// Narrow left column, wide right column
    TwoColumnRight,
    ThreeColumn,
    OneColumnFullWidth,
}

impl SectionTemplate {
    /// Column widths in grid units, left to right
    #[must_use]
    pub fn column_factors(self) -> &'static [u8] {
        match self {
            Self::OneColumn | Self::OneColumnFullWidth => &[12],
            Self::TwoColumn => &[6, 6],
            Self::TwoColumnLeft => &[8, 4],
            Self::TwoColumnRight => &[4, 8],
            Self::ThreeColumn => &[4, 4, 4],
        }
    }

    #[inline]
    #[must_use]
    pub fn column_count(self) -> usize {
        self.column_factors().len()
    }

    /// Evenly split template for `columns` columns
    ///
    /// Returns `None` for widths the canvas cannot express.
    #[must_use]
    pub fn for_column_count(columns: usize) -> Option<Self> {
        match columns {
            1 => Some(Self::OneColumn),
            2 => Some(Self::TwoColumn),
            3 => Some(Self::ThreeColumn),
            _ => None,
        }
    }
}

/// Control payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlKind {
    /// Rich text control
    Text { html: String },
    /// Component (web part) control
    Component {
        /// Component id from the target catalog
        component_id: String,
        /// Catalog title
        title: String,
        /// Component configuration
        data: serde_json::Value,
    },
}

/// One ordered control inside a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub order: u32,
    #[serde(flatten)]
    pub kind: ControlKind,
}

impl Control {
    /// Text control
    #[inline]
    #[must_use]
    pub fn text(order: u32, html: impl Into<String>) -> Self {
        Self {
            order,
            kind: ControlKind::Text { html: html.into() },
        }
    }

    /// Component control
    #[inline]
    #[must_use]
    pub fn component(
        order: u32,
        component_id: impl Into<String>,
        title: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            order,
            kind: ControlKind::Component {
                component_id: component_id.into(),
                title: title.into(),
                data,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ControlKind::Text { .. })
    }

    /// Markup of a text control
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match &self.kind {
            ControlKind::Text { html } => Some(html),
            ControlKind::Component { .. } => None,
        }
    }
}

/// Column of a section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Column {
    /// Width in grid units
    pub factor: u8,
    pub controls: Vec<Control>,
}

impl Column {
    #[inline]
    #[must_use]
    pub fn new(factor: u8) -> Self {
        Self {
            factor,
            controls: Vec::new(),
        }
    }

    /// Highest control order in this column
    #[inline]
    #[must_use]
    pub fn max_order(&self) -> Option<u32> {
        self.controls.iter().map(|c| c.order).max()
    }

    /// Insert control keeping controls sorted by order
    pub fn insert(&mut self, control: Control) {
        let idx = self.controls.partition_point(|c| c.order <= control.order);
        self.controls.insert(idx, control);
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

/// Section of the target page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// 1-based position on the page
    pub order: u32,
    pub template: SectionTemplate,
    pub columns: Vec<Column>,
}

impl Section {
    /// Create empty section with the template's columns
    #[must_use]
    pub fn new(order: u32, template: SectionTemplate) -> Self {
        Self {
            order,
            template,
            columns: template
                .column_factors()
                .iter()
                .map(|f| Column::new(*f))
                .collect(),
        }
    }

    /// Total number of controls across columns
    #[must_use]
    pub fn control_count(&self) -> usize {
        self.columns.iter().map(|c| c.controls.len()).sum()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.control_count() == 0
    }

    /// Switch template, re-normalizing column widths
    ///
    /// The caller guarantees the column count already matches `template`.
    pub fn retemplate(&mut self, template: SectionTemplate) {
        debug_assert_eq!(self.columns.len(), template.column_count());
        self.template = template;
        for (column, factor) in self.columns.iter_mut().zip(template.column_factors()) {
            column.factor = *factor;
        }
    }

    /// Iterate all controls in column order
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.columns.iter().flat_map(|c| c.controls.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_factors_fill_grid() {
        for template in [
            SectionTemplate::OneColumn,
            SectionTemplate::TwoColumn,
            SectionTemplate::TwoColumnLeft,
            SectionTemplate::TwoColumnRight,
            SectionTemplate::ThreeColumn,
            SectionTemplate::OneColumnFullWidth,
        ] {
            let total: u8 = template.column_factors().iter().sum();
            assert_eq!(total, GRID_WIDTH, "{template:?}");
        }
    }

    #[test]
    fn section_columns_match_template() {
        let section = Section::new(1, SectionTemplate::ThreeColumn);
        assert_eq!(section.columns.len(), 3);
        assert!(section.is_empty());
    }

    #[test]
    fn column_insert_keeps_order() {
        let mut column = Column::new(12);
        column.insert(Control::text(3, "c"));
        column.insert(Control::text(1, "a"));
        column.insert(Control::text(2, "b"));

        let orders: Vec<_> = column.controls.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(column.max_order(), Some(3));
    }

    #[test]
    fn retemplate_renormalizes_factors() {
        let mut section = Section::new(1, SectionTemplate::TwoColumnLeft);
        section.retemplate(SectionTemplate::TwoColumn);
        assert_eq!(section.columns[0].factor, 6);
        assert_eq!(section.columns[1].factor, 6);
    }

    #[test]
    fn control_serializes_with_kind_tag() {
        let control = Control::text(1, "<p>x</p>");
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["order"], 1);
    }
}

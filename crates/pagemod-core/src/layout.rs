//! Layout transformator
//!
//! Maps a detected source layout onto the ordered section templates of the
//! target page. Rows the layout does not account for are appended by
//! placement as one-column sections.

use crate::stage::Layout;
use pagemod_model::{LayoutCategory, SectionTemplate};

/// Built-in layout table
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutTransformator;

impl LayoutTransformator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Section templates for `layout`, top to bottom
    #[must_use]
    pub fn templates_for(layout: LayoutCategory) -> Vec<SectionTemplate> {
        use LayoutCategory as L;
        use SectionTemplate::{OneColumn as One, ThreeColumn as Three, TwoColumn as Two};
        use SectionTemplate::{TwoColumnLeft as WideLeft, TwoColumnRight as WideRight};

        match layout {
            L::OneColumn | L::FullPageVertical | L::Custom => vec![One],
            L::TwoColumns => vec![Two],
            L::TwoColumnsWithSidebar => vec![WideLeft],
            L::TwoColumnsWithHeader => vec![One, Two],
            L::TwoColumnsWithHeaderAndFooter => vec![One, Two, One],
            L::ThreeColumns => vec![Three],
            L::ThreeColumnsWithHeader => vec![One, Three],
            L::ThreeColumnsWithHeaderAndFooter | L::HeaderFooterThreeColumns => {
                vec![One, Three, One]
            }
            L::HeaderLeftColumnBody => vec![One, WideRight],
            L::HeaderRightColumnBody => vec![One, WideLeft],
            L::HeaderFooter2Columns4Rows => vec![One, Two, Two, One],
            L::HeaderFooter4ColumnsTopRow => vec![One, One, Three, One],
            L::LeftColumnHeaderFooterTopRow3Columns => vec![One, WideRight, Three, One],
            L::RightColumnHeaderFooterTopRow3Columns => vec![One, WideLeft, Three, One],
        }
    }
}

impl Layout for LayoutTransformator {
    fn templates(&self, layout: LayoutCategory) -> Vec<SectionTemplate> {
        let templates = Self::templates_for(layout);
        tracing::debug!(?layout, sections = templates.len(), "layout mapped");
        templates
    }
}

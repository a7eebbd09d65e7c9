//! Pipeline stage traits
//!
//! Each stage of [`crate::PageTransformator`] sits behind one of these
//! traits so callers can swap a single stage without touching the rest.
//! The default implementations are the analyzer, splitter and resolver of
//! the sibling crates plus [`crate::LayoutTransformator`],
//! [`crate::ContentPlacement`] and [`crate::PostProcessor`].

use crate::placement::Placement;
use crate::postprocess::PostProcessReport;
use pagemod_html::{HtmlError, PageAnalysis, PageAnalyzer, WikiHtmlSplitter};
use pagemod_model::{ContentBlock, LayoutCategory, SectionTemplate, SourcePage};
use pagemod_rules::{FunctionEnv, MappingResolver, Outcome, ResolvedBlock};

/// Source page to positioned content blocks
pub trait Analyze: Send + Sync {
    fn analyze(&self, page: &SourcePage) -> Result<PageAnalysis, HtmlError>;
}

/// Rich text blocks to text and media fragments
pub trait Split: Send + Sync {
    fn split(&self, blocks: Vec<ContentBlock>) -> Vec<ContentBlock>;
}

/// Content block to rule outputs
pub trait Resolve: Send + Sync {
    fn resolve(&self, block: &ContentBlock, env: &FunctionEnv) -> pagemod_rules::Result<Outcome>;
}

/// Source layout to target section templates
pub trait Layout: Send + Sync {
    fn templates(&self, layout: LayoutCategory) -> Vec<SectionTemplate>;
}

/// Resolved blocks to the target canvas
pub trait Place: Send + Sync {
    fn place(&self, templates: &[SectionTemplate], blocks: &[ResolvedBlock]) -> Placement;
}

/// Item metadata and permissions after the page is persisted
pub trait PostProcess: Send + Sync {
    fn post_process(&self, source: &SourcePage, target_page: &str) -> PostProcessReport;
}

impl Analyze for PageAnalyzer {
    fn analyze(&self, page: &SourcePage) -> Result<PageAnalysis, HtmlError> {
        PageAnalyzer::analyze(self, page)
    }
}

impl Split for WikiHtmlSplitter {
    fn split(&self, blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
        WikiHtmlSplitter::split(self, blocks)
    }
}

impl Resolve for MappingResolver {
    fn resolve(&self, block: &ContentBlock, env: &FunctionEnv) -> pagemod_rules::Result<Outcome> {
        MappingResolver::resolve(self, block, env)
    }
}

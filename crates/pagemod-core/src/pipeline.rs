//! Page transformation orchestrator
//!
//! [`PageTransformator`] wires the stages together and owns no
//! transformation logic itself:
//!
//! ```text
//! analyze → split → resolve → layout → place → persist → post-process
//! ```
//!
//! Every run gets a fresh correlation id, carried on a `transform_page`
//! span and in every observer message. Configuration errors stop the run;
//! page errors stop the page.

use crate::config::TransformConfig;
use crate::error::{ConfigError, PageError, TransformError, WriteError};
use crate::layout::LayoutTransformator;
use crate::observer::{Diagnostics, ObserverSink};
use crate::placement::{ComponentCatalog, ContentPlacement};
use crate::postprocess::{FieldCatalog, ItemWriter, PostProcessReport, PostProcessor};
use crate::stage::{Analyze, Layout, Place, PostProcess, Resolve, Split};
use pagemod_html::{PageAnalyzer, WikiHtmlSplitter};
use pagemod_metadata::{
    CacheService, DirectoryLookup, IdentityTransformator, MappingFile, PrincipalResolver,
    TaxonomyTransformator, TermStore, UrlRewriteContext, UrlTransformator, DEFAULT_PAGES_LIBRARY,
};
use pagemod_model::{BlockPosition, ConnectionContext, LayoutCategory, Section, SourcePage};
use pagemod_rules::{
    AssetTransfer, FunctionEnv, FunctionRegistry, MappingResolver, Outcome, ResolveOptions,
    RuleTable, SkipReason,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Target page storage
pub trait PageStore: Send + Sync {
    fn page_exists(&self, name: &str) -> Result<bool, WriteError>;
    /// Create or replace page `name`
    fn persist_page(&self, name: &str, sections: &[Section]) -> Result<(), WriteError>;
}

/// Block left off the target page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    pub position: BlockPosition,
    pub block_type: String,
    pub reason: SkipReason,
}

/// Outcome of one successful page run
#[derive(Debug, Clone, PartialEq)]
pub struct TransformResult {
    pub correlation_id: Uuid,
    pub page: String,
    pub layout: LayoutCategory,
    pub sections: Vec<Section>,
    pub skipped: Vec<SkippedBlock>,
    pub post_process: Option<PostProcessReport>,
}

/// One page of a batch
#[derive(Debug)]
pub struct PageReport {
    pub page: String,
    pub result: Result<TransformResult, TransformError>,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub pages: Vec<PageReport>,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.pages.iter().filter(|p| p.result.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.pages.len() - self.succeeded()
    }
}

/// External systems a configured transformator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub source: ConnectionContext,
    pub target: ConnectionContext,
    pub store: Arc<dyn PageStore>,
    pub assets: Option<Arc<dyn AssetTransfer>>,
    pub components: Option<Arc<dyn ComponentCatalog>>,
    pub fields: Option<Arc<dyn FieldCatalog>>,
    pub items: Option<Arc<dyn ItemWriter>>,
    pub principals: Option<Arc<dyn PrincipalResolver>>,
    pub directory: Option<Arc<dyn DirectoryLookup>>,
    pub terms: Option<Arc<dyn TermStore>>,
}

impl Collaborators {
    #[must_use]
    pub fn new(source: ConnectionContext, target: ConnectionContext, store: Arc<dyn PageStore>) -> Self {
        Self {
            source,
            target,
            store,
            assets: None,
            components: None,
            fields: None,
            items: None,
            principals: None,
            directory: None,
            terms: None,
        }
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn AssetTransfer>) -> Self {
        self.assets = Some(assets);
        self
    }

    #[must_use]
    pub fn with_components(mut self, components: Arc<dyn ComponentCatalog>) -> Self {
        self.components = Some(components);
        self
    }

    /// Enable post-processing
    #[must_use]
    pub fn with_items(mut self, fields: Arc<dyn FieldCatalog>, items: Arc<dyn ItemWriter>) -> Self {
        self.fields = Some(fields);
        self.items = Some(items);
        self
    }

    #[must_use]
    pub fn with_principals(mut self, principals: Arc<dyn PrincipalResolver>) -> Self {
        self.principals = Some(principals);
        self
    }

    /// Directory of the source domain, for domain-joined hosts
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_terms(mut self, terms: Arc<dyn TermStore>) -> Self {
        self.terms = Some(terms);
        self
    }
}

/// Runs pages through the stage pipeline
pub struct PageTransformator {
    analyzer: Arc<dyn Analyze>,
    splitter: Arc<dyn Split>,
    resolver: Arc<dyn Resolve>,
    layout: Arc<dyn Layout>,
    placement: Arc<dyn Place>,
    post_processor: Option<Arc<dyn PostProcess>>,
    store: Arc<dyn PageStore>,
    cache: Arc<CacheService>,
    env: FunctionEnv,
    diagnostics: Arc<Diagnostics>,
    overwrite: bool,
    parallelism: usize,
}

impl std::fmt::Debug for PageTransformator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTransformator")
            .field("post_process", &self.post_processor.is_some())
            .field("env", &self.env)
            .field("diagnostics", &self.diagnostics)
            .field("overwrite", &self.overwrite)
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl PageTransformator {
    /// Transformator with the default stages around `resolver`
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolve>, store: Arc<dyn PageStore>) -> Self {
        Self {
            analyzer: Arc::new(PageAnalyzer::new()),
            splitter: Arc::new(WikiHtmlSplitter::default()),
            resolver,
            layout: Arc::new(LayoutTransformator::new()),
            placement: Arc::new(ContentPlacement::new()),
            post_processor: None,
            store,
            cache: Arc::new(CacheService::new()),
            env: FunctionEnv::default(),
            diagnostics: Arc::new(Diagnostics::new()),
            overwrite: false,
            parallelism: 1,
        }
    }

    /// Assemble a transformator from configuration
    ///
    /// Loads the rule table (the built-in one when none is configured) and
    /// every mapping file through `cache`.
    ///
    /// # Errors
    /// Any [`ConfigError`]: invalid settings, rule table or mapping files.
    pub fn from_config(
        config: &TransformConfig,
        collaborators: Collaborators,
        cache: Arc<CacheService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let Collaborators {
            source,
            target,
            store,
            assets,
            components,
            fields,
            items,
            principals,
            directory,
            terms,
        } = collaborators;

        let registry = FunctionRegistry::with_builtins();
        let table = match &config.rule_table {
            Some(path) => RuleTable::from_path(path, &registry)?,
            None => RuleTable::builtin(&registry)?,
        };
        let load = |path: &Option<std::path::PathBuf>| {
            path.as_deref()
                .map(|p| MappingFile::load(p, &cache))
                .transpose()
        };
        let url_mapping = load(&config.mappings.url)?;
        let user_mapping = load(&config.mappings.user)?;
        let term_mapping = load(&config.mappings.term)?;

        let mut url_context = UrlRewriteContext::between(&source, &target).with_pages_libraries(
            config.urls.source_pages_library.as_deref().unwrap_or(DEFAULT_PAGES_LIBRARY),
            config.urls.target_pages_library.as_deref().unwrap_or(DEFAULT_PAGES_LIBRARY),
        );
        if let (Some(s), Some(t)) = (&config.urls.source_site_url, &config.urls.target_site_url) {
            url_context = url_context.with_site_urls(s, t);
        }
        let urls = Arc::new(UrlTransformator::new(&url_context, url_mapping)?);

        let cross_site = config.cross_site || !source.same_system(&target);
        let resolver = MappingResolver::new(
            Arc::new(table),
            Arc::new(registry),
            ResolveOptions {
                cross_site,
                mapping_properties: config.mapping_properties.clone(),
            },
        );

        let mut env = FunctionEnv::default().with_urls(Arc::clone(&urls));
        if let Some(assets) = assets {
            env = env.with_assets(assets);
        }

        let mut placement = ContentPlacement::new();
        if let Some(components) = components {
            placement = placement.with_catalog(components);
        }

        let post_processor = items.map(|items| {
            let fields: Arc<dyn FieldCatalog> = match fields {
                Some(fields) => fields,
                None => Arc::new(HashSet::<String>::new()),
            };
            let mut processor = PostProcessor::new(fields, items)
                .with_urls(Arc::clone(&urls))
                .copying(config.copy_metadata, config.copy_permissions);
            if let Some(principals) = principals {
                let mut identity =
                    IdentityTransformator::new(Arc::clone(&cache), source.clone(), target.clone(), principals);
                if let Some(mapping) = user_mapping {
                    identity = identity.with_mapping(mapping);
                }
                if let Some(directory) = directory {
                    identity = identity.with_directory(directory);
                }
                processor = processor.with_identity(Arc::new(identity));
            }
            if let Some(terms) = terms {
                let mut taxonomy =
                    TaxonomyTransformator::new(Arc::clone(&cache), terms, source.clone(), target.clone());
                if let Some(mapping) = term_mapping {
                    taxonomy = taxonomy.with_mapping(mapping);
                }
                processor = processor.with_taxonomy(Arc::new(taxonomy));
            }
            Arc::new(processor) as Arc<dyn PostProcess>
        });

        tracing::info!(
            source = %source.base_url(),
            target = %target.base_url(),
            cross_site,
            post_process = post_processor.is_some(),
            "page transformator configured"
        );

        let mut transformator = Self::new(Arc::new(resolver), store)
            .with_splitter(Arc::new(WikiHtmlSplitter::new(config.splitter)))
            .with_placement(Arc::new(placement))
            .with_cache(cache)
            .with_env(env)
            .with_overwrite(config.overwrite)
            .with_parallelism(config.parallelism);
        transformator.post_processor = post_processor;
        Ok(transformator)
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyze>) -> Self {
        self.analyzer = analyzer;
        self
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: Arc<dyn Split>) -> Self {
        self.splitter = splitter;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: Arc<dyn Place>) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcess>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<CacheService>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: FunctionEnv) -> Self {
        self.env = env;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Register an observer for every following run
    pub fn observe(&self, sink: Arc<dyn ObserverSink>) {
        self.diagnostics.register(sink);
    }

    /// Shared lookup cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// Transform one page
    ///
    /// # Errors
    /// [`TransformError::Config`] when the rule table cannot serve the page,
    /// [`TransformError::Page`] for failures confined to this page.
    pub fn transform(&self, page: &SourcePage) -> Result<TransformResult, TransformError> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!("transform_page", %correlation_id, page = %page.name);
        let _entered = span.enter();

        self.diagnostics
            .info(correlation_id, &format!("transforming '{}' ({})", page.name, page.page_type));
        let result = self.run(correlation_id, page);
        match &result {
            Ok(done) => self.diagnostics.info(
                correlation_id,
                &format!(
                    "transformed '{}' into {} section(s), {} block(s) skipped",
                    page.name,
                    done.sections.len(),
                    done.skipped.len()
                ),
            ),
            Err(e) => self.diagnostics.error(correlation_id, &e.to_string()),
        }
        result
    }

    fn run(&self, correlation_id: Uuid, page: &SourcePage) -> Result<TransformResult, TransformError> {
        let exists = self
            .store
            .page_exists(&page.name)
            .map_err(|e| PageError::persistence(&page.name, e.to_string()))?;
        if exists && !self.overwrite {
            return Err(PageError::PageExists(page.name.clone()).into());
        }

        let analysis = self.analyzer.analyze(page)?;
        let blocks = self.splitter.split(analysis.blocks);
        self.diagnostics.debug(
            correlation_id,
            &format!("{:?} layout, {} block(s) after splitting", analysis.layout, blocks.len()),
        );

        let mut resolved = Vec::with_capacity(blocks.len());
        let mut skipped = Vec::new();
        for block in &blocks {
            match self.resolver.resolve(block, &self.env)? {
                Outcome::Placed(done) => resolved.push(done),
                Outcome::Skipped(reason) => {
                    if reason != SkipReason::Closed {
                        self.diagnostics.warning(
                            correlation_id,
                            &format!("skipped '{}' block: {reason}", block.block_type),
                        );
                    }
                    skipped.push(SkippedBlock {
                        position: block.position(),
                        block_type: block.block_type.clone(),
                        reason,
                    });
                }
                Outcome::Fatal(source) => {
                    return Err(PageError::Resolve {
                        page: page.name.clone(),
                        source,
                    }
                    .into())
                }
            }
        }

        let templates = self.layout.templates(analysis.layout);
        let placement = self.placement.place(&templates, &resolved);
        for dropped in placement.dropped {
            self.diagnostics
                .warning(correlation_id, &format!("dropped control: {}", dropped.reason));
            let block_type = resolved
                .iter()
                .find(|b| b.position == dropped.position)
                .map(|b| b.source_type.clone())
                .unwrap_or_default();
            skipped.push(SkippedBlock {
                position: dropped.position,
                block_type,
                reason: dropped.reason,
            });
        }

        self.store
            .persist_page(&page.name, &placement.sections)
            .map_err(|e| PageError::persistence(&page.name, e.to_string()))?;

        let post_process = self.post_processor.as_ref().map(|post| {
            let report = post.post_process(page, &page.name);
            for warning in &report.warnings {
                self.diagnostics.warning(correlation_id, warning);
            }
            report
        });

        Ok(TransformResult {
            correlation_id,
            page: page.name.clone(),
            layout: analysis.layout,
            sections: placement.sections,
            skipped,
            post_process,
        })
    }

    /// Transform pages one after another
    ///
    /// With an observer registered, page errors are reported and the batch
    /// goes on; otherwise the first page error ends it.
    ///
    /// # Errors
    /// The first run-fatal error, or the first page error without observers.
    pub fn transform_batch(&self, pages: &[SourcePage]) -> Result<BatchReport, TransformError> {
        let mut report = BatchReport::default();
        for page in pages {
            match self.transform(page) {
                Err(e) if e.is_run_fatal() || !self.diagnostics.has_observers() => return Err(e),
                result => report.pages.push(PageReport {
                    page: page.name.clone(),
                    result,
                }),
            }
        }
        Ok(report)
    }

    /// Transform pages on a dedicated thread pool
    ///
    /// Pages run independently and share the lookup cache. Error handling
    /// follows [`Self::transform_batch`], applied after all pages finished.
    ///
    /// # Errors
    /// As [`Self::transform_batch`], or [`ConfigError::Invalid`] when the
    /// pool cannot be built.
    pub fn transform_batch_parallel(&self, pages: &[SourcePage]) -> Result<BatchReport, TransformError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("pagemod-{i}"))
            .build()
            .map_err(|e| ConfigError::invalid("parallelism", e.to_string()))?;

        let results: Vec<PageReport> = pool.install(|| {
            pages
                .par_iter()
                .map(|page| PageReport {
                    page: page.name.clone(),
                    result: self.transform(page),
                })
                .collect()
        });

        let tolerate_page_errors = self.diagnostics.has_observers();
        let mut report = BatchReport::default();
        for page in results {
            match page.result {
                Err(e) if e.is_run_fatal() || !tolerate_page_errors => return Err(e),
                result => report.pages.push(PageReport {
                    page: page.page,
                    result,
                }),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemod_model::{ContentBlock, PageType, PlatformVersion, SectionTemplate};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        existing: HashSet<String>,
        pages: Mutex<HashMap<String, Vec<Section>>>,
    }

    impl PageStore for MemoryStore {
        fn page_exists(&self, name: &str) -> Result<bool, WriteError> {
            Ok(self.existing.contains(name) || self.pages.lock().contains_key(name))
        }

        fn persist_page(&self, name: &str, sections: &[Section]) -> Result<(), WriteError> {
            self.pages.lock().insert(name.to_string(), sections.to_vec());
            Ok(())
        }
    }

    fn resolver() -> Arc<dyn Resolve> {
        let registry = FunctionRegistry::with_builtins();
        let table = RuleTable::builtin(&registry).unwrap();
        Arc::new(MappingResolver::new(
            Arc::new(table),
            Arc::new(registry),
            ResolveOptions::default(),
        ))
    }

    fn wiki(name: &str, body: &str) -> SourcePage {
        SourcePage::new(name, PageType::Wiki).with_content(body)
    }

    #[test]
    fn transforms_and_persists_wiki_page() {
        let store = Arc::new(MemoryStore::default());
        let transformator = PageTransformator::new(resolver(), store.clone());

        let result = transformator
            .transform(&wiki("home.aspx", "<p>A</p><img src='x.png'/><p>B</p>"))
            .unwrap();

        assert_eq!(result.layout, LayoutCategory::OneColumn);
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].template, SectionTemplate::OneColumn);
        let orders: Vec<u32> = result.sections[0].controls().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert!(result.sections[0].columns[0].controls[1].html().is_none());
        assert_eq!(store.pages.lock()["home.aspx"], result.sections);
    }

    #[test]
    fn existing_page_needs_overwrite() {
        let store = Arc::new(MemoryStore {
            existing: ["home.aspx".to_string()].into_iter().collect(),
            ..MemoryStore::default()
        });
        let page = wiki("home.aspx", "<p>A</p>");

        let err = PageTransformator::new(resolver(), store.clone())
            .transform(&page)
            .unwrap_err();
        assert!(matches!(err, TransformError::Page(PageError::PageExists(_))));
        assert!(!err.is_run_fatal());

        let done = PageTransformator::new(resolver(), store)
            .with_overwrite(true)
            .transform(&page);
        assert!(done.is_ok());
    }

    #[test]
    fn closed_blocks_are_skipped_quietly() {
        struct Fixed;
        impl Analyze for Fixed {
            fn analyze(&self, _: &SourcePage) -> Result<pagemod_html::PageAnalysis, pagemod_html::HtmlError> {
                Ok(pagemod_html::PageAnalysis {
                    layout: LayoutCategory::OneColumn,
                    blocks: vec![
                        ContentBlock::new("TitleBar", 1, 1, 1000).closed(),
                        ContentBlock::rich_text("<p>kept</p>", 1, 1, 2000),
                    ],
                })
            }
        }

        let transformator = PageTransformator::new(resolver(), Arc::new(MemoryStore::default()))
            .with_analyzer(Arc::new(Fixed));
        let result = transformator.transform(&wiki("p.aspx", "")).unwrap();

        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::Closed);
        assert_eq!(result.sections[0].control_count(), 1);
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let pages: Vec<SourcePage> = (0..6)
            .map(|i| wiki(&format!("p{i}.aspx"), &format!("<p>page {i}</p>")))
            .collect();

        let sequential = PageTransformator::new(resolver(), Arc::new(MemoryStore::default()))
            .transform_batch(&pages)
            .unwrap();
        let parallel = PageTransformator::new(resolver(), Arc::new(MemoryStore::default()))
            .with_parallelism(3)
            .transform_batch_parallel(&pages)
            .unwrap();

        assert_eq!(sequential.succeeded(), 6);
        assert_eq!(parallel.succeeded(), 6);
        for (a, b) in sequential.pages.iter().zip(&parallel.pages) {
            assert_eq!(a.page, b.page);
            let (a, b) = (a.result.as_ref().unwrap(), b.result.as_ref().unwrap());
            assert_eq!(a.sections, b.sections);
            assert_ne!(a.correlation_id, b.correlation_id);
        }
    }

    #[test]
    fn from_config_uses_builtin_rules_and_cross_site_detection() {
        let source = ConnectionContext::new("http://a/sites/s1", PlatformVersion::SubscriptionEdition);
        let target = ConnectionContext::new("https://b/sites/s2", PlatformVersion::Online);
        let store = Arc::new(MemoryStore::default());
        let collaborators = Collaborators::new(source, target, store.clone());

        let transformator =
            PageTransformator::from_config(&TransformConfig::default(), collaborators, Arc::new(CacheService::new()))
                .unwrap();
        let result = transformator
            .transform(&wiki("home.aspx", r#"<p><a href="http://a/sites/s1/SitePages/x.aspx">x</a></p>"#))
            .unwrap();

        let html = result.sections[0].columns[0].controls[0].html().unwrap();
        assert!(html.contains("https://b/sites/s2/SitePages/x.aspx"), "{html}");
        assert!(result.post_process.is_none());
    }

    #[test]
    fn from_config_reports_missing_rule_table() {
        let source = ConnectionContext::new("http://a/sites/s1", PlatformVersion::Online);
        let collaborators = Collaborators::new(source.clone(), source, Arc::new(MemoryStore::default()));
        let config = TransformConfig::new().with_rule_table("/no/such/rules.json");

        let err = PageTransformator::from_config(&config, collaborators, Arc::new(CacheService::new())).unwrap_err();
        assert!(matches!(err, ConfigError::Rules(_)));
    }
}

//! Taxonomy transformator
//!
//! Resolves source term references against the target term store.
//!
//! - Term sets are fetched once per context and flattened into lookups by
//!   id and by lower-cased `group|set|term|...` path.
//! - A mapping file, when configured, is consulted first. Records match by
//!   full path or by term id; a record whose target does not resolve logs a
//!   warning and the next record is tried.
//! - Otherwise (or when no record resolved) the fast path applies: a term
//!   found under the same id in both sets passes through unchanged, else
//!   the target term at the same path is used.
//!
//! Source and target term sets are addressed by their own ids.
//!
//! Anything else is [`TermResolution::Unresolved`] and gets dropped by the
//! caller.

use crate::cache::{CacheKey, CacheService, LookupKind};
use crate::error::Result;
use crate::mapping_file::MappingFile;
use pagemod_model::{ConnectionContext, TermRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Path separator in term paths
pub const PATH_SEPARATOR: char = '|';

/// Term with its descendants
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermNode {
    pub id: String,
    pub label: String,
    pub children: Vec<TermNode>,
}

impl TermNode {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: TermNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Term set as returned by a term store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermSetTree {
    pub id: String,
    pub group: String,
    pub name: String,
    pub terms: Vec<TermNode>,
}

/// Term store of one system
#[cfg_attr(test, mockall::automock)]
pub trait TermStore: Send + Sync {
    /// Full term set, `None` when the set does not exist on `context`
    fn fetch_term_set(
        &self,
        context: &ConnectionContext,
        term_set_id: &str,
    ) -> Result<Option<TermSetTree>>;
}

/// Flattened term with its full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTerm {
    pub id: String,
    pub label: String,
    pub path: String,
}

impl IndexedTerm {
    fn to_ref(&self) -> TermRef {
        TermRef::new(&self.id, &self.label)
    }
}

/// O(1) lookups into one term set
#[derive(Debug, Clone, Default)]
pub struct TermSetIndex {
    by_id: HashMap<String, IndexedTerm>,
    by_path: HashMap<String, IndexedTerm>,
}

impl TermSetIndex {
    /// Flatten a term set tree
    #[must_use]
    pub fn build(tree: &TermSetTree) -> Self {
        let mut index = Self::default();
        let prefix = format!("{}{PATH_SEPARATOR}{}", tree.group, tree.name);
        for term in &tree.terms {
            index.add(&prefix, term);
        }
        index
    }

    fn add(&mut self, parent_path: &str, node: &TermNode) {
        let path = format!("{parent_path}{PATH_SEPARATOR}{}", node.label);
        let term = IndexedTerm {
            id: normalize_id(&node.id),
            label: node.label.clone(),
            path: path.clone(),
        };
        self.by_path.insert(path.to_lowercase(), term.clone());
        self.by_id.insert(term.id.clone(), term);
        for child in &node.children {
            self.add(&path, child);
        }
    }

    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&IndexedTerm> {
        self.by_id.get(&normalize_id(id))
    }

    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<&IndexedTerm> {
        self.by_path.get(&normalize_path(path))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Outcome of resolving one term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermResolution {
    Resolved(TermRef),
    Unresolved,
}

impl TermResolution {
    #[must_use]
    pub fn into_option(self) -> Option<TermRef> {
        match self {
            Self::Resolved(term) => Some(term),
            Self::Unresolved => None,
        }
    }
}

/// Term resolution between one source and one target
pub struct TaxonomyTransformator {
    cache: Arc<CacheService>,
    store: Arc<dyn TermStore>,
    source: ConnectionContext,
    target: ConnectionContext,
    mapping: Option<Arc<MappingFile>>,
}

impl std::fmt::Debug for TaxonomyTransformator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyTransformator")
            .field("source", &self.source.id())
            .field("target", &self.target.id())
            .field("mapping", &self.mapping.is_some())
            .finish()
    }
}

impl TaxonomyTransformator {
    #[must_use]
    pub fn new(
        cache: Arc<CacheService>,
        store: Arc<dyn TermStore>,
        source: ConnectionContext,
        target: ConnectionContext,
    ) -> Self {
        Self {
            cache,
            store,
            source,
            target,
            mapping: None,
        }
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: Arc<MappingFile>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Resolve a term of source set `source_set` onto target set `target_set`
    ///
    /// The two ids differ when terms were re-created on the target; each
    /// index is fetched with its own id.
    pub fn transform(&self, source_set: &str, target_set: &str, term: &TermRef) -> TermResolution {
        let source_index = self.index(&self.source, source_set);
        let target_index = self.index(&self.target, target_set);
        let source_term = source_index.by_id(&term.id);

        if let Some(mapping) = &self.mapping {
            if let Some(resolved) = resolve_mapped(mapping, term, source_term, &target_index) {
                return TermResolution::Resolved(resolved);
            }
        }

        let Some(source_term) = source_term else {
            tracing::warn!(term = %term.id, label = %term.label, term_set = source_set, "term not in source term set");
            return TermResolution::Unresolved;
        };
        if target_index.by_id(&term.id).is_some() {
            return TermResolution::Resolved(term.clone());
        }
        if let Some(by_path) = target_index.by_path(&source_term.path) {
            tracing::debug!(
                term = %term.id,
                target = %by_path.id,
                path = %by_path.path,
                "term resolved by path"
            );
            return TermResolution::Resolved(by_path.to_ref());
        }

        tracing::warn!(term = %term.id, label = %term.label, term_set = target_set, "term unresolved on target");
        TermResolution::Unresolved
    }

    /// Resolve every term, dropping unresolved ones
    #[must_use]
    pub fn transform_all(&self, source_set: &str, target_set: &str, terms: &[TermRef]) -> Vec<TermRef> {
        terms
            .iter()
            .filter_map(|t| self.transform(source_set, target_set, t).into_option())
            .collect()
    }

    /// Cached term set index, empty when the set is missing or the store fails
    fn index(&self, context: &ConnectionContext, term_set_id: &str) -> Arc<TermSetIndex> {
        let key = CacheKey::new(context.id(), LookupKind::TermSet, normalize_id(term_set_id));
        let fetched = self.cache.get_or_try_insert_with(key, || {
            self.store
                .fetch_term_set(context, term_set_id)
                .map(|tree| Arc::new(tree.as_ref().map(TermSetIndex::build).unwrap_or_default()))
        });
        fetched.unwrap_or_else(|e| {
            tracing::warn!(context = %context.id(), term_set = term_set_id, error = %e, "term set fetch failed");
            Arc::new(TermSetIndex::default())
        })
    }
}

fn resolve_mapped(
    mapping: &MappingFile,
    term: &TermRef,
    source_term: Option<&IndexedTerm>,
    target_index: &TermSetIndex,
) -> Option<TermRef> {
    let term_id = normalize_id(&term.id);
    let source_path = source_term.map(|s| normalize_path(&s.path));

    for record in mapping.records() {
        let matches = normalize_id(&record.source) == term_id
            || source_path.as_deref() == Some(normalize_path(&record.source).as_str());
        if !matches {
            continue;
        }
        let target = target_index
            .by_id(&record.target)
            .or_else(|| target_index.by_path(&record.target));
        match target {
            Some(target) => return Some(target.to_ref()),
            None => tracing::warn!(
                source = %record.source,
                target = %record.target,
                "term mapping target not found, trying next mapping"
            ),
        }
    }
    None
}

fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches('{').trim_end_matches('}').to_lowercase()
}

fn normalize_path(path: &str) -> String {
    path.split(PATH_SEPARATOR)
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("|")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use crate::mapping_file::MappingRecord;
    use pagemod_model::PlatformVersion;
    use pretty_assertions::assert_eq;

    const SET: &str = "set-1";

    fn tree(term_ids: [&str; 2]) -> TermSetTree {
        TermSetTree {
            id: SET.into(),
            group: "Corporate".into(),
            name: "Departments".into(),
            terms: vec![TermNode::new(term_ids[0], "Finance")
                .with_child(TermNode::new(term_ids[1], "Payroll"))],
        }
    }

    fn source() -> ConnectionContext {
        ConnectionContext::new("http://a/sites/s1", PlatformVersion::OnPremises2013)
    }

    fn target() -> ConnectionContext {
        ConnectionContext::new("https://b/sites/s2", PlatformVersion::Online)
    }

    fn store(source_ids: [&'static str; 2], target_ids: [&'static str; 2]) -> MockTermStore {
        let mut store = MockTermStore::new();
        store
            .expect_fetch_term_set()
            .times(2)
            .returning(move |ctx, _| {
                let ids = if ctx.platform_version().is_cloud() { target_ids } else { source_ids };
                Ok(Some(tree(ids)))
            });
        store
    }

    fn transformator(store: MockTermStore) -> TaxonomyTransformator {
        TaxonomyTransformator::new(Arc::new(CacheService::new()), Arc::new(store), source(), target())
    }

    #[test]
    fn index_flattens_paths() {
        let index = TermSetIndex::build(&tree(["a", "b"]));
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_path("corporate|departments|finance|payroll").unwrap().id, "b");
        assert_eq!(index.by_id("{B}").unwrap().path, "Corporate|Departments|Finance|Payroll");
    }

    #[test]
    fn fast_path_passes_identical_ids_through() {
        let t = transformator(store(["a", "b"], ["a", "b"]));
        let term = TermRef::new("b", "Payroll");

        assert_eq!(t.transform(SET, SET, &term), TermResolution::Resolved(term.clone()));
        // term sets are cached per context: the store expects exactly two fetches
        assert_eq!(t.transform(SET, SET, &term), TermResolution::Resolved(term));
    }

    #[test]
    fn fast_path_resolves_by_path_when_ids_differ() {
        let t = transformator(store(["a", "b"], ["x", "y"]));
        let resolved = t.transform(SET, SET, &TermRef::new("b", "Payroll"));
        assert_eq!(resolved, TermResolution::Resolved(TermRef::new("y", "Payroll")));
    }

    #[test]
    fn mapping_by_path_with_fallthrough() {
        let mapping = MappingFile::from_records(vec![
            MappingRecord::new("Corporate|Departments|Finance|Payroll", "Corporate|Departments|Missing"),
            MappingRecord::new("{B}", "Corporate|Departments|Finance"),
        ]);
        let t = transformator(store(["a", "b"], ["x", "y"])).with_mapping(Arc::new(mapping));

        let resolved = t.transform(SET, SET, &TermRef::new("b", "Payroll"));
        assert_eq!(resolved, TermResolution::Resolved(TermRef::new("x", "Finance")));
    }

    #[test]
    fn fast_path_keeps_the_source_label() {
        let t = transformator(store(["a", "b"], ["a", "b"]));
        let term = TermRef::new("{B}", "Payroll (old)");
        assert_eq!(t.transform(SET, SET, &term), TermResolution::Resolved(term));
    }

    #[test]
    fn term_missing_from_source_set_is_not_passed_through() {
        let mut store = MockTermStore::new();
        store.expect_fetch_term_set().returning(|ctx, _| {
            Ok(ctx.platform_version().is_cloud().then(|| tree(["a", "b"])))
        });
        let t = transformator(store);
        assert_eq!(t.transform(SET, SET, &TermRef::new("b", "Payroll")), TermResolution::Unresolved);
    }

    #[test]
    fn path_mapping_between_differently_named_sets() {
        let mut store = MockTermStore::new();
        store.expect_fetch_term_set().times(2).returning(|ctx, set| {
            let found = match set {
                "src-set" if !ctx.platform_version().is_cloud() => TermSetTree {
                    id: "src-set".into(),
                    group: "Old".into(),
                    name: "Depts".into(),
                    terms: vec![TermNode::new("a", "Finance").with_child(TermNode::new("b", "Payroll"))],
                },
                "tgt-set" if ctx.platform_version().is_cloud() => TermSetTree {
                    id: "tgt-set".into(),
                    group: "New".into(),
                    name: "Departments".into(),
                    terms: vec![TermNode::new("x", "Finance").with_child(TermNode::new("y", "Payroll"))],
                },
                _ => return Ok(None),
            };
            Ok(Some(found))
        });
        let mapping = MappingFile::from_records(vec![MappingRecord::new(
            "Old|Depts|Finance|Payroll",
            "New|Departments|Finance|Payroll",
        )]);
        let t = transformator(store).with_mapping(Arc::new(mapping));

        let resolved = t.transform("src-set", "tgt-set", &TermRef::new("b", "Payroll"));
        assert_eq!(resolved, TermResolution::Resolved(TermRef::new("y", "Payroll")));
    }

    #[test]
    fn unknown_terms_are_dropped() {
        let t = transformator(store(["a", "b"], ["x", "y"]));
        let kept = t.transform_all(SET, SET, &[TermRef::new("zzz", "Gone"), TermRef::new("a", "Finance")]);
        assert_eq!(kept, vec![TermRef::new("x", "Finance")]);
    }

    #[test]
    fn store_failure_leaves_term_unresolved() {
        let mut store = MockTermStore::new();
        store
            .expect_fetch_term_set()
            .returning(|_, _| Err(MetadataError::lookup("term store", "503")));
        let t = transformator(store);

        assert_eq!(t.transform(SET, SET, &TermRef::new("a", "Finance")), TermResolution::Unresolved);
    }
}

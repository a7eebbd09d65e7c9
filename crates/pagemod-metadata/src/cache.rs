//! Context-scoped lookup cache
//!
//! One [`CacheService`] is shared by every pipeline of a run. Entries are
//! keyed by `(context, kind, key)` and hold any `Clone + Send + Sync` value,
//! downcast on read.
//!
//! Population follows read-check-populate: two pipelines missing the same
//! key may both compute it and the last write wins. Cached values derive
//! from immutable upstream state, so both writes carry the same value.

use dashmap::DashMap;
use pagemod_model::{ContextId, PlatformVersion};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Scope used for entries that do not belong to a connection
const PROCESS_SCOPE: &str = "process:";

/// Category of cached lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    PlatformVersion,
    /// Resolved principal, including pass-through and negative outcomes
    Principal,
    /// Flattened term set
    TermSet,
    /// Field definitions of a list
    Field,
    /// Parsed mapping file, keyed by path
    MappingFile,
}

/// Full cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub context: ContextId,
    pub kind: LookupKind,
    pub key: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(context: &ContextId, kind: LookupKind, key: impl Into<String>) -> Self {
        Self {
            context: context.clone(),
            kind,
            key: key.into(),
        }
    }

    /// Key outside any connection scope
    #[must_use]
    pub fn process(kind: LookupKind, key: impl Into<String>) -> Self {
        Self::new(&ContextId::from_url(PROCESS_SCOPE), kind, key)
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
}

/// Shared lookup cache
#[derive(Default)]
pub struct CacheService {
    entries: DashMap<CacheKey, Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for CacheService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CacheService {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cached value
    ///
    /// Returns `None` when absent or when the entry holds another type.
    #[must_use]
    pub fn get<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entries
            .get(key)
            .and_then(|entry| entry.value().downcast_ref::<T>().cloned())
    }

    /// Insert value, replacing any previous entry
    #[inline]
    pub fn insert<T>(&self, key: CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(key, Arc::new(value));
    }

    /// Get or compute value
    pub fn get_or_insert_with<T, F>(&self, key: CacheKey, f: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(cached) = self.get::<T>(&key) {
            return cached;
        }
        let value = f();
        self.insert(key, value.clone());
        value
    }

    /// Try to get or compute value
    ///
    /// Errors are returned to the caller and never cached.
    pub fn get_or_try_insert_with<T, E, F>(&self, key: CacheKey, f: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(cached) = self.get::<T>(&key) {
            return Ok(cached);
        }
        let value = f()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Platform version of a context, detected once
    pub fn platform_version<F>(&self, context: &ContextId, detect: F) -> PlatformVersion
    where
        F: FnOnce() -> PlatformVersion,
    {
        let key = CacheKey::new(context, LookupKind::PlatformVersion, "");
        self.get_or_insert_with(key, detect)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Invalidate one entry
    #[inline]
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    /// Invalidate every entry of a context
    pub fn invalidate_context(&self, context: &ContextId) {
        self.entries.retain(|key, _| &key.context != context);
    }

    /// Invalidate every entry of a kind across contexts
    pub fn invalidate_kind(&self, kind: LookupKind) {
        self.entries.retain(|key, _| key.kind != kind);
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn ctx(url: &str) -> ContextId {
        ContextId::from_url(url)
    }

    #[test]
    fn get_or_insert_computes_once() {
        let cache = CacheService::new();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new(&ctx("https://a"), LookupKind::Principal, "bob");

        for _ in 0..3 {
            let value = cache.get_or_insert_with(key.clone(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Some("i:0#.f|membership|bob@b".to_string())
            });
            assert_eq!(value.as_deref(), Some("i:0#.f|membership|bob@b"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn negative_outcomes_are_cached() {
        let cache = CacheService::new();
        let key = CacheKey::new(&ctx("https://a"), LookupKind::Principal, "ghost");
        let first: Option<String> = cache.get_or_insert_with(key.clone(), || None);
        assert!(first.is_none());
        assert!(cache.contains(&key));
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CacheService::new();
        let key = CacheKey::new(&ctx("https://a"), LookupKind::TermSet, "set");

        let err: Result<u32, &str> = cache.get_or_try_insert_with(key.clone(), || Err("down"));
        assert_eq!(err, Err("down"));
        assert!(!cache.contains(&key));

        let ok: Result<u32, &str> = cache.get_or_try_insert_with(key, || Ok(7));
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn wrong_type_reads_as_miss() {
        let cache = CacheService::new();
        let key = CacheKey::process(LookupKind::MappingFile, "terms.csv");
        cache.insert(key.clone(), 5u32);
        assert_eq!(cache.get::<String>(&key), None);
        assert_eq!(cache.get::<u32>(&key), Some(5));
    }

    #[test]
    fn contexts_are_isolated() {
        let cache = CacheService::new();
        let a = CacheKey::new(&ctx("https://a"), LookupKind::Field, "Title");
        let b = CacheKey::new(&ctx("https://b"), LookupKind::Field, "Title");
        cache.insert(a.clone(), 1u8);
        cache.insert(b.clone(), 2u8);

        cache.invalidate_context(&ctx("https://A/"));
        assert!(!cache.contains(&a));
        assert_eq!(cache.get::<u8>(&b), Some(2));
    }

    #[test]
    fn platform_version_detected_once() {
        let cache = CacheService::new();
        let id = ctx("https://a");
        let first = cache.platform_version(&id, || PlatformVersion::OnPremises2013);
        let second = cache.platform_version(&id, || PlatformVersion::Online);
        assert_eq!(first, PlatformVersion::OnPremises2013);
        assert_eq!(second, PlatformVersion::OnPremises2013);
    }

    #[test]
    fn concurrent_population_converges() {
        let cache = Arc::new(CacheService::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let key = CacheKey::process(LookupKind::MappingFile, "urls.csv");
                    cache.get_or_insert_with(key, || vec!["a".to_string()])
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec!["a".to_string()]);
        }
        assert_eq!(cache.stats().entry_count, 1);
    }
}

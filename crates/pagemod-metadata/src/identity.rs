//! Identity transformator
//!
//! Maps a source principal reference to one usable on the target system.
//!
//! Priority:
//! 1. Mapping file, by qualified key then by bare user name
//! 2. Directory lookup (account, then group) validated against the target,
//!    only without a mapping file, for non-cloud sources, on domain-joined
//!    hosts
//! 3. Pass-through
//!
//! Every outcome is cached by raw input, pass-through included.

use crate::cache::{CacheKey, CacheService, LookupKind};
use crate::error::Result;
use crate::mapping_file::MappingFile;
use pagemod_model::{ConnectionContext, ResolvedPrincipal};
use std::sync::Arc;

/// Directory service reachable from domain-joined hosts
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryLookup: Send + Sync {
    /// Canonical identifier of a user account
    fn find_account(&self, account: &str) -> Result<Option<String>>;

    /// Canonical identifier of a group
    fn find_group(&self, name: &str) -> Result<Option<String>>;
}

/// Target system principal registration ("ensure user")
#[cfg_attr(test, mockall::automock)]
pub trait PrincipalResolver: Send + Sync {
    /// Make sure `key` exists on `context`, returning the resolved principal
    fn ensure_principal(
        &self,
        context: &ConnectionContext,
        key: &str,
    ) -> Result<Option<ResolvedPrincipal>>;
}

/// Identity resolution between one source and one target
pub struct IdentityTransformator {
    cache: Arc<CacheService>,
    source: ConnectionContext,
    target: ConnectionContext,
    mapping: Option<Arc<MappingFile>>,
    directory: Option<Arc<dyn DirectoryLookup>>,
    resolver: Arc<dyn PrincipalResolver>,
    domain_joined: bool,
}

impl std::fmt::Debug for IdentityTransformator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityTransformator")
            .field("source", &self.source.id())
            .field("target", &self.target.id())
            .field("mapping", &self.mapping.as_ref().map(|m| m.path().to_path_buf()))
            .field("directory", &self.directory.is_some())
            .field("domain_joined", &self.domain_joined)
            .finish()
    }
}

impl IdentityTransformator {
    #[must_use]
    pub fn new(
        cache: Arc<CacheService>,
        source: ConnectionContext,
        target: ConnectionContext,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        Self {
            cache,
            source,
            target,
            mapping: None,
            directory: None,
            resolver,
            domain_joined: false,
        }
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: Arc<MappingFile>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Enable directory lookups, for hosts joined to the source domain
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryLookup>) -> Self {
        self.directory = Some(directory);
        self.domain_joined = true;
        self
    }

    /// Target key for a source principal, cached by raw input
    #[must_use]
    pub fn map_principal(&self, raw: &str) -> String {
        let key = CacheKey::new(self.target.id(), LookupKind::Principal, format!("map:{raw}"));
        self.cache.get_or_insert_with(key, || self.map_uncached(raw))
    }

    /// Mapped principal registered on the target
    ///
    /// Registration failures degrade to a warning and `None`; callers clear
    /// the field instead of writing a dangling reference.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<ResolvedPrincipal> {
        let mapped = self.map_principal(raw);
        let key = CacheKey::new(self.target.id(), LookupKind::Principal, format!("ensure:{mapped}"));
        self.cache.get_or_insert_with(key, || {
            match self.resolver.ensure_principal(&self.target, &mapped) {
                Ok(Some(principal)) => Some(principal),
                Ok(None) => {
                    tracing::warn!(principal = %mapped, "principal does not exist on target");
                    None
                }
                Err(e) => {
                    tracing::warn!(principal = %mapped, error = %e, "could not ensure principal on target");
                    None
                }
            }
        })
    }

    fn map_uncached(&self, raw: &str) -> String {
        if let Some(mapping) = &self.mapping {
            return match lookup_mapping(mapping, raw) {
                Some(target) => {
                    tracing::debug!(source = raw, target = %target, "principal mapped by file");
                    target
                }
                None => raw.to_string(),
            };
        }

        if self.directory_enabled() {
            if let Some(target) = self.lookup_directory(raw) {
                return target;
            }
        }
        raw.to_string()
    }

    fn directory_enabled(&self) -> bool {
        let version = self
            .cache
            .platform_version(self.source.id(), || self.source.platform_version());
        self.domain_joined && self.directory.is_some() && !version.is_cloud()
    }

    fn lookup_directory(&self, raw: &str) -> Option<String> {
        let directory = self.directory.as_ref()?;
        let account = strip_claims(raw);

        let found = match directory.find_account(account) {
            Ok(Some(id)) => Some(id),
            Ok(None) => directory.find_group(account).unwrap_or_else(|e| {
                tracing::warn!(principal = raw, error = %e, "directory group lookup failed");
                None
            }),
            Err(e) => {
                tracing::warn!(principal = raw, error = %e, "directory account lookup failed");
                None
            }
        }?;

        match self.resolver.ensure_principal(&self.target, &found) {
            Ok(Some(principal)) => Some(principal.login_name),
            Ok(None) => {
                tracing::debug!(principal = raw, candidate = %found, "directory match unknown on target");
                None
            }
            Err(e) => {
                tracing::warn!(principal = raw, candidate = %found, error = %e, "target check failed");
                None
            }
        }
    }
}

fn lookup_mapping(mapping: &MappingFile, raw: &str) -> Option<String> {
    let qualified = strip_claims(raw);
    let qualified_match = mapping.records().iter().find(|r| {
        r.source.eq_ignore_ascii_case(raw) || r.source.eq_ignore_ascii_case(qualified)
    });
    if let Some(record) = qualified_match {
        return Some(record.target.clone());
    }

    let bare = bare_name(qualified);
    mapping
        .records()
        .iter()
        .find(|r| bare_name(strip_claims(&r.source)).eq_ignore_ascii_case(bare))
        .map(|r| r.target.clone())
}

/// Login name without a claims prefix (`i:0#.w|contoso\bob` → `contoso\bob`)
fn strip_claims(raw: &str) -> &str {
    raw.rsplit('|').next().unwrap_or(raw).trim()
}

/// User name without domain (`contoso\bob` and `bob@contoso.com` → `bob`)
fn bare_name(qualified: &str) -> &str {
    let after_domain = qualified.rsplit('\\').next().unwrap_or(qualified);
    after_domain.split('@').next().unwrap_or(after_domain)
}

//! Connection contexts
//!
//! Session establishment happens outside the engine; stages only see this
//! opaque handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform generation of a connected system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformVersion {
    OnPremises2010,
    OnPremises2013,
    OnPremises2016,
    OnPremises2019,
    SubscriptionEdition,
    /// Hosted cloud tenant
    Online,
}

impl PlatformVersion {
    /// Whether the system is a pure cloud system
    #[inline]
    #[must_use]
    pub fn is_cloud(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Cache scope for a context, derived from its normalized base URL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    /// Normalize a base URL into a context id
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        Self(url.trim().trim_end_matches('/').to_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a source or target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionContext {
    id: ContextId,
    base_url: String,
    platform_version: PlatformVersion,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(base_url: impl Into<String>, platform_version: PlatformVersion) -> Self {
        let base_url = base_url.into();
        Self {
            id: ContextId::from_url(&base_url),
            base_url,
            platform_version,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &ContextId {
        &self.id
    }

    /// Web URL the context is bound to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    #[must_use]
    pub fn platform_version(&self) -> PlatformVersion {
        self.platform_version
    }

    /// Two contexts address the same system when their ids match
    #[inline]
    #[must_use]
    pub fn same_system(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

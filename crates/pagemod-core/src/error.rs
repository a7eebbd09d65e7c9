//! Error types for the transformation pipeline
//!
//! - [`ConfigError`]: run-fatal, the pipeline refuses to start or stops the batch
//! - [`PageError`]: fatal for one page; batches with an observer log it and go on
//! - [`TransformError`]: what a single page run returns, either of the above

use pagemod_html::HtmlError;
use pagemod_metadata::MetadataError;
use pagemod_rules::{ResolveError, RuleError};
use std::path::PathBuf;

/// Configuration defects
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Rule table invalid or incomplete
    #[error("rule table: {0}")]
    Rules(#[from] RuleError),

    /// Mapping file or URL configuration invalid
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),

    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::TransformConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid setting
    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: String, reason: String },

    /// Tracing subscriber could not be installed
    #[error("telemetry: {0}")]
    Telemetry(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create invalid setting error
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Failures that abort the current page only
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Page could not be analyzed
    #[error(transparent)]
    Analysis(#[from] HtmlError),

    /// Target page exists and overwriting is disabled
    #[error("target page '{0}' already exists and overwrite is disabled")]
    PageExists(String),

    /// A rule function failed
    #[error("resolving page '{page}': {source}")]
    Resolve {
        page: String,
        #[source]
        source: ResolveError,
    },

    /// Target store rejected the page
    #[error("persisting page '{page}': {message}")]
    Persistence { page: String, message: String },
}

impl PageError {
    /// Create persistence error
    pub fn persistence(page: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            page: page.into(),
            message: message.into(),
        }
    }
}

/// Target item write failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("write failed: {0}")]
    Failed(String),
}

impl WriteError {
    #[inline]
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

/// Error of one page transformation
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl TransformError {
    /// Whether the whole run must stop
    #[inline]
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<RuleError> for TransformError {
    fn from(e: RuleError) -> Self {
        Self::Config(ConfigError::Rules(e))
    }
}

impl From<HtmlError> for TransformError {
    fn from(e: HtmlError) -> Self {
        Self::Page(PageError::Analysis(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemod_model::PageType;

    #[test]
    fn transform_error_severity() {
        let err: TransformError = RuleError::NoDefaultRuleFound("X".into()).into();
        assert!(err.is_run_fatal());
        assert!(err.to_string().contains("no default rule"));

        let err: TransformError = HtmlError::UnsupportedPageType(PageType::Modern).into();
        assert!(!err.is_run_fatal());
        assert_eq!(err.to_string(), "unsupported page type: modern");
    }

    #[test]
    fn page_error_display() {
        let err = PageError::PageExists("home.aspx".into());
        assert!(err.to_string().contains("overwrite is disabled"));

        let err = PageError::persistence("home.aspx", "quota exceeded");
        assert_eq!(err.to_string(), "persisting page 'home.aspx': quota exceeded");
    }
}

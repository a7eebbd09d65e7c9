//! Error types for rule loading and resolution
//!
//! Three severities:
//! - [`RuleError`]: configuration defects, abort the whole run
//! - [`ResolveError`]: abort the current page
//! - [`FunctionError`]: raised by registered functions; the skip kinds
//!   drop one block, everything else becomes a [`ResolveError`]

use std::path::PathBuf;

/// Rule table defects
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Rule table could not be read
    #[error("io error reading rule table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rule table is not JSON or does not match the rule model
    #[error("invalid rule table: {0}")]
    InvalidDocument(String),

    /// Rule table violates the schema
    #[error("rule table violates schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("duplicate rule for source type '{0}'")]
    DuplicateSourceType(String),

    #[error("more than one default rule: '{first}' and '{second}'")]
    DuplicateDefaultRule { first: String, second: String },

    #[error("rule '{0}' has more than one default variant")]
    DuplicateDefaultVariant(String),

    #[error("rule '{source_type}' declares variant '{name}' twice")]
    DuplicateVariantName { source_type: String, name: String },

    /// Function name absent from the registry
    #[error("rule '{source_type}' references unknown function '{name}'")]
    UnknownFunction { source_type: String, name: String },

    /// Selector name absent from the registry
    #[error("rule '{source_type}' references unknown selector '{name}'")]
    UnknownSelector { source_type: String, name: String },

    /// Block type without rule and no default rule to fall back on
    #[error("no rule for block type '{0}' and no default rule found")]
    NoDefaultRuleFound(String),
}

impl RuleError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure raised by a registered function or selector
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    /// Feature backing the block does not exist on the target
    #[error("not available at target: {0}")]
    NotAvailableAtTarget(String),

    /// Media could not be located or transferred
    #[error("media configuration: {0}")]
    MediaConfiguration(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl FunctionError {
    /// Whether the error skips the block instead of failing the page
    #[inline]
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::NotAvailableAtTarget(_) | Self::MediaConfiguration(_))
    }
}

/// Page-fatal resolution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Function failed with a non-skip error
    #[error("function '{function}' failed for '{source_type}': {source}")]
    Function {
        source_type: String,
        function: String,
        #[source]
        source: FunctionError,
    },

    /// Component template is not valid JSON after substitution
    #[error("invalid component template for '{source_type}': {reason}")]
    InvalidComponentTemplate { source_type: String, reason: String },
}

/// Result alias for rule table operations
pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_error_display() {
        let err = RuleError::SchemaViolation(vec!["/rules/0: missing".into(), "/x: bad".into()]);
        assert_eq!(
            err.to_string(),
            "rule table violates schema: /rules/0: missing; /x: bad"
        );

        let err = RuleError::NoDefaultRuleFound("Legacy".into());
        assert!(err.to_string().contains("Legacy"));
    }

    #[test]
    fn skip_kinds() {
        assert!(FunctionError::NotAvailableAtTarget("x".into()).is_skip());
        assert!(FunctionError::MediaConfiguration("x".into()).is_skip());
        assert!(!FunctionError::Failed("x".into()).is_skip());
    }
}

//! Error types for the page model

/// Errors parsing model values from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Unknown page type name
    #[error("unknown page type: '{0}'")]
    UnknownPageType(String),

    /// Unknown layout category name
    #[error("unknown layout category: '{0}'")]
    UnknownLayout(String),
}

//! Error types for page analysis

use pagemod_model::PageType;

/// Errors analyzing a source page
///
/// Both variants are fatal for the page being analyzed only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HtmlError {
    /// Page format the analyzer cannot process
    #[error("unsupported page type: {0}")]
    UnsupportedPageType(PageType),

    /// Page lacks a field the analyzer needs
    #[error("page '{page}' is missing required field '{field}'")]
    MissingRequiredField { page: String, field: String },
}

impl HtmlError {
    /// Create missing field error
    pub fn missing_field(page: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            page: page.into(),
            field: field.into(),
        }
    }
}

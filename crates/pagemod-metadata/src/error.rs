//! Error types for metadata transformation
//!
//! Mapping file errors are configuration defects and abort the run.
//! Collaborator failures are reported per lookup and degrade to warnings in
//! the callers.

use std::path::PathBuf;

/// Errors loading mapping files or talking to collaborators
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Mapping file could not be read
    #[error("io error reading mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed mapping record
    #[error("invalid mapping file {path} at line {line}: {reason}")]
    InvalidMappingFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// URL that cannot anchor a rewrite
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// External directory, term store or principal lookup failed
    #[error("{service} lookup failed: {message}")]
    Lookup { service: String, message: String },
}

impl MetadataError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create mapping file error for a 1-based line
    pub fn invalid_record(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidMappingFile {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create collaborator lookup error
    pub fn lookup(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the error is a configuration defect rather than a lookup miss
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::InvalidMappingFile { .. } | Self::InvalidUrl { .. }
        )
    }
}

/// Result alias for metadata operations
pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_error_display() {
        let err = MetadataError::invalid_record("users.csv", 3, "missing target");
        assert_eq!(
            err.to_string(),
            "invalid mapping file users.csv at line 3: missing target"
        );
        assert!(err.is_configuration());

        let err = MetadataError::lookup("directory", "timeout");
        assert_eq!(err.to_string(), "directory lookup failed: timeout");
        assert!(!err.is_configuration());
    }
}

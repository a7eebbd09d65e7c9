//! Run configuration
//!
//! Loaded from TOML or assembled with the builder methods. Every section
//! is optional; an empty file is a valid configuration.
//!
//! ```toml
//! overwrite = true
//! cross_site = true
//! rule_table = "rules/webparts.json"
//! parallelism = 4
//!
//! [mappings]
//! url = "maps/urls.csv"
//! user = "maps/users.csv"
//!
//! [mapping_properties]
//! Tenant = "contoso"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use crate::error::ConfigError;
use pagemod_html::SplitterOptions;
use pagemod_model::PropertyMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of one transformation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Replace target pages that already exist
    #[serde(default)]
    pub overwrite: bool,
    /// Source and target live on different systems
    #[serde(default)]
    pub cross_site: bool,
    /// Copy item fields after persisting
    #[serde(default = "default_true")]
    pub copy_metadata: bool,
    /// Copy unique item permissions after persisting
    #[serde(default = "default_true")]
    pub copy_permissions: bool,
    #[serde(default)]
    pub splitter: SplitterOptions,
    /// Rule table file; the built-in table is used when unset
    #[serde(default)]
    pub rule_table: Option<PathBuf>,
    #[serde(default)]
    pub mappings: MappingPaths,
    /// Global tokens available to every rule
    #[serde(default)]
    pub mapping_properties: PropertyMap,
    #[serde(default)]
    pub urls: UrlSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Worker threads for batch runs
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

/// Mapping file locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPaths {
    #[serde(default)]
    pub url: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<PathBuf>,
    #[serde(default)]
    pub term: Option<PathBuf>,
}

/// URL rewrite overrides
///
/// Web URLs come from the connection contexts; these cover sub-sites and
/// renamed pages libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSettings {
    #[serde(default)]
    pub source_site_url: Option<String>,
    #[serde(default)]
    pub target_site_url: Option<String>,
    #[serde(default)]
    pub source_pages_library: Option<String>,
    #[serde(default)]
    pub target_pages_library: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_parallelism() -> usize {
    4
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            cross_site: false,
            copy_metadata: true,
            copy_permissions: true,
            splitter: SplitterOptions::default(),
            rule_table: None,
            mappings: MappingPaths::default(),
            mapping_properties: PropertyMap::new(),
            urls: UrlSettings::default(),
            logging: LoggingConfig::default(),
            parallelism: default_parallelism(),
        }
    }
}

impl TransformConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check settings serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::invalid("parallelism", "must be at least 1"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        let site_urls = (&self.urls.source_site_url, &self.urls.target_site_url);
        if site_urls.0.is_some() != site_urls.1.is_some() {
            return Err(ConfigError::invalid(
                "urls",
                "source_site_url and target_site_url must be set together",
            ));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cross_site(mut self, cross_site: bool) -> Self {
        self.cross_site = cross_site;
        self
    }

    #[must_use]
    pub fn with_rule_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.rule_table = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_url_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mappings.url = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_user_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mappings.user = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_term_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mappings.term = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_mapping_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mapping_properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_splitter(mut self, splitter: SplitterOptions) -> Self {
        self.splitter = splitter;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TransformConfig::from_toml_str("").unwrap(), TransformConfig::default());
    }

    #[test]
    fn parses_sections() {
        let config = TransformConfig::from_toml_str(
            r#"
            overwrite = true
            cross_site = true
            parallelism = 2

            [splitter]
            extract_nested_media = false

            [mappings]
            user = "users.csv"

            [mapping_properties]
            Tenant = "contoso"

            [urls]
            source_pages_library = "Pages"

            [logging]
            level = "pagemod_core=debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.overwrite);
        assert!(config.cross_site);
        assert!(config.copy_metadata);
        assert!(!config.splitter.extract_nested_media);
        assert_eq!(config.mappings.user, Some(PathBuf::from("users.csv")));
        assert_eq!(config.mappings.url, None);
        assert_eq!(config.mapping_properties.get("Tenant").map(String::as_str), Some("contoso"));
        assert_eq!(config.urls.source_pages_library.as_deref(), Some("Pages"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.parallelism, 2);
    }

    #[test]
    fn rejects_invalid_settings() {
        let err = TransformConfig::from_toml_str("parallelism = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "parallelism"));

        let err = TransformConfig::from_toml_str("[urls]\nsource_site_url = \"http://a\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "urls"));

        let err = TransformConfig::from_toml_str("overwrite = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_matches_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "overwrite = true\nrule_table = \"rules.json\"").unwrap();

        let loaded = TransformConfig::from_path(file.path()).unwrap();
        let built = TransformConfig::new().with_overwrite(true).with_rule_table("rules.json");
        assert_eq!(loaded, built);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TransformConfig::from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

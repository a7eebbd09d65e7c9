//! Mapping files
//!
//! `source,target` records, one per line. Blank lines and lines starting
//! with `#` are ignored. Either field may be wrapped in double quotes, with
//! `""` escaping a quote inside, so values containing commas survive.
//!
//! Files are parsed once per run and cached by path.

use crate::cache::{CacheKey, CacheService, LookupKind};
use crate::error::{MetadataError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One override record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    pub source: String,
    pub target: String,
}

impl MappingRecord {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Parsed mapping file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingFile {
    path: PathBuf,
    records: Vec<MappingRecord>,
}

impl MappingFile {
    /// Mapping file built from records, for callers that hold mappings in memory
    #[must_use]
    pub fn from_records(records: Vec<MappingRecord>) -> Self {
        Self {
            path: PathBuf::new(),
            records,
        }
    }

    /// Parse mapping text
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidMappingFile`] for records without a
    /// target, with an empty source, or with an unterminated quote.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let mut records = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields =
                split_record(line).map_err(|reason| MetadataError::invalid_record(&path, idx + 1, reason))?;
            let [source, target] = <[String; 2]>::try_from(fields).map_err(|fields| {
                MetadataError::invalid_record(
                    &path,
                    idx + 1,
                    format!("expected 2 fields, found {}", fields.len()),
                )
            })?;
            if source.is_empty() {
                return Err(MetadataError::invalid_record(&path, idx + 1, "empty source"));
            }
            records.push(MappingRecord { source, target });
        }

        tracing::debug!(path = %path.display(), records = records.len(), "parsed mapping file");
        Ok(Self { path, records })
    }

    /// Read and parse a file from disk
    ///
    /// # Errors
    /// Returns [`MetadataError::Io`] when the file cannot be read, or any
    /// error of [`MappingFile::parse`].
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MetadataError::io_error(path, e))?;
        Self::parse(path, &text)
    }

    /// Read a file through the cache, parsing it at most once per run
    ///
    /// # Errors
    /// Same as [`MappingFile::read`]. Failures are not cached.
    pub fn load(path: &Path, cache: &CacheService) -> Result<Arc<Self>> {
        let key = CacheKey::process(LookupKind::MappingFile, path.to_string_lossy());
        cache.get_or_try_insert_with(key, || Self::read(path).map(Arc::new))
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record whose source equals `source`, ignoring case
    #[must_use]
    pub fn lookup(&self, source: &str) -> Option<&MappingRecord> {
        self.records
            .iter()
            .find(|r| r.source.eq_ignore_ascii_case(source))
    }
}

/// Split one line on commas outside quotes
fn split_record(line: &str) -> std::result::Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if quoted {
        return Err("unterminated quote");
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn parses_records_comments_and_quotes() {
        let text = "# users\n\
                    contoso\\bob, bob@contoso.com\n\
                    \n\
                    \"Smith, Jane\",\"jane@contoso.com\"\n\
                    \"say \"\"hi\"\"\",x\n";
        let file = MappingFile::parse("users.csv", text).unwrap();

        assert_eq!(
            file.records(),
            &[
                MappingRecord::new("contoso\\bob", "bob@contoso.com"),
                MappingRecord::new("Smith, Jane", "jane@contoso.com"),
                MappingRecord::new("say \"hi\"", "x"),
            ]
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = MappingFile::parse("m.csv", "a,b\nonly-source\n").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidMappingFile { line: 2, .. }));

        let err = MappingFile::parse("m.csv", "\"open,b").unwrap_err();
        assert!(err.to_string().contains("unterminated quote"));

        let err = MappingFile::parse("m.csv", ",b").unwrap_err();
        assert!(err.to_string().contains("empty source"));
    }

    #[test]
    fn empty_target_is_allowed() {
        let file = MappingFile::parse("m.csv", "a,").unwrap();
        assert_eq!(file.lookup("A").map(|r| r.target.as_str()), Some(""));
    }

    #[test]
    fn load_reads_once_through_cache() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "http://a/old,https://b/new").unwrap();

        let cache = CacheService::new();
        let first = MappingFile::load(tmp.path(), &cache).unwrap();

        std::fs::write(tmp.path(), "changed,after-load\n").unwrap();
        let second = MappingFile::load(tmp.path(), &cache).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.records()[0].target, "https://b/new");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappingFile::load(&dir.path().join("nope.csv"), &CacheService::new()).unwrap_err();
        assert!(matches!(err, MetadataError::Io { .. }));
    }
}

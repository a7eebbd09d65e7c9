//! URL transformator
//!
//! Rewrites source system links inside arbitrary text. Rules run in a fixed
//! order, each on the output of the previous one:
//!
//! 1. Mapping file literal rewrites
//! 2. Pages library rewrite, absolute then server-relative, when the source
//!    and target library names differ
//! 3. Web URL rewrite, absolute then server-relative
//! 4. For sub-sites, steps 2 and 3 again against the root site URL
//!
//! Matching is case-insensitive and every match must be followed by a
//! path boundary, so `/sites/s1` never matches inside `/sites/s10`. A
//! trailing `.` counts as a boundary only at the end of a sentence.
//! Relative rules only match where a URL can start: at the string start or
//! after whitespace, a quote, `=`, an opening bracket, `>` or `,`. That
//! keeps them from re-matching inside an absolute URL written by an
//! earlier rule. Neither check consumes the neighbouring character, so
//! adjacent links all match. The literal root `/` is never rewritten.

use crate::error::{MetadataError, Result};
use crate::mapping_file::MappingFile;
use pagemod_model::ConnectionContext;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;
use url::Url;

/// Characters that end a path segment, besides whitespace
const BOUNDARY: &[char] = &['/', '?', '#', '"', '\'', '<', '>', ')', '&', ',', ';', ']'];
/// Characters after which a relative URL may start, besides whitespace
const URL_START: &[char] = &['"', '\'', '=', '(', '[', '>', ','];

/// Default pages library of wiki sites
pub const DEFAULT_PAGES_LIBRARY: &str = "SitePages";

/// Source and target locations a transformator rewrites between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewriteContext {
    pub source_web_url: String,
    pub target_web_url: String,
    /// Root site URL when the source web is a sub-site
    pub source_site_url: Option<String>,
    pub target_site_url: Option<String>,
    pub source_pages_library: String,
    pub target_pages_library: String,
}

impl UrlRewriteContext {
    #[must_use]
    pub fn new(source_web_url: impl Into<String>, target_web_url: impl Into<String>) -> Self {
        Self {
            source_web_url: source_web_url.into(),
            target_web_url: target_web_url.into(),
            source_site_url: None,
            target_site_url: None,
            source_pages_library: DEFAULT_PAGES_LIBRARY.to_string(),
            target_pages_library: DEFAULT_PAGES_LIBRARY.to_string(),
        }
    }

    /// Context between two connections
    #[must_use]
    pub fn between(source: &ConnectionContext, target: &ConnectionContext) -> Self {
        Self::new(source.base_url(), target.base_url())
    }

    #[must_use]
    pub fn with_site_urls(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_site_url = Some(source.into());
        self.target_site_url = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_pages_libraries(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_pages_library = source.into();
        self.target_pages_library = target.into();
        self
    }
}

/// One compiled substitution
#[derive(Debug, Clone)]
struct RewriteRule {
    pattern: Regex,
    replacement: String,
    /// Match only where a URL can start
    relative: bool,
}

impl RewriteRule {
    fn absolute(source: &str, target: &str) -> Result<Self> {
        compile(source, target, false)
    }

    fn relative(source: &str, target: &str) -> Result<Self> {
        compile(source, target, true)
    }

    fn accepts(&self, text: &str, start: usize, end: usize) -> bool {
        ends_at_boundary(&text[end..]) && (!self.relative || starts_url(&text[..start]))
    }

    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = String::new();
        let mut copied = 0;
        let mut pos = 0;
        while let Some(m) = self.pattern.find_at(text, pos) {
            if self.accepts(text, m.start(), m.end()) {
                out.push_str(&text[copied..m.start()]);
                out.push_str(&self.replacement);
                copied = m.end();
                pos = m.end();
            } else {
                // retry one character further on
                pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
            if pos >= text.len() {
                break;
            }
        }
        if copied == 0 {
            return Cow::Borrowed(text);
        }
        out.push_str(&text[copied..]);
        Cow::Owned(out)
    }
}

fn compile(source: &str, target: &str, relative: bool) -> Result<RewriteRule> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(source))).map_err(|e| {
        MetadataError::InvalidUrl {
            url: source.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(RewriteRule {
        pattern,
        replacement: target.to_string(),
        relative,
    })
}

/// Whether `rest`, the text after a match, starts with a path boundary
fn ends_at_boundary(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_whitespace() || BOUNDARY.contains(&c) => true,
        Some('.') => chars
            .next()
            .map_or(true, |c| c.is_whitespace() || matches!(c, '"' | '\'' | '<')),
        Some(_) => false,
    }
}

/// Whether a URL can start right after `before`
fn starts_url(before: &str) -> bool {
    before
        .chars()
        .next_back()
        .map_or(true, |c| c.is_whitespace() || URL_START.contains(&c))
}

/// Link rewriter between one source and one target location
#[derive(Debug, Clone)]
pub struct UrlTransformator {
    rules: Vec<RewriteRule>,
}

impl UrlTransformator {
    /// Compile rewrite rules
    ///
    /// # Errors
    /// Returns [`MetadataError::InvalidUrl`] when a web or site URL is not
    /// an absolute URL.
    pub fn new(context: &UrlRewriteContext, mapping: Option<Arc<MappingFile>>) -> Result<Self> {
        let mut rules = Vec::new();

        if let Some(mapping) = mapping {
            for record in mapping.records() {
                let source = record.source.trim();
                if is_root(source) {
                    continue;
                }
                rules.push(RewriteRule::absolute(source, record.target.trim())?);
            }
        }

        let source_web = Location::parse(&context.source_web_url)?;
        let target_web = Location::parse(&context.target_web_url)?;

        let libraries_differ = !context
            .source_pages_library
            .eq_ignore_ascii_case(&context.target_pages_library);
        if libraries_differ {
            let source_lib = source_web.join(&context.source_pages_library);
            let target_lib = target_web.join(&context.target_pages_library);
            push_pair(&mut rules, &source_lib, &target_lib)?;
        }

        push_pair(&mut rules, &source_web, &target_web)?;

        if let Some(source_site) = &context.source_site_url {
            let source_site = Location::parse(source_site)?;
            if source_site != source_web {
                let target_site = match &context.target_site_url {
                    Some(url) => Location::parse(url)?,
                    None => target_web.clone(),
                };
                if libraries_differ {
                    let source_lib = source_site.join(&context.source_pages_library);
                    let target_lib = target_site.join(&context.target_pages_library);
                    push_pair(&mut rules, &source_lib, &target_lib)?;
                }
                push_pair(&mut rules, &source_site, &target_site)?;
            }
        }

        tracing::debug!(
            source = %context.source_web_url,
            target = %context.target_web_url,
            rules = rules.len(),
            "compiled url rewrite rules"
        );
        Ok(Self { rules })
    }

    /// Rewrite every source link in `text`
    #[must_use]
    pub fn transform(&self, text: &str) -> String {
        let mut current = text.to_string();
        let mut changed = false;
        for rule in &self.rules {
            let rewritten = match rule.apply(&current) {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(rewritten) = rewritten {
                current = rewritten;
                changed = true;
            }
        }
        if changed {
            tracing::trace!(input = text, output = %current, "rewrote urls");
        }
        current
    }

    #[inline]
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

fn push_pair(rules: &mut Vec<RewriteRule>, source: &Location, target: &Location) -> Result<()> {
    if source.absolute.eq_ignore_ascii_case(&target.absolute) {
        return Ok(());
    }
    rules.push(RewriteRule::absolute(&source.absolute, &target.absolute)?);
    if !is_root(&source.path) {
        rules.push(RewriteRule::relative(&source.path, &target.path)?);
    }
    Ok(())
}

fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Absolute URL and server-relative path, both without trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    absolute: String,
    path: String,
}

impl Location {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| MetadataError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(MetadataError::InvalidUrl {
                url: raw.to_string(),
                reason: "not a hierarchical url".to_string(),
            });
        }
        Ok(Self {
            absolute: trimmed.to_string(),
            path: parsed.path().trim_end_matches('/').to_string(),
        })
    }

    fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        Self {
            absolute: format!("{}/{segment}", self.absolute),
            path: format!("{}/{segment}", self.path),
        }
    }
}

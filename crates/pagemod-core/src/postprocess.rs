//! Post-processing
//!
//! Runs after the target page is persisted: copies the source item's
//! metadata fields, then its unique permissions. Nothing here fails the
//! page; every problem becomes a warning in the [`PostProcessReport`].
//!
//! Field handling:
//! - built-in fields (per [`FieldCatalog`]) and fields missing on the
//!   target list are skipped
//! - user fields go through identity mapping, unresolved users are dropped
//! - taxonomy fields go through the term store, unresolved terms are dropped
//! - URL and rich text fields get their links rewritten

use crate::error::WriteError;
use crate::stage::PostProcess;
use pagemod_metadata::{IdentityTransformator, TaxonomyTransformator, UrlTransformator};
use pagemod_model::{FieldValue, ResolvedPrincipal, RoleAssignment, SourceField, SourcePage};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Built-in field lookup of the target platform
pub trait FieldCatalog: Send + Sync {
    /// Whether `field_id` is a platform field that must not be copied
    fn is_known_field(&self, field_id: &str) -> bool;
}

/// Set of built-in field ids, compared ignoring case
impl FieldCatalog for HashSet<String> {
    fn is_known_field(&self, field_id: &str) -> bool {
        self.contains(field_id) || self.iter().any(|id| id.eq_ignore_ascii_case(field_id))
    }
}

/// Field present on the target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub internal_name: String,
    /// Bound term set, for taxonomy fields
    #[serde(default)]
    pub term_set_id: Option<String>,
}

impl TargetField {
    #[must_use]
    pub fn new(internal_name: impl Into<String>) -> Self {
        Self {
            internal_name: internal_name.into(),
            term_set_id: None,
        }
    }

    #[must_use]
    pub fn with_term_set(mut self, term_set_id: impl Into<String>) -> Self {
        self.term_set_id = Some(term_set_id.into());
        self
    }
}

/// New value for one target field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub internal_name: String,
    pub value: FieldValue,
}

/// Permissions to apply to the target item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet {
    pub role_assignments: Vec<RoleAssignment>,
    /// Target principal per assignment key
    pub principals: HashMap<String, ResolvedPrincipal>,
}

/// List item of the persisted target page
pub trait ItemWriter: Send + Sync {
    fn target_fields(&self, page: &str) -> Result<Vec<TargetField>, WriteError>;
    fn set_fields(&self, page: &str, updates: &[FieldUpdate]) -> Result<(), WriteError>;
    /// Break inheritance and apply `permissions`
    fn apply_permissions(&self, page: &str, permissions: &PermissionSet) -> Result<(), WriteError>;
}

/// What post-processing did
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostProcessReport {
    pub fields_copied: Vec<String>,
    pub fields_skipped: Vec<String>,
    pub permissions_copied: bool,
    pub warnings: Vec<String>,
}

impl PostProcessReport {
    #[inline]
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Default post-processing stage
pub struct PostProcessor {
    fields: Arc<dyn FieldCatalog>,
    writer: Arc<dyn ItemWriter>,
    identity: Option<Arc<IdentityTransformator>>,
    taxonomy: Option<Arc<TaxonomyTransformator>>,
    urls: Option<Arc<UrlTransformator>>,
    copy_metadata: bool,
    copy_permissions: bool,
}

impl std::fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessor")
            .field("identity", &self.identity.is_some())
            .field("taxonomy", &self.taxonomy.is_some())
            .field("urls", &self.urls.is_some())
            .field("copy_metadata", &self.copy_metadata)
            .field("copy_permissions", &self.copy_permissions)
            .finish_non_exhaustive()
    }
}

impl PostProcessor {
    #[must_use]
    pub fn new(fields: Arc<dyn FieldCatalog>, writer: Arc<dyn ItemWriter>) -> Self {
        Self {
            fields,
            writer,
            identity: None,
            taxonomy: None,
            urls: None,
            copy_metadata: true,
            copy_permissions: true,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<IdentityTransformator>) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn with_taxonomy(mut self, taxonomy: Arc<TaxonomyTransformator>) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    #[must_use]
    pub fn with_urls(mut self, urls: Arc<UrlTransformator>) -> Self {
        self.urls = Some(urls);
        self
    }

    #[must_use]
    pub fn copying(mut self, metadata: bool, permissions: bool) -> Self {
        self.copy_metadata = metadata;
        self.copy_permissions = permissions;
        self
    }

    /// Copy fields and permissions of `source` onto `target_page`
    #[must_use]
    pub fn run(&self, source: &SourcePage, target_page: &str) -> PostProcessReport {
        let mut report = PostProcessReport::default();
        if self.copy_metadata && !source.item.fields.is_empty() {
            self.copy_fields(source, target_page, &mut report);
        }
        if self.copy_permissions && source.item.has_unique_permissions {
            self.copy_permissions(source, target_page, &mut report);
        }
        tracing::debug!(
            page = target_page,
            copied = report.fields_copied.len(),
            skipped = report.fields_skipped.len(),
            warnings = report.warnings.len(),
            "post-processing done"
        );
        report
    }

    fn copy_fields(&self, source: &SourcePage, target_page: &str, report: &mut PostProcessReport) {
        let target_fields = match self.writer.target_fields(target_page) {
            Ok(fields) => fields,
            Err(e) => {
                report.warn(format!("could not read target fields of '{target_page}': {e}"));
                return;
            }
        };

        let mut updates = Vec::new();
        for field in &source.item.fields {
            if self.fields.is_known_field(&field.id) || field.value.is_null() {
                report.fields_skipped.push(field.internal_name.clone());
                continue;
            }
            let Some(target) = target_fields
                .iter()
                .find(|t| t.internal_name.eq_ignore_ascii_case(&field.internal_name))
            else {
                tracing::debug!(field = %field.internal_name, "field not on target list");
                report.fields_skipped.push(field.internal_name.clone());
                continue;
            };
            if let Some(value) = self.transform_value(field, target, report) {
                updates.push(FieldUpdate {
                    internal_name: target.internal_name.clone(),
                    value,
                });
            } else {
                report.fields_skipped.push(field.internal_name.clone());
            }
        }

        if updates.is_empty() {
            return;
        }
        match self.writer.set_fields(target_page, &updates) {
            Ok(()) => report
                .fields_copied
                .extend(updates.into_iter().map(|u| u.internal_name)),
            Err(e) => report.warn(format!("could not write fields of '{target_page}': {e}")),
        }
    }

    fn transform_value(
        &self,
        field: &SourceField,
        target: &TargetField,
        report: &mut PostProcessReport,
    ) -> Option<FieldValue> {
        let name = &field.internal_name;
        let value = match &field.value {
            FieldValue::User(keys) => {
                let Some(identity) = &self.identity else {
                    return Some(field.value.clone());
                };
                let mut logins = Vec::with_capacity(keys.len());
                for key in keys {
                    match identity.resolve(key) {
                        Some(principal) => logins.push(principal.login_name),
                        None => report.warn(format!("user '{key}' of field '{name}' not found on target, dropped")),
                    }
                }
                FieldValue::User(logins)
            }
            FieldValue::Taxonomy(terms) => {
                let Some(taxonomy) = &self.taxonomy else {
                    return Some(field.value.clone());
                };
                let Some(term_set) = &target.term_set_id else {
                    report.warn(format!("field '{name}' has no term set on target, left unset"));
                    return None;
                };
                let source_set = field.term_set_id.as_deref().unwrap_or(term_set);
                let mut resolved = Vec::with_capacity(terms.len());
                for term in terms {
                    match taxonomy.transform(source_set, term_set, term).into_option() {
                        Some(target_term) => resolved.push(target_term),
                        None => report.warn(format!(
                            "term '{}' of field '{name}' not found on target, dropped",
                            term.label
                        )),
                    }
                }
                FieldValue::Taxonomy(resolved)
            }
            FieldValue::Url { url, description } => FieldValue::Url {
                url: self.rewrite(url),
                description: description.clone(),
            },
            FieldValue::Note(html) => FieldValue::Note(self.rewrite(html)),
            other => other.clone(),
        };
        Some(value)
    }

    fn rewrite(&self, text: &str) -> String {
        match &self.urls {
            Some(urls) => urls.transform(text),
            None => text.to_string(),
        }
    }

    fn copy_permissions(&self, source: &SourcePage, target_page: &str, report: &mut PostProcessReport) {
        let mut permissions = PermissionSet::default();
        for assignment in &source.item.role_assignments {
            let principal = match &self.identity {
                Some(identity) => identity.resolve(&assignment.principal_key),
                None => Some(ResolvedPrincipal::user(&assignment.principal_key)),
            };
            let Some(principal) = principal else {
                report.warn(format!(
                    "principal '{}' not found on target, permission skipped",
                    assignment.principal_key
                ));
                continue;
            };
            permissions
                .principals
                .insert(assignment.principal_key.clone(), principal);
            permissions.role_assignments.push(assignment.clone());
        }

        match self.writer.apply_permissions(target_page, &permissions) {
            Ok(()) => report.permissions_copied = true,
            Err(e) if e.is_access_denied() => {
                report.warn(format!("no permission to copy permissions to '{target_page}': {e}"));
            }
            Err(e) => report.warn(format!("could not copy permissions to '{target_page}': {e}")),
        }
    }
}

impl PostProcess for PostProcessor {
    fn post_process(&self, source: &SourcePage, target_page: &str) -> PostProcessReport {
        self.run(source, target_page)
    }
}

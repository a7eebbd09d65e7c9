//! Testing utilities for the Pagemod workspace
//!
//! In-memory collaborators and page fixtures shared by integration tests.

#![allow(missing_docs)]

use pagemod_core::{
    ComponentDefinition, FieldCatalog, FieldUpdate, ItemWriter, ObserverSink, PageStore,
    PermissionSet, TargetField, WriteError,
};
use pagemod_metadata::{PrincipalResolver, TermSetTree, TermStore};
use pagemod_model::{
    ConnectionContext, PageType, PlatformVersion, ResolvedPrincipal, Section, SourcePage,
};
use pagemod_rules::{AssetTransfer, FunctionError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const SOURCE_URL: &str = "http://a/sites/s1";
pub const TARGET_URL: &str = "https://b/sites/s2";

/// On-premises source and cloud target contexts
pub fn contexts() -> (ConnectionContext, ConnectionContext) {
    (
        ConnectionContext::new(SOURCE_URL, PlatformVersion::OnPremises2016),
        ConnectionContext::new(TARGET_URL, PlatformVersion::Online),
    )
}

/// Page store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryPageStore {
    existing: HashSet<String>,
    fail_persist: bool,
    pages: Mutex<HashMap<String, Vec<Section>>>,
}

impl InMemoryPageStore {
    /// Store where `names` already exist
    pub fn with_existing<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self {
            existing: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Store rejecting every write
    pub fn failing() -> Self {
        Self {
            fail_persist: true,
            ..Self::default()
        }
    }

    pub fn page(&self, name: &str) -> Option<Vec<Section>> {
        self.pages.lock().get(name).cloned()
    }

    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }
}

impl PageStore for InMemoryPageStore {
    fn page_exists(&self, name: &str) -> Result<bool, WriteError> {
        Ok(self.existing.contains(name) || self.pages.lock().contains_key(name))
    }

    fn persist_page(&self, name: &str, sections: &[Section]) -> Result<(), WriteError> {
        if self.fail_persist {
            return Err(WriteError::Failed("store is read-only".to_string()));
        }
        self.pages.lock().insert(name.to_string(), sections.to_vec());
        Ok(())
    }
}

/// Target list item writer recording every write
#[derive(Debug, Default)]
pub struct InMemoryItemWriter {
    fields: Vec<TargetField>,
    deny_permissions: bool,
    written: Mutex<HashMap<String, Vec<FieldUpdate>>>,
    permissions: Mutex<HashMap<String, PermissionSet>>,
}

impl InMemoryItemWriter {
    pub fn with_fields(fields: Vec<TargetField>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn denying_permissions(mut self) -> Self {
        self.deny_permissions = true;
        self
    }

    pub fn written(&self, page: &str) -> Vec<FieldUpdate> {
        self.written.lock().get(page).cloned().unwrap_or_default()
    }

    pub fn permissions(&self, page: &str) -> Option<PermissionSet> {
        self.permissions.lock().get(page).cloned()
    }
}

impl ItemWriter for InMemoryItemWriter {
    fn target_fields(&self, _page: &str) -> Result<Vec<TargetField>, WriteError> {
        Ok(self.fields.clone())
    }

    fn set_fields(&self, page: &str, updates: &[FieldUpdate]) -> Result<(), WriteError> {
        self.written
            .lock()
            .entry(page.to_string())
            .or_default()
            .extend_from_slice(updates);
        Ok(())
    }

    fn apply_permissions(&self, page: &str, permissions: &PermissionSet) -> Result<(), WriteError> {
        if self.deny_permissions {
            return Err(WriteError::AccessDenied(format!("'{page}' is locked")));
        }
        self.permissions
            .lock()
            .insert(page.to_string(), permissions.clone());
        Ok(())
    }
}

/// Built-in field ids
#[derive(Debug, Default)]
pub struct StaticFieldCatalog(HashSet<String>);

impl StaticFieldCatalog {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
        Self(ids.into_iter().map(|id| id.into().to_lowercase()).collect())
    }
}

impl FieldCatalog for StaticFieldCatalog {
    fn is_known_field(&self, field_id: &str) -> bool {
        self.0.contains(&field_id.to_lowercase())
    }
}

/// Target principals known by login name
#[derive(Debug, Default)]
pub struct InMemoryPrincipalResolver {
    users: HashSet<String>,
    groups: HashSet<String>,
    calls: Mutex<usize>,
}

impl InMemoryPrincipalResolver {
    pub fn with_users(users: &[&str]) -> Self {
        Self {
            users: users.iter().map(|u| (*u).to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn and_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| (*g).to_string()).collect();
        self
    }

    /// Number of `ensure_principal` calls so far
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl PrincipalResolver for InMemoryPrincipalResolver {
    fn ensure_principal(
        &self,
        _context: &ConnectionContext,
        key: &str,
    ) -> pagemod_metadata::Result<Option<ResolvedPrincipal>> {
        *self.calls.lock() += 1;
        if self.users.contains(key) {
            Ok(Some(ResolvedPrincipal::user(key)))
        } else if self.groups.contains(key) {
            Ok(Some(ResolvedPrincipal::group(key)))
        } else {
            Ok(None)
        }
    }
}

/// Term sets per context base URL
#[derive(Debug, Default)]
pub struct InMemoryTermStore {
    sets: HashMap<(String, String), TermSetTree>,
    fetches: Mutex<usize>,
}

impl InMemoryTermStore {
    #[must_use]
    pub fn with_set(mut self, context: &ConnectionContext, tree: TermSetTree) -> Self {
        self.sets
            .insert((context.base_url().to_string(), tree.id.to_lowercase()), tree);
        self
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock()
    }
}

impl TermStore for InMemoryTermStore {
    fn fetch_term_set(
        &self,
        context: &ConnectionContext,
        term_set_id: &str,
    ) -> pagemod_metadata::Result<Option<TermSetTree>> {
        *self.fetches.lock() += 1;
        let key = (context.base_url().to_string(), term_set_id.to_lowercase());
        Ok(self.sets.get(&key).cloned())
    }
}

/// Asset transfer moving files under a target asset folder
#[derive(Debug)]
pub struct InMemoryAssetTransfer {
    target_folder: String,
    transferred: Mutex<Vec<String>>,
}

impl InMemoryAssetTransfer {
    pub fn new(target_folder: impl Into<String>) -> Self {
        Self {
            target_folder: target_folder.into(),
            transferred: Mutex::new(Vec::new()),
        }
    }

    pub fn transferred(&self) -> Vec<String> {
        self.transferred.lock().clone()
    }
}

impl AssetTransfer for InMemoryAssetTransfer {
    fn transfer_asset(&self, source_url: &str) -> Result<String, FunctionError> {
        let file = source_url.rsplit('/').next().unwrap_or(source_url);
        self.transferred.lock().push(source_url.to_string());
        Ok(format!("{}/{file}", self.target_folder.trim_end_matches('/')))
    }
}

/// Standard catalog with text-adjacent components
pub fn component_catalog() -> Vec<ComponentDefinition> {
    vec![
        ComponentDefinition::new("d1d91016-032f-456d-98a4-721247c305e8", "Image"),
        ComponentDefinition::new("490d7c76-1824-45b2-9de3-676421c997fa", "Embed"),
        ComponentDefinition::new("f92bf067-bc19-489e-a556-7fe95f508720", "List"),
    ]
}

/// Observer keeping every message
#[derive(Debug, Default)]
pub struct RecordingObserver {
    messages: Mutex<Vec<(Level, Uuid, String)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
}

impl RecordingObserver {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    /// Distinct correlation ids seen
    pub fn correlation_ids(&self) -> HashSet<Uuid> {
        self.messages.lock().iter().map(|(_, id, _)| *id).collect()
    }

    fn push(&self, level: Level, id: Uuid, message: &str) {
        self.messages.lock().push((level, id, message.to_string()));
    }
}

impl ObserverSink for RecordingObserver {
    fn on_info(&self, correlation_id: Uuid, message: &str) {
        self.push(Level::Info, correlation_id, message);
    }

    fn on_warning(&self, correlation_id: Uuid, message: &str) {
        self.push(Level::Warning, correlation_id, message);
    }

    fn on_error(&self, correlation_id: Uuid, message: &str) {
        self.push(Level::Error, correlation_id, message);
    }

    fn on_debug(&self, correlation_id: Uuid, message: &str) {
        self.push(Level::Debug, correlation_id, message);
    }
}

/// Wiki page with a header row and two body columns
pub fn wiki_page_with_header() -> SourcePage {
    SourcePage::new("team.aspx", PageType::Wiki).with_content(
        r#"<table id="layoutsTable"><tbody>
<tr><td colspan="2"><div class="ms-rte-layoutszone-inner"><h1>Team site</h1></div></td></tr>
<tr>
<td><div class="ms-rte-layoutszone-inner"><p>Left <a href="http://a/sites/s1/SitePages/Left.aspx">more</a></p><img src="http://a/sites/s1/SiteAssets/chart.png" alt="Chart"/></div></td>
<td><div class="ms-rte-layoutszone-inner"><p>Right</p></div></td>
</tr>
</tbody></table>"#,
    )
}

/// Rule table with a selector-driven legacy block
pub const SAMPLE_RULE_TABLE: &str = r#"{
  "version": "1.0",
  "rules": [
    {
      "sourceType": "RichText",
      "functions": [{ "name": "TextCleanup", "args": ["{Text}"], "output": "Text" }],
      "variants": [{ "outputs": [{ "kind": "text", "order": 10, "template": "{Text}" }] }]
    },
    {
      "sourceType": "Media",
      "variants": [{ "outputs": [{ "kind": "text", "order": 10, "template": "<img src=\"{ImageUrl}\">" }] }]
    },
    {
      "sourceType": "Legacy",
      "selector": { "name": "PropertyValueSelector", "args": ["{Mode}"] },
      "variants": [
        { "name": "Alt", "outputs": [{ "kind": "text", "order": 10, "template": "<p>alt {Title}</p>" }] },
        { "default": true, "outputs": [{ "kind": "text", "order": 10, "template": "<p>default {Title}</p>" }] }
      ]
    },
    {
      "sourceType": "Placeholder",
      "default": true,
      "variants": [{ "outputs": [{ "kind": "text", "order": 10, "template": "<p>unsupported {Title}</p>" }] }]
    }
  ]
}"#;

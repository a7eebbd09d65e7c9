//! Source list items
//!
//! Metadata and permissions of the list item backing a page, copied to the
//! target item after the page is persisted.

use serde::{Deserialize, Serialize};

/// Reference to a taxonomy term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermRef {
    /// Term id (GUID string)
    pub id: String,
    /// Display label
    pub label: String,
}

impl TermRef {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Text(String),
    /// Multi-line rich text
    Note(String),
    Url { url: String, description: String },
    /// Principal keys (login names)
    User(Vec<String>),
    Taxonomy(Vec<TermRef>),
    Number(f64),
    Boolean(bool),
    DateTime(String),
    Null,
}

impl FieldValue {
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One source field with its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    /// Field id (GUID string)
    pub id: String,
    pub internal_name: String,
    pub value: FieldValue,
    /// Term set the field is bound to, for taxonomy fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_set_id: Option<String>,
}

impl SourceField {
    #[must_use]
    pub fn new(id: impl Into<String>, internal_name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            id: id.into(),
            internal_name: internal_name.into(),
            value,
            term_set_id: None,
        }
    }

    #[must_use]
    pub fn with_term_set(mut self, term_set_id: impl Into<String>) -> Self {
        self.term_set_id = Some(term_set_id.into());
        self
    }
}

/// Principal with its granted role names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal_key: String,
    pub roles: Vec<String>,
}

impl RoleAssignment {
    #[must_use]
    pub fn new<I, S>(principal_key: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal_key: principal_key.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Identity that exists on the target system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedPrincipal {
    pub login_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl ResolvedPrincipal {
    #[inline]
    #[must_use]
    pub fn user(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            display_name: None,
            is_group: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn group(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            display_name: None,
            is_group: true,
        }
    }
}

/// List item backing a source page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceItem {
    #[serde(default)]
    pub fields: Vec<SourceField>,
    /// Item breaks permission inheritance
    #[serde(default)]
    pub has_unique_permissions: bool,
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
}

impl SourceItem {
    #[must_use]
    pub fn with_field(mut self, field: SourceField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_unique_permissions(mut self, assignments: Vec<RoleAssignment>) -> Self {
        self.has_unique_permissions = true;
        self.role_assignments = assignments;
        self
    }

    /// Find field by internal name, ignoring case
    #[must_use]
    pub fn field(&self, internal_name: &str) -> Option<&SourceField> {
        self.fields
            .iter()
            .find(|f| f.internal_name.eq_ignore_ascii_case(internal_name))
    }
}

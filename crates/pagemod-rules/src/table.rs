//! Rule table
//!
//! JSON document mapping source block types to target outputs. A table is
//! validated in three passes before use, and never at resolution time:
//!
//! 1. JSON Schema (`schema/rule_table.schema.json`)
//! 2. Deserialization into the rule model
//! 3. Semantic checks: unique source types, at most one default rule, at
//!    most one default variant per rule, unique variant names, and every
//!    function and selector name registered
//!
//! # Example
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "sourceType": "ContentEditorWebPart",
//!       "functions": [{ "name": "TextCleanup", "args": ["{Content}"], "output": "Content" }],
//!       "variants": [
//!         { "outputs": [{ "kind": "text", "order": 10, "template": "{Content}" }] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::{Result, RuleError};
use crate::registry::FunctionRegistry;
use indexmap::IndexMap;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

const SCHEMA_SOURCE: &str = include_str!("../schema/rule_table.schema.json");
const BUILTIN_RULES: &str = include_str!("../rules/builtin.json");

static SCHEMA: Lazy<std::result::Result<JSONSchema, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(SCHEMA_SOURCE).map_err(|e| e.to_string())?;
    JSONSchema::compile(&schema).map_err(|e| e.to_string())
});

/// Named function invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments, `{Token}` references substituted before the call
    #[serde(default)]
    pub args: Vec<String>,
    /// Property receiving the result, defaults to the function name
    #[serde(default)]
    pub output: Option<String>,
}

impl FunctionCall {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            output: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Property name the result is stored under
    #[inline]
    #[must_use]
    pub fn output_key(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.name)
    }
}

/// Target output kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Text,
    Component,
}

/// One output of a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub kind: OutputKind,
    /// Relative order among the variant's outputs
    pub order: u32,
    /// Markup (text) or JSON (component) with `{Token}` references
    pub template: String,
    /// Component id or title, for component outputs
    #[serde(default)]
    pub component: Option<String>,
}

/// One concrete mapping of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingVariant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "default")]
    pub is_default: bool,
    #[serde(default)]
    pub functions: Vec<FunctionCall>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl MappingVariant {
    #[inline]
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Rule for one source block type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub source_type: String,
    #[serde(default, rename = "default")]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub cross_site_supported: bool,
    #[serde(default)]
    pub selector: Option<FunctionCall>,
    #[serde(default)]
    pub functions: Vec<FunctionCall>,
    pub variants: Vec<MappingVariant>,
}

fn default_true() -> bool {
    true
}

impl MappingRule {
    /// Variant by name, ignoring case
    #[must_use]
    pub fn variant(&self, name: &str) -> Option<&MappingVariant> {
        self.variants.iter().find(|v| v.is_named(name))
    }

    /// Variant used when no selector decides: the sole one, else the default-flagged one
    #[must_use]
    pub fn fallback_variant(&self) -> Option<&MappingVariant> {
        match self.variants.as_slice() {
            [only] => Some(only),
            variants => variants.iter().find(|v| v.is_default),
        }
    }

    fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.functions
            .iter()
            .chain(self.variants.iter().flat_map(|v| v.functions.iter()))
    }
}

#[derive(Debug, Deserialize)]
struct RuleTableDocument {
    #[serde(default)]
    version: Option<String>,
    rules: Vec<MappingRule>,
}

/// Validated, immutable rule table
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    version: Option<String>,
    /// Keyed by lower-cased source type
    rules: IndexMap<String, MappingRule>,
    default_rule: Option<String>,
}

impl RuleTable {
    /// Parse and validate a rule table
    ///
    /// # Errors
    /// Any [`RuleError`] other than `Io` and `NoDefaultRuleFound`.
    pub fn from_json(source: &str, registry: &FunctionRegistry) -> Result<Self> {
        let document: Value =
            serde_json::from_str(source).map_err(|e| RuleError::InvalidDocument(e.to_string()))?;
        validate_schema(&document)?;
        let document: RuleTableDocument = serde_json::from_value(document)
            .map_err(|e| RuleError::InvalidDocument(e.to_string()))?;

        let mut table = Self {
            version: document.version,
            ..Self::default()
        };
        for rule in document.rules {
            table.add(rule, registry)?;
        }

        tracing::info!(
            rules = table.rules.len(),
            default_rule = ?table.default_rule,
            "loaded rule table"
        );
        Ok(table)
    }

    /// Read, parse and validate a rule table file
    ///
    /// # Errors
    /// [`RuleError::Io`] when unreadable, else as [`RuleTable::from_json`].
    pub fn from_path(path: &Path, registry: &FunctionRegistry) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| RuleError::io_error(path, e))?;
        Self::from_json(&source, registry)
    }

    /// Table shipped with the crate, covering split text and media plus
    /// common legacy web parts
    ///
    /// # Errors
    /// As [`RuleTable::from_json`], when `registry` lacks a built-in.
    pub fn builtin(registry: &FunctionRegistry) -> Result<Self> {
        Self::from_json(BUILTIN_RULES, registry)
    }

    fn add(&mut self, rule: MappingRule, registry: &FunctionRegistry) -> Result<()> {
        let key = rule.source_type.to_lowercase();
        if self.rules.contains_key(&key) {
            return Err(RuleError::DuplicateSourceType(rule.source_type));
        }

        if rule.is_default {
            if let Some(first) = &self.default_rule {
                return Err(RuleError::DuplicateDefaultRule {
                    first: self.rules[first].source_type.clone(),
                    second: rule.source_type,
                });
            }
            self.default_rule = Some(key.clone());
        }

        if rule.variants.iter().filter(|v| v.is_default).count() > 1 {
            return Err(RuleError::DuplicateDefaultVariant(rule.source_type));
        }

        let mut names = HashSet::new();
        for name in rule.variants.iter().filter_map(|v| v.name.as_deref()) {
            if !names.insert(name.to_lowercase()) {
                return Err(RuleError::DuplicateVariantName {
                    source_type: rule.source_type.clone(),
                    name: name.to_string(),
                });
            }
        }

        if let Some(selector) = &rule.selector {
            if !registry.contains_selector(&selector.name) {
                return Err(RuleError::UnknownSelector {
                    source_type: rule.source_type.clone(),
                    name: selector.name.clone(),
                });
            }
        }
        if let Some(call) = rule.function_calls().find(|c| !registry.contains_function(&c.name)) {
            return Err(RuleError::UnknownFunction {
                source_type: rule.source_type.clone(),
                name: call.name.clone(),
            });
        }

        self.rules.insert(key, rule);
        Ok(())
    }

    /// Rule registered for `source_type`, ignoring case
    #[must_use]
    pub fn rule(&self, source_type: &str) -> Option<&MappingRule> {
        self.rules.get(&source_type.to_lowercase())
    }

    /// The table's default rule
    #[must_use]
    pub fn default_rule(&self) -> Option<&MappingRule> {
        self.default_rule.as_ref().and_then(|key| self.rules.get(key))
    }

    /// Rule for `source_type`, falling back to the default rule
    ///
    /// # Errors
    /// [`RuleError::NoDefaultRuleFound`] when neither exists.
    pub fn rule_or_default(&self, source_type: &str) -> Result<&MappingRule> {
        self.rule(source_type)
            .or_else(|| self.default_rule())
            .ok_or_else(|| RuleError::NoDefaultRuleFound(source_type.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in declaration order
    pub fn rules(&self) -> impl Iterator<Item = &MappingRule> {
        self.rules.values()
    }
}

fn validate_schema(document: &Value) -> Result<()> {
    let schema = SCHEMA
        .as_ref()
        .map_err(|e| RuleError::InvalidDocument(format!("rule table schema unusable: {e}")))?;

    if let Err(errors) = schema.validate(document) {
        let violations: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        return Err(RuleError::SchemaViolation(violations));
    }
    Ok(())
}

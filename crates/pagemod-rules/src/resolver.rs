//! Mapping resolver
//!
//! Turns one content block into the outputs of one rule variant.
//!
//! # Algorithm
//!
//! 1. Rule by block type, else the table's default rule; neither is a
//!    run-fatal [`RuleError::NoDefaultRuleFound`]
//! 2. Rules not portable across systems are skipped during cross-site runs
//! 3. Rule functions run, then the selector picks a variant name
//! 4. Variant: named → sole → default-flagged → default rule's variant
//! 5. Variant functions run, output templates are substituted
//!
//! Functions raising a skip kind drop the block; any other function error
//! fails the page. Both come back as an [`Outcome`], never as a panic or a
//! run-level error.

use crate::error::{FunctionError, ResolveError, Result, RuleError};
use crate::registry::{FunctionContext, FunctionEnv, FunctionRegistry};
use crate::table::{FunctionCall, MappingRule, MappingVariant, OutputKind, RuleTable};
use crate::tokens::{substitute, substitute_arg, Escape};
use pagemod_model::{BlockPosition, ContentBlock, PropertyMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Why a block was not placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Block was marked closed by the analyzer
    Closed,
    NotAvailableAtTarget(String),
    /// Rule cannot be used across systems
    NonPortable(String),
    MediaConfiguration(String),
    /// Component output matched nothing in the target catalog
    UnknownComponent(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::NotAvailableAtTarget(m) => write!(f, "not available at target: {m}"),
            Self::NonPortable(t) => write!(f, "'{t}' is not supported in cross-site transfers"),
            Self::MediaConfiguration(m) => write!(f, "media configuration: {m}"),
            Self::UnknownComponent(c) => write!(f, "unknown component '{c}'"),
        }
    }
}

impl SkipReason {
    fn from_function(error: FunctionError) -> Option<Self> {
        match error {
            FunctionError::NotAvailableAtTarget(m) => Some(Self::NotAvailableAtTarget(m)),
            FunctionError::MediaConfiguration(m) => Some(Self::MediaConfiguration(m)),
            _ => None,
        }
    }
}

/// One resolved output of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolvedOutput {
    Text {
        order: u32,
        html: String,
    },
    Component {
        order: u32,
        /// Component id or title, matched against the target catalog
        component: String,
        data: Value,
    },
}

impl ResolvedOutput {
    #[inline]
    #[must_use]
    pub fn order(&self) -> u32 {
        match self {
            Self::Text { order, .. } | Self::Component { order, .. } => *order,
        }
    }
}

/// Block with its outputs, ready for placement
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBlock {
    pub position: BlockPosition,
    pub source_type: String,
    /// Name of the chosen variant, if it has one
    pub variant: Option<String>,
    /// Outputs sorted by order
    pub outputs: Vec<ResolvedOutput>,
}

/// Result of resolving one block
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Placed(ResolvedBlock),
    Skipped(SkipReason),
    Fatal(ResolveError),
}

impl Outcome {
    #[inline]
    #[must_use]
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed(_))
    }
}

/// Resolver settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Source and target are different systems
    pub cross_site: bool,
    /// Global tokens merged under every block's properties
    pub mapping_properties: PropertyMap,
}

/// Resolves blocks against one rule table
#[derive(Debug, Clone)]
pub struct MappingResolver {
    table: Arc<RuleTable>,
    registry: Arc<FunctionRegistry>,
    options: ResolveOptions,
}

impl MappingResolver {
    #[must_use]
    pub fn new(table: Arc<RuleTable>, registry: Arc<FunctionRegistry>, options: ResolveOptions) -> Self {
        Self {
            table,
            registry,
            options,
        }
    }

    #[inline]
    #[must_use]
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Resolve one block
    ///
    /// # Errors
    /// [`RuleError::NoDefaultRuleFound`] when the block type has no rule and
    /// the table has no default rule. Page- and block-level failures are
    /// reported through [`Outcome`].
    pub fn resolve(&self, block: &ContentBlock, env: &FunctionEnv) -> Result<Outcome> {
        if block.closed {
            return Ok(Outcome::Skipped(SkipReason::Closed));
        }

        let rule = self.table.rule_or_default(&block.block_type)?;
        if self.options.cross_site && !rule.cross_site_supported {
            tracing::warn!(
                block_type = %block.block_type,
                rule = %rule.source_type,
                "rule not supported across sites, skipping block"
            );
            return Ok(Outcome::Skipped(SkipReason::NonPortable(rule.source_type.clone())));
        }

        let mut properties = self.merged_properties(block);

        if let Err(outcome) = self.run_functions(rule, &rule.functions, &mut properties, env) {
            return Ok(outcome);
        }

        let selected = match self.run_selector(rule, &properties, env) {
            Ok(selected) => selected,
            Err(outcome) => return Ok(outcome),
        };

        let Some((owner, variant)) = self.choose_variant(rule, selected.as_deref())? else {
            tracing::warn!(block_type = %block.block_type, "no usable variant, skipping block");
            return Ok(Outcome::Skipped(SkipReason::NotAvailableAtTarget(format!(
                "no variant for '{}'",
                block.block_type
            ))));
        };

        if let Err(outcome) = self.run_functions(owner, &variant.functions, &mut properties, env) {
            return Ok(outcome);
        }

        let outputs = match render_outputs(owner, variant, &properties) {
            Ok(outputs) => outputs,
            Err(e) => return Ok(Outcome::Fatal(e)),
        };

        tracing::debug!(
            block_type = %block.block_type,
            rule = %owner.source_type,
            variant = ?variant.name,
            outputs = outputs.len(),
            "resolved block"
        );
        Ok(Outcome::Placed(ResolvedBlock {
            position: block.position(),
            source_type: block.block_type.clone(),
            variant: variant.name.clone(),
            outputs,
        }))
    }

    /// Mapping properties overlaid with block properties
    fn merged_properties(&self, block: &ContentBlock) -> PropertyMap {
        let mut merged = self.options.mapping_properties.clone();
        for (key, value) in &block.properties {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    fn run_functions(
        &self,
        rule: &MappingRule,
        calls: &[FunctionCall],
        properties: &mut PropertyMap,
        env: &FunctionEnv,
    ) -> std::result::Result<(), Outcome> {
        for call in calls {
            let Some(function) = self.registry.function(&call.name) else {
                // table load rejects unregistered names; the registry may have been swapped since
                return Err(Outcome::Fatal(function_failure(
                    rule,
                    call,
                    FunctionError::Failed("function not registered".to_string()),
                )));
            };
            let args = substitute_args(call, properties);
            let ctx = FunctionContext::new(properties, env);
            match function(&ctx, &args) {
                Ok(value) => {
                    properties.insert(call.output_key().to_string(), value);
                }
                Err(e) => return Err(function_outcome(rule, call, e)),
            }
        }
        Ok(())
    }

    fn run_selector(
        &self,
        rule: &MappingRule,
        properties: &PropertyMap,
        env: &FunctionEnv,
    ) -> std::result::Result<Option<String>, Outcome> {
        let Some(call) = &rule.selector else {
            return Ok(None);
        };
        let Some(selector) = self.registry.selector(&call.name) else {
            return Err(Outcome::Fatal(function_failure(
                rule,
                call,
                FunctionError::Failed("selector not registered".to_string()),
            )));
        };
        let args = substitute_args(call, properties);
        let ctx = FunctionContext::new(properties, env);
        selector(&ctx, &args).map_err(|e| function_outcome(rule, call, e))
    }

    /// Variant to use and the rule owning it
    fn choose_variant<'t>(
        &'t self,
        rule: &'t MappingRule,
        selected: Option<&str>,
    ) -> Result<Option<(&'t MappingRule, &'t MappingVariant)>> {
        if let Some(name) = selected {
            if let Some(variant) = rule.variant(name) {
                return Ok(Some((rule, variant)));
            }
        }
        if let Some(variant) = rule.fallback_variant() {
            return Ok(Some((rule, variant)));
        }

        tracing::warn!(
            rule = %rule.source_type,
            selected = ?selected,
            "no matching or default variant, using the default rule"
        );
        let default = self
            .table
            .default_rule()
            .ok_or_else(|| RuleError::NoDefaultRuleFound(rule.source_type.clone()))?;
        Ok(default.fallback_variant().map(|variant| (default, variant)))
    }
}

fn substitute_args(call: &FunctionCall, properties: &PropertyMap) -> Vec<String> {
    call.args
        .iter()
        .map(|arg| substitute_arg(arg, properties))
        .collect()
}

fn function_failure(rule: &MappingRule, call: &FunctionCall, error: FunctionError) -> ResolveError {
    ResolveError::Function {
        source_type: rule.source_type.clone(),
        function: call.name.clone(),
        source: error,
    }
}

fn function_outcome(rule: &MappingRule, call: &FunctionCall, error: FunctionError) -> Outcome {
    if error.is_skip() {
        tracing::warn!(
            rule = %rule.source_type,
            function = %call.name,
            error = %error,
            "function requested skip"
        );
    }
    match SkipReason::from_function(error.clone()) {
        Some(reason) => Outcome::Skipped(reason),
        None => Outcome::Fatal(function_failure(rule, call, error)),
    }
}

fn render_outputs(
    rule: &MappingRule,
    variant: &MappingVariant,
    properties: &PropertyMap,
) -> std::result::Result<Vec<ResolvedOutput>, ResolveError> {
    let mut specs: Vec<_> = variant.outputs.iter().collect();
    specs.sort_by_key(|spec| spec.order);

    specs
        .into_iter()
        .map(|spec| match spec.kind {
            OutputKind::Text => Ok(ResolvedOutput::Text {
                order: spec.order,
                html: substitute(&spec.template, properties, Escape::None),
            }),
            OutputKind::Component => {
                let json = substitute(&spec.template, properties, Escape::Json);
                let data = serde_json::from_str(&json).map_err(|e| {
                    ResolveError::InvalidComponentTemplate {
                        source_type: rule.source_type.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let component = spec
                    .component
                    .as_deref()
                    .map(|c| substitute(c, properties, Escape::None))
                    .unwrap_or_default();
                Ok(ResolvedOutput::Component {
                    order: spec.order,
                    component,
                    data,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn resolver_with(document: Value, registry: FunctionRegistry, options: ResolveOptions) -> MappingResolver {
        let table = RuleTable::from_json(&document.to_string(), &registry).unwrap();
        MappingResolver::new(Arc::new(table), Arc::new(registry), options)
    }

    fn resolver(document: Value) -> MappingResolver {
        resolver_with(document, FunctionRegistry::with_builtins(), ResolveOptions::default())
    }

    fn placed(outcome: Outcome) -> ResolvedBlock {
        match outcome {
            Outcome::Placed(block) => block,
            other => panic!("expected placed, got {other:?}"),
        }
    }

    fn text(order: u32, html: &str) -> ResolvedOutput {
        ResolvedOutput::Text {
            order,
            html: html.to_string(),
        }
    }

    fn legacy_table() -> Value {
        json!({ "rules": [
            {
                "sourceType": "Legacy",
                "selector": { "name": "PropertyValueSelector", "args": ["{Mode}"] },
                "variants": [
                    { "name": "Alt", "outputs": [{ "kind": "text", "order": 10, "template": "alt:{Title}" }] },
                    { "default": true, "outputs": [{ "kind": "text", "order": 10, "template": "default:{Title}" }] }
                ]
            },
            {
                "sourceType": "Fallback",
                "default": true,
                "variants": [{ "outputs": [{ "kind": "text", "order": 1, "template": "fallback:{Title}" }] }]
            }
        ]})
    }

    #[test]
    fn selector_result_wins_over_default_variant() {
        let resolver = resolver(legacy_table());
        let block = ContentBlock::new("Legacy", 1, 1, 1000)
            .with_property("Mode", "Alt")
            .with_property("Title", "T");

        let resolved = placed(resolver.resolve(&block, &FunctionEnv::default()).unwrap());
        assert_eq!(resolved.variant.as_deref(), Some("Alt"));
        assert_eq!(resolved.outputs, vec![text(10, "alt:T")]);
        assert_eq!(resolved.position, BlockPosition::new(1, 1, 1000));
    }

    #[test]
    fn unknown_selection_uses_default_variant() {
        let resolver = resolver(legacy_table());
        let block = ContentBlock::new("Legacy", 1, 1, 1).with_property("Title", "T");

        let resolved = placed(resolver.resolve(&block, &FunctionEnv::default()).unwrap());
        assert_eq!(resolved.outputs, vec![text(10, "default:T")]);
    }

    #[test]
    fn unmapped_type_uses_default_rule() {
        let resolver = resolver(legacy_table());
        let block = ContentBlock::new("SomethingElse", 2, 1, 1).with_property("Title", "T");

        let resolved = placed(resolver.resolve(&block, &FunctionEnv::default()).unwrap());
        assert_eq!(resolved.outputs, vec![text(1, "fallback:T")]);
        assert_eq!(resolved.source_type, "SomethingElse");
    }

    #[test]
    fn missing_default_rule_is_run_fatal() {
        let resolver = resolver(json!({ "rules": [{ "sourceType": "A", "variants": [{}] }] }));
        let err = resolver
            .resolve(&ContentBlock::new("B", 1, 1, 1), &FunctionEnv::default())
            .unwrap_err();
        assert!(matches!(err, RuleError::NoDefaultRuleFound(_)));
    }

    #[test]
    fn no_matching_variant_falls_back_to_default_rule() {
        let resolver = resolver(json!({ "rules": [
            {
                "sourceType": "Multi",
                "variants": [{ "name": "a" }, { "name": "b" }]
            },
            {
                "sourceType": "Fallback",
                "default": true,
                "variants": [{ "outputs": [{ "kind": "text", "order": 1, "template": "fb" }] }]
            }
        ]}));
        let resolved = placed(
            resolver
                .resolve(&ContentBlock::new("Multi", 1, 1, 1), &FunctionEnv::default())
                .unwrap(),
        );
        assert_eq!(resolved.outputs, vec![text(1, "fb")]);
    }

    #[test]
    fn closed_and_non_portable_blocks_are_skipped() {
        let document = json!({ "rules": [
            { "sourceType": "Local", "crossSiteSupported": false, "variants": [{}] }
        ]});
        let resolver = resolver_with(
            document,
            FunctionRegistry::with_builtins(),
            ResolveOptions {
                cross_site: true,
                ..ResolveOptions::default()
            },
        );
        let env = FunctionEnv::default();

        let outcome = resolver.resolve(&ContentBlock::new("Local", 1, 1, 1), &env).unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NonPortable("Local".into())));

        let outcome = resolver
            .resolve(&ContentBlock::new("Local", 1, 1, 1).closed(), &env)
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::Closed));
    }

    #[test]
    fn functions_feed_properties_and_mapping_tokens() {
        let document = json!({ "rules": [{
            "sourceType": "Web",
            "functions": [{ "name": "ToLower", "args": ["{Title}"], "output": "Lower" }],
            "variants": [{
                "functions": [{ "name": "HtmlEncode", "args": ["{Lower} & {Site}"] }],
                "outputs": [
                    { "kind": "component", "order": 20, "component": "{Kind}", "template": "{\"title\":\"{HtmlEncode}\",\"raw\":\"{Title}\"}" },
                    { "kind": "text", "order": 10, "template": "<h2>{Title}</h2>" }
                ]
            }]
        }]});
        let mut options = ResolveOptions::default();
        options.mapping_properties.insert("Site".into(), "Intranet".into());
        options.mapping_properties.insert("Title".into(), "overridden by block".into());
        let resolver = resolver_with(document, FunctionRegistry::with_builtins(), options);

        let block = ContentBlock::new("Web", 1, 1, 1)
            .with_property("Title", "My \"Docs\"")
            .with_property("Kind", "DocumentLibrary");
        let resolved = placed(resolver.resolve(&block, &FunctionEnv::default()).unwrap());

        assert_eq!(
            resolved.outputs,
            vec![
                text(10, "<h2>My \"Docs\"</h2>"),
                ResolvedOutput::Component {
                    order: 20,
                    component: "DocumentLibrary".into(),
                    data: json!({ "title": "my &quot;docs&quot; &amp; Intranet", "raw": "My \"Docs\"" }),
                },
            ]
        );
    }

    #[test]
    fn builtin_table_handles_split_output() {
        let registry = Arc::new(FunctionRegistry::with_builtins());
        let table = Arc::new(RuleTable::builtin(&registry).unwrap());
        let resolver = MappingResolver::new(table, registry, ResolveOptions::default());
        let env = FunctionEnv::default();

        let image = ContentBlock::new("Media", 1, 1, 2000)
            .with_property("MediaKind", "Image")
            .with_property("ImageUrl", "x.png");
        let resolved = placed(resolver.resolve(&image, &env).unwrap());
        assert_eq!(resolved.variant.as_deref(), Some("Image"));
        assert_eq!(
            resolved.outputs,
            vec![ResolvedOutput::Component {
                order: 10,
                component: "Image".into(),
                data: json!({ "imageSource": "x.png", "altText": "", "captionText": "" }),
            }]
        );

        let empty = ContentBlock::rich_text("<p> </p>", 1, 1, 1000);
        let resolved = placed(resolver.resolve(&empty, &env).unwrap());
        assert_eq!(resolved.variant.as_deref(), Some("Empty"));
        assert!(resolved.outputs.is_empty());

        let unknown = ContentBlock::new("SomethingOld", 1, 1, 3000).with_property("Title", "A & B");
        let resolved = placed(resolver.resolve(&unknown, &env).unwrap());
        assert_eq!(
            resolved.outputs,
            vec![text(10, "<p>Web part 'A &amp; B' could not be transformed.</p>")]
        );
    }

    #[test]
    fn function_errors_map_to_outcomes() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register_function("Unavailable", |_, _| {
            Err(FunctionError::NotAvailableAtTarget("no equivalent".into()))
        });
        registry.register_function("Broken", |_, _| Err(FunctionError::Failed("boom".into())));
        let document = json!({ "rules": [
            { "sourceType": "A", "functions": [{ "name": "Unavailable" }], "variants": [{}] },
            { "sourceType": "B", "variants": [{ "functions": [{ "name": "Broken" }] }] },
            { "sourceType": "C", "variants": [{ "functions": [{ "name": "AssetLookup", "args": ["{Missing}"] }] }] }
        ]});
        let resolver = resolver_with(document, registry, ResolveOptions::default());
        let env = FunctionEnv::default();

        let a = resolver.resolve(&ContentBlock::new("A", 1, 1, 1), &env).unwrap();
        assert_eq!(a, Outcome::Skipped(SkipReason::NotAvailableAtTarget("no equivalent".into())));

        let b = resolver.resolve(&ContentBlock::new("B", 1, 1, 1), &env).unwrap();
        assert!(matches!(b, Outcome::Fatal(ResolveError::Function { ref function, .. }) if function == "Broken"));

        let c = resolver
            .resolve(&ContentBlock::new("C", 1, 1, 1).with_property("Missing", ""), &env)
            .unwrap();
        assert!(matches!(c, Outcome::Skipped(SkipReason::MediaConfiguration(_))));
    }

    #[test]
    fn invalid_component_json_is_page_fatal() {
        let resolver = resolver(json!({ "rules": [{ "sourceType": "A", "variants": [{
            "outputs": [{ "kind": "component", "order": 1, "component": "x", "template": "{not json" }]
        }]}]}));
        let outcome = resolver
            .resolve(&ContentBlock::new("A", 1, 1, 1), &FunctionEnv::default())
            .unwrap();
        assert!(matches!(outcome, Outcome::Fatal(ResolveError::InvalidComponentTemplate { .. })));
    }

    proptest! {
        #[test]
        fn prop_single_variant_is_always_chosen(mode in "[A-Za-z]{0,8}", title in "[a-z ]{0,12}") {
            let resolver = resolver(json!({ "rules": [{
                "sourceType": "Only",
                "selector": { "name": "PropertyValueSelector", "args": ["{Mode}"] },
                "variants": [{ "name": "one", "outputs": [{ "kind": "text", "order": 1, "template": "{Title}" }] }]
            }]}));
            let block = ContentBlock::new("Only", 1, 1, 1)
                .with_property("Mode", mode)
                .with_property("Title", title.clone());

            let resolved = placed(resolver.resolve(&block, &FunctionEnv::default()).unwrap());
            prop_assert_eq!(resolved.variant.as_deref(), Some("one"));
            prop_assert_eq!(resolved.outputs, vec![text(1, &title)]);
        }
    }
}

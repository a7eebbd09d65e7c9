//! Function registry
//!
//! Maps the function and selector names used by rule tables to callables.
//! Populated once at startup; rule tables naming anything unregistered are
//! rejected when loaded.

use crate::error::FunctionError;
use pagemod_metadata::UrlTransformator;
use pagemod_model::PropertyMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Binary asset copy between content stores
#[cfg_attr(test, mockall::automock)]
pub trait AssetTransfer: Send + Sync {
    /// Copy the asset at `source_url`, returning its target URL
    fn transfer_asset(&self, source_url: &str) -> Result<String, FunctionError>;
}

/// Run-scoped collaborators available to functions
#[derive(Clone, Default)]
pub struct FunctionEnv {
    pub urls: Option<Arc<UrlTransformator>>,
    pub assets: Option<Arc<dyn AssetTransfer>>,
}

impl fmt::Debug for FunctionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEnv")
            .field("urls", &self.urls.is_some())
            .field("assets", &self.assets.is_some())
            .finish()
    }
}

impl FunctionEnv {
    #[must_use]
    pub fn with_urls(mut self, urls: Arc<UrlTransformator>) -> Self {
        self.urls = Some(urls);
        self
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn AssetTransfer>) -> Self {
        self.assets = Some(assets);
        self
    }
}

/// Input of one function call
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    /// Merged block and mapping properties, including earlier function results
    pub properties: &'a PropertyMap,
    pub env: &'a FunctionEnv,
}

impl<'a> FunctionContext<'a> {
    #[inline]
    #[must_use]
    pub fn new(properties: &'a PropertyMap, env: &'a FunctionEnv) -> Self {
        Self { properties, env }
    }

    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Property transform: substituted args in, new property value out
pub type TransformFn =
    Arc<dyn Fn(&FunctionContext<'_>, &[String]) -> Result<String, FunctionError> + Send + Sync>;

/// Variant selector: substituted args in, variant name out
pub type SelectorFn = Arc<
    dyn Fn(&FunctionContext<'_>, &[String]) -> Result<Option<String>, FunctionError> + Send + Sync,
>;

/// Named functions and selectors
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, TransformFn>,
    selectors: HashMap<String, SelectorFn>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.function_names())
            .field("selectors", &self.selector_names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the built-in functions and selectors
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register(&mut registry);
        registry
    }

    /// Register a function, replacing any previous one of that name
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&FunctionContext<'_>, &[String]) -> Result<String, FunctionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_lowercase(), Arc::new(function));
    }

    /// Register a selector, replacing any previous one of that name
    pub fn register_selector<F>(&mut self, name: &str, selector: F)
    where
        F: Fn(&FunctionContext<'_>, &[String]) -> Result<Option<String>, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.selectors.insert(name.to_lowercase(), Arc::new(selector));
    }

    #[inline]
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&TransformFn> {
        self.functions.get(&name.to_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn selector(&self, name: &str) -> Option<&SelectorFn> {
        self.selectors.get(&name.to_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn contains_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn contains_selector(&self, name: &str) -> bool {
        self.selectors.contains_key(&name.to_lowercase())
    }

    /// Registered function names, sorted
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered selector names, sorted
    #[must_use]
    pub fn selector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.selectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len() + self.selectors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.selectors.is_empty()
    }
}

//! Pagemod Rules
//!
//! Rule-driven mapping of legacy content blocks to modern outputs.
//!
//! # Overview
//!
//! - **RuleTable**: Schema-validated mapping of block types to variants
//! - **FunctionRegistry**: Named functions and selectors referenced by rules
//! - **MappingResolver**: Picks a rule variant per block and renders its outputs
//!
//! # Example
//!
//! ```rust
//! use pagemod_rules::{FunctionEnv, FunctionRegistry, MappingResolver, ResolveOptions, RuleTable};
//! use pagemod_model::ContentBlock;
//! use std::sync::Arc;
//!
//! let registry = FunctionRegistry::with_builtins();
//! let table = RuleTable::from_json(
//!     r#"{"rules":[{"sourceType":"RichText","default":true,
//!         "variants":[{"outputs":[{"kind":"text","order":1,"template":"{Text}"}]}]}]}"#,
//!     &registry,
//! ).unwrap();
//!
//! let resolver = MappingResolver::new(Arc::new(table), Arc::new(registry), ResolveOptions::default());
//! let block = ContentBlock::rich_text("<p>Hi</p>", 1, 1, 1000);
//! let outcome = resolver.resolve(&block, &FunctionEnv::default()).unwrap();
//! assert!(outcome.is_placed());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builtins;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod table;
pub mod tokens;

pub use error::{FunctionError, ResolveError, Result, RuleError};
pub use registry::{
    AssetTransfer, FunctionContext, FunctionEnv, FunctionRegistry, SelectorFn, TransformFn,
};
pub use resolver::{
    MappingResolver, Outcome, ResolveOptions, ResolvedBlock, ResolvedOutput, SkipReason,
};
pub use table::{FunctionCall, MappingRule, MappingVariant, OutputKind, OutputSpec, RuleTable};
pub use tokens::{substitute, substitute_arg, Escape};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

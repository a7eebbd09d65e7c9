//! Pagemod Model
//!
//! Shared data model for the page transformation pipeline.
//!
//! # Core Concepts
//!
//! - [`ContentBlock`]: One unit of legacy page content positioned by `(row, column, order)`
//! - [`SourcePage`]: A legacy page as handed to the analyzer
//! - [`Section`] / [`Column`] / [`Control`]: The modern page canvas
//! - [`ConnectionContext`]: Opaque handle to a source or target system
//! - [`SourceItem`]: Item-level metadata and permissions carried over after persisting
//!
//! # Example
//!
//! ```rust,ignore
//! use pagemod_model::{ContentBlock, block_types, ORDER_SPACING};
//!
//! let block = ContentBlock::new(block_types::RICH_TEXT, 1, 1, ORDER_SPACING)
//!     .with_property("Text", "<p>Hello</p>");
//! assert!(block.is_rich_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod block;
mod canvas;
mod context;
mod error;
mod item;
mod page;

pub use block::{block_types, keys, BlockPosition, ContentBlock, PropertyMap, ORDER_SPACING};
pub use canvas::{Column, Control, ControlKind, Section, SectionTemplate, GRID_WIDTH};
pub use context::{ConnectionContext, ContextId, PlatformVersion};
pub use error::ModelError;
pub use item::{FieldValue, ResolvedPrincipal, RoleAssignment, SourceField, SourceItem, TermRef};
pub use page::{LayoutCategory, PageType, SourcePage, SourceWebPart};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

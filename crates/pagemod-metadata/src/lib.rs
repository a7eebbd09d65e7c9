//! Pagemod Metadata
//!
//! Cross-system metadata reconciliation and the shared lookup cache.
//!
//! # Overview
//!
//! - **CacheService**: Context-scoped memoization shared by all pipelines
//! - **MappingFile**: `source,target` override records, parsed once per path
//! - **UrlTransformator**: Layered link rewriting between two sites
//! - **IdentityTransformator**: Principal mapping with directory fallback
//! - **TaxonomyTransformator**: Term resolution by id, path or mapping
//!
//! # Example
//!
//! ```rust
//! use pagemod_metadata::{UrlRewriteContext, UrlTransformator};
//!
//! let context = UrlRewriteContext::new("http://a/sites/s1", "https://b/sites/s2");
//! let urls = UrlTransformator::new(&context, None).unwrap();
//! assert_eq!(
//!     urls.transform("http://a/sites/s1/sitepages/home.aspx"),
//!     "https://b/sites/s2/sitepages/home.aspx"
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod identity;
pub mod mapping_file;
pub mod taxonomy;
pub mod url_rewrite;

pub use cache::{CacheKey, CacheService, CacheStats, LookupKind};
pub use error::{MetadataError, Result};
pub use identity::{DirectoryLookup, IdentityTransformator, PrincipalResolver};
pub use mapping_file::{MappingFile, MappingRecord};
pub use taxonomy::{
    IndexedTerm, TaxonomyTransformator, TermNode, TermResolution, TermSetIndex, TermSetTree,
    TermStore,
};
pub use url_rewrite::{UrlRewriteContext, UrlTransformator, DEFAULT_PAGES_LIBRARY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

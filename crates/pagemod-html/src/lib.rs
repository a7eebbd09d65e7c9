//! Pagemod HTML
//!
//! Page analysis and rich text splitting.
//!
//! # Overview
//!
//! - **PageAnalyzer**: Turns a legacy page into positioned content blocks
//! - **WikiHtmlSplitter**: Pulls images and iframes out of rich text blocks
//! - **Fragment**: Structure-preserving DOM split over `scraper`
//!
//! # Example
//!
//! ```rust
//! use pagemod_html::{PageAnalyzer, SplitterOptions, WikiHtmlSplitter};
//! use pagemod_model::{PageType, SourcePage};
//!
//! let page = SourcePage::new("home.aspx", PageType::Wiki)
//!     .with_content("<p>A</p><img src=\"x.png\"><p>B</p>");
//!
//! let analysis = PageAnalyzer::new().analyze(&page).unwrap();
//! let blocks = WikiHtmlSplitter::new(SplitterOptions::default()).split(analysis.blocks);
//! assert_eq!(blocks.len(), 3);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod analyzer;
mod dom;
mod error;
mod splitter;

pub use analyzer::{PageAnalysis, PageAnalyzer, BLOG_BODY_FIELD, WIKI_FIELD};
pub use dom::{is_semantically_empty, Fragment};
pub use error::HtmlError;
pub use splitter::{MediaKind, SplitterOptions, WikiHtmlSplitter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

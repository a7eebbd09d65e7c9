//! Pagemod Core
//!
//! Transforms legacy wiki, web part and blog pages into modern pages made
//! of sections, columns and ordered controls.
//!
//! # Overview
//!
//! - **PageTransformator**: Runs the stage pipeline for single pages and batches
//! - **LayoutTransformator**: Maps detected layouts onto section templates
//! - **ContentPlacement**: Places resolved blocks deterministically and cleans up the canvas
//! - **PostProcessor**: Copies item metadata and permissions after persisting
//! - **Diagnostics**: Fans messages out to `tracing` and registered observers
//!
//! # Example
//!
//! ```rust,ignore
//! use pagemod_core::{Collaborators, PageTransformator, TransformConfig};
//! use pagemod_metadata::CacheService;
//! use std::sync::Arc;
//!
//! let config = TransformConfig::from_path("pagemod.toml".as_ref())?;
//! pagemod_core::init_tracing(&config.logging)?;
//!
//! let collaborators = Collaborators::new(source, target, store);
//! let transformator = PageTransformator::from_config(&config, collaborators, Arc::new(CacheService::new()))?;
//! let report = transformator.transform_batch_parallel(&pages)?;
//! println!("{} transformed, {} failed", report.succeeded(), report.failed());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod layout;
pub mod observer;
pub mod pipeline;
pub mod placement;
pub mod postprocess;
pub mod stage;
pub mod telemetry;

pub use config::{LogFormat, LoggingConfig, MappingPaths, TransformConfig, UrlSettings};
pub use error::{ConfigError, PageError, TransformError, WriteError};
pub use layout::LayoutTransformator;
pub use observer::{Diagnostics, ObserverSink};
pub use pipeline::{
    BatchReport, Collaborators, PageReport, PageStore, PageTransformator, SkippedBlock,
    TransformResult,
};
pub use placement::{ComponentCatalog, ComponentDefinition, ContentPlacement, DroppedOutput, Placement};
pub use postprocess::{
    FieldCatalog, FieldUpdate, ItemWriter, PermissionSet, PostProcessReport, PostProcessor,
    TargetField,
};
pub use stage::{Analyze, Layout, Place, PostProcess, Resolve, Split};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Modforge - manifest resolution and install pipeline for mod bundles
//!
//! This library turns a modpack's two text catalogs into an installed Mod
//! Organizer `mods` tree:
//!
//! 1. [`catalog`] parses the manifest (`+`/`-` lines) and the tab-separated
//!    maker catalog.
//! 2. [`resolver`] binds manifest entries to catalog records and classifies
//!    each into a [`ModKind`].
//! 3. [`download`] fetches archives into a hash-verified cache, resolving
//!    gallery mirrors and repository checkouts along the way.
//! 4. [`archive`] extracts them and repairs malformed paths.
//! 5. [`install`] copies the recognized game-data directories into the mod
//!    directory and writes its `meta.ini`.
//!
//! [`pipeline::Pipeline`] runs these steps sequentially per mod and collects
//! every failure into a [`PipelineReport`] instead of aborting.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use modforge::{catalog::Catalogs, resolver, Pipeline, PipelineConfig};
//!
//! let catalogs = Catalogs::load_dir(Path::new("modpack_data"))?;
//! let resolution = resolver::resolve(&catalogs);
//!
//! let config = PipelineConfig::new("downloads".into(), "mods".into());
//! let report = Pipeline::from_config(&config)?.install(&resolution);
//! for line in report.summary_lines() {
//!     eprintln!("{}", line);
//! }
//! ```

pub mod archive;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod download;
pub mod error;
pub mod fsutil;
pub mod hash;
pub mod install;
pub mod pipeline;
pub mod report;
pub mod resolver;

pub use config::PipelineConfig;
pub use error::{ModError, ModResult};
pub use pipeline::Pipeline;
pub use report::{Diagnostic, ModState, PipelineReport};
pub use resolver::{ModDescriptor, ModKind, Resolution};

//! # Mesher
//!
//! Concurrent ingestion of BIM scenes into one renderable composite mesh.
//!
//! A scene is an instance tree (JSON) referencing per-fragment binary
//! geometry blobs and per-material JSON descriptors. Loading walks the tree,
//! decodes materials and fragments on a worker pool, and merges every
//! surviving fragment into a single vertex buffer and index buffer with one
//! submesh per fragment.
//!
//! ## Features
//!
//! - **Binary geometry decoding**: raw or deduplicated vertices, normals
//!   rebuilt from face windings
//! - **Material resolution**: one shared material per material id
//! - **Job scheduling**: blocking `wait` and callback `notify` completion
//! - **Composite assembly**: globally renumbered indices, 16 or 32-bit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mesher::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     mesher::foundation::logging::init();
//!
//!     let loader = SceneLoader::from_directory("scenes/lobby", LoaderConfig::default())?;
//!     let geometry = loader.load_blocking()?;
//!     println!(
//!         "{} submeshes, {} vertices",
//!         geometry.submeshes().len(),
//!         geometry.vertex_count()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod jobs;
pub mod render;
pub mod scene;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        assets::{DecodeMode, DirectorySource, MemorySource, SceneSource},
        config::{Config, LoaderConfig, SceneLayout},
        render::{CompositeGeometry, IndexFormat, IndexType, Material, Submesh},
        scene::{LoadError, LoadReport, SceneLoader},
    };
}

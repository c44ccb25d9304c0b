//! # Loader Configuration
//!
//! Tuning knobs for a scene load: worker pool size, mesh job batching,
//! decode mode, composite index width, and the on-disk scene layout.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::assets::geometry::DecodeMode;
use crate::render::composite::IndexFormat;

/// Default number of fragments decoded by a single mesh job
pub const DEFAULT_MESH_CHUNK_SIZE: usize = 20;

/// # Scene Layout
///
/// Names of the files and directories making up one scene on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLayout {
    /// Instance tree file, relative to the scene root
    pub instance_tree_file: String,
    /// Directory holding one descriptor per material id
    pub materials_dir: String,
    /// Directory holding one binary blob per composite fragment id
    pub meshes_dir: String,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            instance_tree_file: "instance_tree.json".to_string(),
            materials_dir: "materials".to_string(),
            meshes_dir: "meshes".to_string(),
        }
    }
}

/// # Loader Configuration
///
/// Controls how a scene load fans out across worker threads and how
/// decoded geometry is packed into the composite buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Worker threads executing job bodies (0 = available parallelism)
    pub worker_threads: usize,
    /// Fragments per mesh-load job
    pub mesh_chunk_size: usize,
    /// Fragment decode mode
    pub decode_mode: DecodeMode,
    /// Element width policy for the composite index buffer
    pub index_format: IndexFormat,
    /// On-disk scene layout
    pub layout: SceneLayout,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            mesh_chunk_size: DEFAULT_MESH_CHUNK_SIZE,
            decode_mode: DecodeMode::Deduplicated,
            index_format: IndexFormat::Auto,
            layout: SceneLayout::default(),
        }
    }
}

impl Config for LoaderConfig {}

impl LoaderConfig {
    /// Set the worker thread count
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the number of fragments per mesh job
    pub fn with_mesh_chunk_size(mut self, mesh_chunk_size: usize) -> Self {
        self.mesh_chunk_size = mesh_chunk_size;
        self
    }

    /// Set the fragment decode mode
    pub fn with_decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    /// Set the composite index format policy
    pub fn with_index_format(mut self, index_format: IndexFormat) -> Self {
        self.index_format = index_format;
        self
    }

    /// Resolve the worker count, falling back to the machine's parallelism
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }

    /// Check values that would make a load impossible
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mesh_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "mesh_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.layout.instance_tree_file.is_empty() {
            return Err(ConfigError::Invalid {
                field: "layout.instance_tree_file",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

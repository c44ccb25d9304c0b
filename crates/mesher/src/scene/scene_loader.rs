//! Scene loading entry points
//!
//! A load parses the instance tree, walks it to schedule material and mesh
//! jobs, and assembles the decoded meshes into one [`CompositeGeometry`] once
//! every job has finished. The caller chooses how to learn about completion:
//!
//! - [`SceneLoader::load_blocking`] returns the geometry on the calling thread.
//! - [`SceneLoader::load_async`] returns at once and hands the result to a
//!   callback running on a worker thread.
//!
//! Only setup failures (unreadable instance tree, bad configuration) and an
//! empty result are errors; individual fragments and materials that fail are
//! logged and left out.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::mesh_store::MeshStore;
use super::scene_walker::{SceneWalker, WalkReport};
use crate::assets::{Asset, AssetError, DirectorySource, InstanceTree, MaterialStore, SceneSource};
use crate::config::{ConfigError, LoaderConfig};
use crate::jobs::{JobScheduler, JobSummary};
use crate::render::{AssemblyError, CompositeAssembler, CompositeGeometry, IndexFormat};

/// Fatal load errors
#[derive(Debug, Error)]
pub enum LoadError {
    /// Loader configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene source or instance tree unusable
    #[error("Scene source error: {0}")]
    Source(#[from] AssetError),

    /// Worker threads could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] io::Error),

    /// No composite could be built
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),
}

/// Statistics of a finished load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// What the walker scheduled
    pub walk: WalkReport,
    /// Final job counts
    pub jobs: JobSummary,
    /// Fragments that made it into the composite
    pub meshes_loaded: usize,
    /// Materials resolved
    pub materials_loaded: usize,
    /// Wall time from start to assembled geometry
    pub elapsed: Duration,
}

/// Jobs of one load in flight
struct PendingLoad {
    scheduler: Arc<JobScheduler>,
    materials: Arc<MaterialStore>,
    meshes: Arc<MeshStore>,
    walk: WalkReport,
    index_format: IndexFormat,
    started: Instant,
}

impl PendingLoad {
    fn finish(&self) -> Result<(CompositeGeometry, LoadReport), LoadError> {
        let jobs = self.scheduler.summary();
        let snapshot = self.meshes.snapshot();

        let report = LoadReport {
            walk: self.walk,
            jobs,
            meshes_loaded: snapshot.len(),
            materials_loaded: self.materials.len(),
            elapsed: self.started.elapsed(),
        };

        if jobs.errored > 0 {
            log::warn!("{} of {} jobs failed", jobs.errored, jobs.total());
        }

        let geometry = CompositeAssembler::assemble(self.index_format, snapshot.iter().map(Arc::as_ref))
            .map_err(|err| {
                log::error!("Scene produced no geometry: {}", err);
                err
            })?;

        log::info!(
            "Loaded {} fragments ({} vertices, {} indices) in {:?}",
            report.meshes_loaded,
            geometry.vertex_count(),
            geometry.index_count(),
            report.elapsed
        );
        Ok((geometry, report))
    }
}

/// Loads a scene into composite geometry
pub struct SceneLoader {
    source: Arc<dyn SceneSource>,
    config: LoaderConfig,
}

impl SceneLoader {
    /// Create a loader over any scene source
    pub fn new(source: impl SceneSource + 'static, config: LoaderConfig) -> Result<Self, LoadError> {
        config.validate()?;
        Ok(Self {
            source: Arc::new(source),
            config,
        })
    }

    /// Create a loader over a scene directory laid out per `config.layout`
    pub fn from_directory(root: impl AsRef<Path>, config: LoaderConfig) -> Result<Self, LoadError> {
        let source = DirectorySource::open(root, &config.layout)?;
        Self::new(source, config)
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Scene id of the underlying source
    pub fn scene_id(&self) -> &str {
        self.source.scene_id()
    }

    /// Load the scene, blocking until the composite is built
    pub fn load_blocking(&self) -> Result<CompositeGeometry, LoadError> {
        self.load_with_report().map(|(geometry, _)| geometry)
    }

    /// Load the scene, blocking, and report what happened
    pub fn load_with_report(&self) -> Result<(CompositeGeometry, LoadReport), LoadError> {
        let load = self.start()?;
        load.scheduler.wait();
        load.finish()
    }

    /// Start loading and return immediately
    ///
    /// `completion` runs exactly once on a worker thread with the result.
    /// Setup failures are returned directly and `completion` is not called.
    pub fn load_async<F>(&self, completion: F) -> Result<(), LoadError>
    where
        F: FnOnce(Result<CompositeGeometry, LoadError>) + Send + 'static,
    {
        let load = self.start()?;
        let scheduler = Arc::clone(&load.scheduler);
        // The callback keeps the load (and its worker pool) alive until it runs
        scheduler.notify(move || completion(load.finish().map(|(geometry, _)| geometry)));
        Ok(())
    }

    fn start(&self) -> Result<PendingLoad, LoadError> {
        let started = Instant::now();
        log::info!("Loading scene {}", self.source.scene_id());

        let tree = self
            .source
            .instance_tree()
            .and_then(|bytes| InstanceTree::from_bytes(&bytes))
            .map_err(|err| {
                log::error!("Cannot read instance tree of {}: {}", self.source.scene_id(), err);
                err
            })?;

        let scheduler = Arc::new(JobScheduler::new(self.config.resolved_worker_threads())?);
        let materials = Arc::new(MaterialStore::new());
        let meshes = Arc::new(MeshStore::new());
        log::debug!(
            "Scene {} has {} nodes, using {} workers",
            self.source.scene_id(),
            tree.node_count(),
            scheduler.worker_count()
        );

        let walk = SceneWalker::new(
            &scheduler,
            Arc::clone(&self.source),
            Arc::clone(&materials),
            Arc::clone(&meshes),
            &self.config,
        )
        .walk(&tree);

        Ok(PendingLoad {
            scheduler,
            materials,
            meshes,
            walk,
            index_format: self.config.index_format,
            started,
        })
    }
}

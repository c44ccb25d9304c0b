//! Scene loading
//!
//! Walks the instance tree, runs the decode jobs and assembles the result.

pub mod mesh_store;
pub mod scene_loader;
pub mod scene_walker;

pub use mesh_store::MeshStore;
pub use scene_loader::{LoadError, LoadReport, SceneLoader};
pub use scene_walker::{SceneWalker, WalkReport};

//! Asset decoding and scene sources
//!
//! Everything a load reads from outside the process goes through a
//! [`SceneSource`]: the instance tree, one descriptor per material id and one
//! geometry blob per composite fragment id.

pub mod geometry;
pub mod instance_tree;
pub mod materials;
pub mod source;

pub use geometry::{DecodeMode, DecodedGeometry, GeometryDecoder, GeometryError};
pub use instance_tree::{FragmentRef, InstanceTree, NodeType, SceneNode};
pub use materials::{MaterialError, MaterialParser, MaterialStore, Reservation};
pub use source::{DirectorySource, MemorySource};

use thiserror::Error;

use crate::render::Material;

/// Asset trait for types decoded straight from source bytes
pub trait Asset: Send + Sync + 'static {
    /// Load asset from raw bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError>
    where
        Self: Sized;
}

impl Asset for InstanceTree {
    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        Self::from_slice(bytes).map_err(|e| AssetError::InvalidData(format!("instance tree: {e}")))
    }
}

impl Asset for Material {
    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        Ok(MaterialParser::parse(bytes)?)
    }
}

/// Where a load reads its inputs from
///
/// Implementations are shared by every worker thread of a load, so lookups
/// must be callable concurrently.
pub trait SceneSource: Send + Sync {
    /// Scene id, the first component of every composite fragment id
    fn scene_id(&self) -> &str;

    /// Instance tree document
    fn instance_tree(&self) -> Result<Vec<u8>, AssetError>;

    /// Material descriptor for a material id
    fn material(&self, id: &str) -> Result<Vec<u8>, AssetError>;

    /// Geometry blob for a composite fragment id
    fn mesh(&self, composite_id: &str) -> Result<Vec<u8>, AssetError>;
}

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Asset kind (`material`, `mesh`, ...)
        kind: &'static str,
        /// Requested id or path
        id: String,
    },

    /// A source directory could not be listed
    #[error("Cannot index {dir}: {reason}")]
    Index {
        /// Directory path
        dir: String,
        /// Underlying failure
        reason: String,
    },

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Fragment geometry could not be decoded
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Material could not be decoded or resolved
    #[error("Material error: {0}")]
    Material(#[from] MaterialError),
}

//! Mesh representation for decoded fragments
//!
//! A [`Mesh`] is one decoded fragment: deduplicated (or raw) vertices, local
//! 0-based triangle indices and the material resolved for it. Meshes are
//! created once by a decode job and never mutated afterwards.
//!
//! [`CompositeVertex`] is the interleaved layout written into the composite
//! vertex buffer. Every vertex carries its fragment's material colors so a
//! renderer can draw all submeshes with one vertex buffer binding.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use super::material::Material;
use crate::foundation::math::{self, Vec2, Vec3};

/// Decoded vertex: position, normal and texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawVertex {
    /// Position in model space
    pub position: Vec3,
    /// Unit normal reconstructed from face windings
    pub normal: Vec3,
    /// Texture coordinate
    pub uv: Vec2,
}

impl RawVertex {
    /// Create a new vertex
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Interleaved vertex as stored in the composite vertex buffer
///
/// # Memory Layout
/// `#[repr(C)]` with only `f32` fields, so the layout is tightly packed
/// (80 bytes) and can be uploaded to a GPU buffer byte for byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeVertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Ambient color of the owning fragment's material
    pub ambient: [f32; 4],
    /// Diffuse color of the owning fragment's material
    pub diffuse: [f32; 4],
    /// Specular color of the owning fragment's material
    pub specular: [f32; 4],
}

/// Byte stride of one [`CompositeVertex`]
pub const VERTEX_STRIDE: usize = std::mem::size_of::<CompositeVertex>();

impl CompositeVertex {
    /// Interleave a decoded vertex with its material colors
    pub fn materialize(vertex: &RawVertex, material: &Material) -> Self {
        Self {
            position: vertex.position.into(),
            normal: vertex.normal.into(),
            uv: vertex.uv.into(),
            ambient: material.ambient.into(),
            diffuse: material.diffuse.into(),
            specular: material.specular.into(),
        }
    }
}

/// One decoded fragment
#[derive(Debug, Clone)]
pub struct Mesh {
    id: String,
    vertices: Vec<RawVertex>,
    indices: Vec<u32>,
    material: Arc<Material>,
}

impl Mesh {
    /// Create a mesh from decoded data
    pub fn new(
        id: impl Into<String>,
        vertices: Vec<RawVertex>,
        indices: Vec<u32>,
        material: Arc<Material>,
    ) -> Self {
        Self {
            id: id.into(),
            vertices,
            indices,
            material,
        }
    }

    /// Composite fragment id (`{scene}-{node}-{fragment}`)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Decoded vertices
    pub fn vertices(&self) -> &[RawVertex] {
        &self.vertices
    }

    /// Local triangle indices into [`Mesh::vertices`]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Material shared with every other fragment of the same material id
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Mean of the vertex positions, `None` for a mesh without vertices
    pub fn centroid(&self) -> Option<Vec3> {
        math::mean(self.vertices.iter().map(|v| &v.position))
    }

    /// Vertices interleaved with this mesh's material colors
    pub fn materialized_vertices(&self) -> impl Iterator<Item = CompositeVertex> + '_ {
        self.vertices
            .iter()
            .map(|vertex| CompositeVertex::materialize(vertex, &self.material))
    }
}

//! Composite geometry assembly
//!
//! Merges every decoded fragment of a scene into one interleaved vertex
//! buffer and one index buffer, plus a table of [`Submesh`] ranges that let a
//! renderer draw each fragment separately from the shared buffers.
//!
//! ```text
//! vertex buffer: [ mesh A vertices | mesh B vertices | mesh C vertices ]
//! index buffer:  [ A indices + 0   | B indices + |A| | C indices + |A|+|B| ]
//! submeshes:     [ A offsets       , B offsets       , C offsets ]
//! ```
//!
//! Indices are renumbered so they address the composite vertex buffer
//! directly; no base-vertex offset is needed at draw time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::mesh::{CompositeVertex, Mesh, VERTEX_STRIDE};
use crate::foundation::math::Vec3;

/// Assembly errors
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// No fragment survived loading, so there is nothing to draw
    #[error("Mesh store is empty, no composite geometry can be built")]
    EmptyMeshStore,

    /// The composite needs more vertices than a 32-bit index can address
    #[error("Composite vertex count {vertex_count} exceeds the 32-bit index range")]
    IndexOverflow {
        /// Total vertices that would have been written
        vertex_count: usize,
    },
}

/// Geometry primitive drawn by a submesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// Independent triangles, three indices each
    Triangle,
}

/// Element width of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// 16-bit unsigned indices
    Uint16,
    /// 32-bit unsigned indices
    Uint32,
}

impl IndexType {
    /// Size of one index in bytes
    pub const fn stride(self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Policy for choosing the composite index width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFormat {
    /// 16-bit when every composite index fits, 32-bit otherwise
    Auto,
    /// Always 32-bit
    Uint32,
}

impl IndexFormat {
    fn resolve(self, vertex_count: usize) -> IndexType {
        match self {
            Self::Auto if vertex_count <= usize::from(u16::MAX) + 1 => IndexType::Uint16,
            _ => IndexType::Uint32,
        }
    }
}

/// Range of the composite buffers belonging to one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submesh {
    /// Fragment this range was built from
    pub fragment_id: String,
    /// Geometry type
    pub primitive_type: PrimitiveType,
    /// Byte offset of the first vertex in the composite vertex buffer
    pub vertex_offset: usize,
    /// Byte offset of the first index in the composite index buffer
    pub index_offset: usize,
    /// Number of indices to draw
    pub index_count: usize,
    /// Element width of the index buffer
    pub index_type: IndexType,
}

/// Composite index storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    /// 16-bit indices
    Uint16(Vec<u16>),
    /// 32-bit indices
    Uint32(Vec<u32>),
}

impl IndexBuffer {
    /// Element width
    pub fn index_type(&self) -> IndexType {
        match self {
            Self::Uint16(_) => IndexType::Uint16,
            Self::Uint32(_) => IndexType::Uint32,
        }
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            Self::Uint16(indices) => indices.len(),
            Self::Uint32(indices) => indices.len(),
        }
    }

    /// Whether the buffer holds no indices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index at `position`, widened to 32 bits
    pub fn get(&self, position: usize) -> Option<u32> {
        match self {
            Self::Uint16(indices) => indices.get(position).map(|&i| u32::from(i)),
            Self::Uint32(indices) => indices.get(position).copied(),
        }
    }

    /// Iterate all indices widened to 32 bits
    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Self::Uint16(indices) => Box::new(indices.iter().map(|&i| u32::from(i))),
            Self::Uint32(indices) => Box::new(indices.iter().copied()),
        }
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Uint16(indices) => bytemuck::cast_slice(indices),
            Self::Uint32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

/// The merged, render-ready payload of one scene load
#[derive(Debug, Clone)]
pub struct CompositeGeometry {
    vertices: Vec<CompositeVertex>,
    indices: IndexBuffer,
    submeshes: Vec<Submesh>,
    centroid: Vec3,
}

impl CompositeGeometry {
    /// Interleaved vertices
    pub fn vertices(&self) -> &[CompositeVertex] {
        &self.vertices
    }

    /// Vertex buffer bytes (`vertex_count * VERTEX_STRIDE`)
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Composite index buffer
    pub fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    /// Index buffer bytes
    pub fn index_bytes(&self) -> &[u8] {
        self.indices.as_bytes()
    }

    /// Element width of the index buffer
    pub fn index_type(&self) -> IndexType {
        self.indices.index_type()
    }

    /// Submesh table, in merge order
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Mean of the per-mesh centroids
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    /// Total vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Total indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Builds a [`CompositeGeometry`] from decoded meshes
///
/// Meshes are merged in the order they are pushed. The assembler never
/// reorders, so the output is reproducible whenever the input order is.
#[derive(Debug)]
pub struct CompositeAssembler {
    format: IndexFormat,
    vertices: Vec<CompositeVertex>,
    indices: Vec<u32>,
    // (fragment id, vertex byte offset, first index, index count)
    ranges: Vec<(String, usize, usize, usize)>,
    centroid_sum: Vec3,
    mesh_count: usize,
    overflowed: bool,
}

impl CompositeAssembler {
    /// Create an empty assembler
    pub fn new(format: IndexFormat) -> Self {
        Self {
            format,
            vertices: Vec::new(),
            indices: Vec::new(),
            ranges: Vec::new(),
            centroid_sum: Vec3::zeros(),
            mesh_count: 0,
            overflowed: false,
        }
    }

    /// Merge every mesh of an iterator and finish
    pub fn assemble<'a, I>(format: IndexFormat, meshes: I) -> Result<CompositeGeometry, AssemblyError>
    where
        I: IntoIterator<Item = &'a Mesh>,
    {
        let mut assembler = Self::new(format);
        for mesh in meshes {
            assembler.push(mesh);
        }
        assembler.finish()
    }

    /// Append one mesh to the composite buffers
    pub fn push(&mut self, mesh: &Mesh) {
        let vertex_base = self.vertices.len();
        if u32::try_from(vertex_base + mesh.vertex_count()).is_err() {
            self.overflowed = true;
            return;
        }
        let offset = vertex_base as u32;

        self.ranges.push((
            mesh.id().to_string(),
            vertex_base * VERTEX_STRIDE,
            self.indices.len(),
            mesh.index_count(),
        ));

        // Shift by the vertex count *before* this mesh's vertices land
        self.indices.extend(mesh.indices().iter().map(|&i| i.saturating_add(offset)));
        self.vertices.extend(mesh.materialized_vertices());

        if let Some(centroid) = mesh.centroid() {
            self.centroid_sum += centroid;
        }
        self.mesh_count += 1;
    }

    /// Number of meshes merged so far
    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    /// Seal the buffers and compute the aggregate centroid
    pub fn finish(self) -> Result<CompositeGeometry, AssemblyError> {
        if self.mesh_count == 0 {
            return Err(AssemblyError::EmptyMeshStore);
        }
        let vertex_count = self.vertices.len();
        if self.overflowed || u32::try_from(vertex_count).is_err() {
            return Err(AssemblyError::IndexOverflow { vertex_count });
        }

        let index_type = self.format.resolve(vertex_count);
        let index_stride = index_type.stride();

        let submeshes = self
            .ranges
            .into_iter()
            .map(|(fragment_id, vertex_offset, first_index, index_count)| Submesh {
                fragment_id,
                primitive_type: PrimitiveType::Triangle,
                vertex_offset,
                index_offset: first_index * index_stride,
                index_count,
                index_type,
            })
            .collect();

        let indices = match index_type {
            // Every index is below vertex_count, which fits in u16 here
            IndexType::Uint16 => IndexBuffer::Uint16(self.indices.iter().map(|&i| i as u16).collect()),
            IndexType::Uint32 => IndexBuffer::Uint32(self.indices),
        };

        let centroid = self.centroid_sum / self.mesh_count as f32;
        log::debug!(
            "Assembled {} meshes: {} vertices, {} indices ({:?}), centroid {:?}",
            self.mesh_count,
            vertex_count,
            indices.len(),
            index_type,
            centroid
        );

        Ok(CompositeGeometry {
            vertices: self.vertices,
            indices,
            submeshes,
            centroid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::render::material::Material;
    use crate::render::mesh::RawVertex;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn quad(id: &str, origin: Vec3) -> Mesh {
        let up = Vec3::new(0.0, 0.0, 1.0);
        let corners = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let vertices = corners
            .iter()
            .map(|c| RawVertex::new(origin + c, up, Vec2::new(c.x, c.y)))
            .collect();
        Mesh::new(id, vertices, vec![0, 1, 2, 0, 2, 3], Arc::new(Material::empty()))
    }

    fn triangle(id: &str) -> Mesh {
        let up = Vec3::new(0.0, 0.0, 1.0);
        Mesh::new(
            id,
            vec![
                RawVertex::new(Vec3::new(0.0, 0.0, 3.0), up, Vec2::zeros()),
                RawVertex::new(Vec3::new(3.0, 0.0, 3.0), up, Vec2::zeros()),
                RawVertex::new(Vec3::new(0.0, 3.0, 3.0), up, Vec2::zeros()),
            ],
            vec![0, 1, 2],
            Arc::new(Material::empty()),
        )
    }

    #[test]
    fn test_empty_store_is_an_error() {
        let result = CompositeAssembler::assemble(IndexFormat::Auto, std::iter::empty());
        assert!(matches!(result, Err(AssemblyError::EmptyMeshStore)));
    }

    #[test]
    fn test_indices_are_renumbered_by_vertex_offset() {
        let meshes = [quad("a", Vec3::zeros()), triangle("b"), quad("c", Vec3::new(5.0, 0.0, 0.0))];
        let composite = CompositeAssembler::assemble(IndexFormat::Uint32, &meshes).unwrap();

        let indices: Vec<u32> = composite.indices().iter().collect();
        assert_eq!(
            indices,
            vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 7, 8, 9, 7, 9, 10]
        );
    }

    #[test]
    fn test_counts_and_bounds() {
        let meshes = [quad("a", Vec3::zeros()), triangle("b"), quad("c", Vec3::new(5.0, 0.0, 0.0))];
        let composite = CompositeAssembler::assemble(IndexFormat::Auto, &meshes).unwrap();

        let expected_vertices: usize = meshes.iter().map(Mesh::vertex_count).sum();
        let expected_indices: usize = meshes.iter().map(Mesh::index_count).sum();
        assert_eq!(composite.vertex_count(), expected_vertices);
        assert_eq!(composite.index_count(), expected_indices);
        assert!(composite
            .indices()
            .iter()
            .all(|i| (i as usize) < composite.vertex_count()));
        assert_eq!(composite.vertex_bytes().len(), expected_vertices * VERTEX_STRIDE);
    }

    #[test]
    fn test_submesh_offsets() {
        let meshes = [quad("a", Vec3::zeros()), triangle("b")];
        let composite = CompositeAssembler::assemble(IndexFormat::Uint32, &meshes).unwrap();
        let submeshes = composite.submeshes();

        assert_eq!(submeshes.len(), 2);
        assert_eq!(submeshes[0].fragment_id, "a");
        assert_eq!(submeshes[0].vertex_offset, 0);
        assert_eq!(submeshes[0].index_offset, 0);
        assert_eq!(submeshes[0].index_count, 6);

        assert_eq!(submeshes[1].fragment_id, "b");
        assert_eq!(submeshes[1].vertex_offset, 4 * VERTEX_STRIDE);
        assert_eq!(submeshes[1].index_offset, 6 * 4);
        assert_eq!(submeshes[1].index_count, 3);
        assert_eq!(submeshes[1].index_type, IndexType::Uint32);
        assert_eq!(submeshes[1].primitive_type, PrimitiveType::Triangle);
    }

    #[test]
    fn test_auto_format_uses_sixteen_bit_for_small_scenes() {
        let meshes = [quad("a", Vec3::zeros()), triangle("b")];
        let composite = CompositeAssembler::assemble(IndexFormat::Auto, &meshes).unwrap();

        assert_eq!(composite.index_type(), IndexType::Uint16);
        assert_eq!(composite.index_bytes().len(), 9 * 2);
        assert_eq!(composite.submeshes()[1].index_offset, 6 * 2);
        assert!(composite.submeshes().iter().all(|s| s.index_type == IndexType::Uint16));
    }

    #[test]
    fn test_centroid_is_mean_of_mesh_centroids() {
        // quad centroid (0.5, 0.5, 0), triangle centroid (1, 1, 3)
        let meshes = [quad("a", Vec3::zeros()), triangle("b")];
        let composite = CompositeAssembler::assemble(IndexFormat::Auto, &meshes).unwrap();
        assert_relative_eq!(composite.centroid(), Vec3::new(0.75, 0.75, 1.5));
    }

    #[test]
    fn test_index_format_resolution() {
        assert_eq!(IndexFormat::Auto.resolve(65_536), IndexType::Uint16);
        assert_eq!(IndexFormat::Auto.resolve(65_537), IndexType::Uint32);
        assert_eq!(IndexFormat::Uint32.resolve(3), IndexType::Uint32);
    }
}

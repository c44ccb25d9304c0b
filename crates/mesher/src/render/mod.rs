//! Render-facing data: decoded meshes and the composite payload handed to a renderer

pub mod composite;
pub mod material;
pub mod mesh;

pub use composite::{
    AssemblyError, CompositeAssembler, CompositeGeometry, IndexBuffer, IndexFormat, IndexType,
    PrimitiveType, Submesh,
};
pub use material::Material;
pub use mesh::{CompositeVertex, Mesh, RawVertex, VERTEX_STRIDE};

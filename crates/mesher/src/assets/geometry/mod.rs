//! Binary fragment geometry
//!
//! Fragment blobs are positional little-endian records with no header:
//!
//! ```text
//! i32 coord_count      | f32 × coord_count     (xyz triples)
//! i32 index_count      | i32 × index_count     (triangle corners)
//! i32 uv_count         | f32 × uv_count        (uv pairs, one per position)
//! ```

pub mod mesh_parser;
mod reader;

pub use mesh_parser::{DecodeMode, DecodedGeometry, GeometryDecoder, GeometryError};

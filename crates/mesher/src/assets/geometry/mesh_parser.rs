//! Fragment geometry decoder
//!
//! Decodes one fragment blob into vertices with reconstructed normals and a
//! triangle index list. Two modes are supported:
//!
//! - **Raw**: positions, UVs and indices are reproduced exactly.
//! - **Deduplicated**: coincident positions collapse into one vertex (first
//!   seen wins the output slot) and every triangle index is remapped.
//!
//! Normals are rebuilt in both modes by accumulating the unit face normal of
//! every triangle into its three corners and normalizing the sums.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reader::ByteReader;
use crate::foundation::math::{self, Vec2, Vec3, NORMAL_EPSILON};
use crate::render::{Material, Mesh, RawVertex};

/// Fragment decode errors
///
/// Every variant is local to one fragment; a failing fragment is dropped from
/// the load without affecting the others.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The blob ended before a declared section did
    #[error("Unexpected end of data at byte {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes left in the blob
        available: usize,
    },

    /// A count prefix was negative
    #[error("Negative {field} count: {value}")]
    NegativeCount {
        /// Which count prefix
        field: &'static str,
        /// Value read
        value: i32,
    },

    /// A count prefix is not a whole number of tuples
    #[error("{field} count {count} is not a multiple of {tuple}")]
    MisalignedCount {
        /// Which count prefix
        field: &'static str,
        /// Value read
        count: usize,
        /// Expected tuple width
        tuple: usize,
    },

    /// A triangle references a position that does not exist
    #[error("Triangle index {index} at position {position} is outside 0..{vertex_count}")]
    IndexOutOfRange {
        /// Position of the index in the triangle list
        position: usize,
        /// Index value
        index: i32,
        /// Number of raw positions
        vertex_count: usize,
    },

    /// UVs present but not one pair per position
    #[error("Expected {vertex_count} uv pairs, found {uv_pairs}")]
    UvCountMismatch {
        /// UV pairs found
        uv_pairs: usize,
        /// Positions found
        vertex_count: usize,
    },

    /// The fragment declares no positions
    #[error("Fragment contains no vertices")]
    EmptyGeometry,

    /// A triangle has no defined facing (zero-length edge or collinear corners)
    #[error("Triangle {triangle} is degenerate, cannot compute its normal")]
    ZeroVector {
        /// Triangle number within the fragment
        triangle: usize,
    },
}

/// How coincident positions are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Keep every position as stored
    Raw,
    /// Collapse identical positions into one vertex
    #[default]
    Deduplicated,
}

/// Output of a successful decode
#[derive(Debug, Clone)]
pub struct DecodedGeometry {
    /// Output vertices (deduplicated in [`DecodeMode::Deduplicated`])
    pub vertices: Vec<RawVertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
    /// Number of positions stored in the blob
    pub raw_vertex_count: usize,
}

/// Positional record as laid out in the blob
struct RawRecord {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    uvs: Vec<Vec2>,
}

/// Fragment geometry decoder
pub struct GeometryDecoder;

impl GeometryDecoder {
    /// Decode a fragment blob
    pub fn decode(data: &[u8], mode: DecodeMode) -> Result<DecodedGeometry, GeometryError> {
        let record = Self::read_record(data)?;
        let raw_vertex_count = record.positions.len();

        let (positions, indices, uvs) = match mode {
            DecodeMode::Raw => {
                let uvs = (0..raw_vertex_count).map(|i| uv_at(&record.uvs, i)).collect();
                (record.positions, record.indices, uvs)
            }
            DecodeMode::Deduplicated => Self::deduplicate(record),
        };

        let normals = Self::make_normals(&positions, &indices)?;

        let vertices = positions
            .into_iter()
            .zip(normals)
            .zip(uvs)
            .map(|((position, normal), uv)| RawVertex::new(position, normal, uv))
            .collect();

        Ok(DecodedGeometry {
            vertices,
            indices,
            raw_vertex_count,
        })
    }

    /// Decode a fragment blob into a [`Mesh`] carrying the given material
    pub fn decode_mesh(
        id: impl Into<String>,
        data: &[u8],
        mode: DecodeMode,
        material: Arc<Material>,
    ) -> Result<Mesh, GeometryError> {
        let id = id.into();
        let decoded = Self::decode(data, mode)?;
        log::trace!(
            "Decoded fragment {}: {} positions -> {} vertices, {} indices",
            id,
            decoded.raw_vertex_count,
            decoded.vertices.len(),
            decoded.indices.len()
        );
        Ok(Mesh::new(id, decoded.vertices, decoded.indices, material))
    }

    fn read_record(data: &[u8]) -> Result<RawRecord, GeometryError> {
        let mut reader = ByteReader::new(data);

        // Positions
        let coord_count = reader.read_count("coordinate")?;
        check_tuple("coordinate", coord_count, 3)?;
        let positions: Vec<Vec3> = reader
            .read_f32s(coord_count)?
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();
        if positions.is_empty() {
            return Err(GeometryError::EmptyGeometry);
        }

        // Triangles
        let index_count = reader.read_count("triangle index")?;
        check_tuple("triangle index", index_count, 3)?;
        let indices = reader
            .read_i32s(index_count)?
            .into_iter()
            .enumerate()
            .map(|(position, index)| {
                u32::try_from(index)
                    .ok()
                    .filter(|&i| (i as usize) < positions.len())
                    .ok_or(GeometryError::IndexOutOfRange {
                        position,
                        index,
                        vertex_count: positions.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // UVs
        let uv_count = reader.read_count("uv")?;
        check_tuple("uv", uv_count, 2)?;
        let uvs: Vec<Vec2> = reader
            .read_f32s(uv_count)?
            .chunks_exact(2)
            .map(|c| Vec2::new(c[0], c[1]))
            .collect();
        if !uvs.is_empty() && uvs.len() != positions.len() {
            return Err(GeometryError::UvCountMismatch {
                uv_pairs: uvs.len(),
                vertex_count: positions.len(),
            });
        }

        if reader.remaining() > 0 {
            log::debug!(
                "Ignoring {} trailing bytes after offset {}",
                reader.remaining(),
                reader.offset()
            );
        }

        Ok(RawRecord {
            positions,
            indices,
            uvs,
        })
    }

    /// Collapse identical positions, returning (positions, indices, uvs)
    ///
    /// Output slots are assigned in first-seen order. The UV of output vertex
    /// `o` is `uvs[deduped_indices[o]]`, falling back to the UV of the first
    /// raw position that mapped to `o` when the triangle list is shorter than
    /// the vertex list.
    fn deduplicate(record: RawRecord) -> (Vec<Vec3>, Vec<u32>, Vec<Vec2>) {
        let RawRecord {
            positions,
            indices,
            uvs,
        } = record;

        let mut slots: HashMap<[u32; 3], u32> = HashMap::with_capacity(positions.len());
        let mut first_raw: Vec<usize> = Vec::new();
        let remap: Vec<u32> = positions
            .iter()
            .enumerate()
            .map(|(raw, position)| {
                let next = first_raw.len() as u32;
                *slots.entry(position_key(position)).or_insert_with(|| {
                    first_raw.push(raw);
                    next
                })
            })
            .collect();

        log::debug!("Deduped {} coords into {}", positions.len(), first_raw.len());

        let deduped_indices: Vec<u32> = indices.iter().map(|&i| remap[i as usize]).collect();
        let deduped_positions: Vec<Vec3> = first_raw.iter().map(|&raw| positions[raw]).collect();
        let deduped_uvs: Vec<Vec2> = first_raw
            .iter()
            .enumerate()
            .map(|(output, &raw)| {
                let source = deduped_indices.get(output).map_or(raw, |&i| i as usize);
                uv_at(&uvs, source)
            })
            .collect();

        (deduped_positions, deduped_indices, deduped_uvs)
    }

    /// Per-vertex normals from face windings
    ///
    /// Vertices not referenced by any triangle, or whose face normals cancel
    /// out, keep a zero normal.
    fn make_normals(positions: &[Vec3], indices: &[u32]) -> Result<Vec<Vec3>, GeometryError> {
        let mut normals = vec![Vec3::zeros(); positions.len()];

        for (triangle, corners) in indices.chunks_exact(3).enumerate() {
            let (a, b, c) = (corners[0] as usize, corners[1] as usize, corners[2] as usize);
            let normal = math::face_normal(&positions[a], &positions[b], &positions[c])
                .ok_or(GeometryError::ZeroVector { triangle })?;

            normals[a] += normal;
            normals[b] += normal;
            normals[c] += normal;
        }

        Ok(normals
            .into_iter()
            .map(|n| n.try_normalize(NORMAL_EPSILON).unwrap_or_else(Vec3::zeros))
            .collect())
    }
}

fn check_tuple(field: &'static str, count: usize, tuple: usize) -> Result<(), GeometryError> {
    if count % tuple == 0 {
        Ok(())
    } else {
        Err(GeometryError::MisalignedCount {
            field,
            count,
            tuple,
        })
    }
}

fn uv_at(uvs: &[Vec2], index: usize) -> Vec2 {
    uvs.get(index).copied().unwrap_or_else(Vec2::zeros)
}

/// Hash key for a position; `-0.0` and `0.0` compare equal
fn position_key(position: &Vec3) -> [u32; 3] {
    let bits = |v: f32| if v == 0.0 { 0.0f32.to_bits() } else { v.to_bits() };
    [bits(position.x), bits(position.y), bits(position.z)]
}

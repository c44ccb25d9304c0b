//! Little-endian cursor over a fragment blob

use super::mesh_parser::GeometryError;

/// Reads fixed-width little-endian values, tracking the current offset
pub(super) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(super) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(super) fn offset(&self) -> usize {
        self.offset
    }

    pub(super) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], GeometryError> {
        if len > self.remaining() {
            return Err(GeometryError::UnexpectedEof {
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn word(&mut self) -> Result<[u8; 4], GeometryError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub(super) fn read_i32(&mut self) -> Result<i32, GeometryError> {
        self.word().map(i32::from_le_bytes)
    }

    /// Read a count prefix, rejecting negatives and counts the buffer cannot hold
    pub(super) fn read_count(&mut self, field: &'static str) -> Result<usize, GeometryError> {
        let value = self.read_i32()?;
        let count = usize::try_from(value).map_err(|_| GeometryError::NegativeCount { field, value })?;
        let needed = count.saturating_mul(4);
        if needed > self.remaining() {
            return Err(GeometryError::UnexpectedEof {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        Ok(count)
    }

    pub(super) fn read_f32s(&mut self, count: usize) -> Result<Vec<f32>, GeometryError> {
        let bytes = self.take(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub(super) fn read_i32s(&mut self, count: usize) -> Result<Vec<i32>, GeometryError> {
        let bytes = self.take(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

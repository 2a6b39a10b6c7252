//! Storage form for embedding vectors.
//!
//! Vectors are packed as little-endian `f32`, four bytes per component,
//! with no header. The dimension is not self-describing.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

const COMPONENT_BYTES: usize = std::mem::size_of::<f32>();

/// Pack a vector into its byte form.
pub fn serialize(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * COMPONENT_BYTES);
    for component in vector {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    bytes
}

/// Unpack a vector from its byte form.
pub fn deserialize(bytes: &[u8]) -> Result<Embedding> {
    if bytes.len() % COMPONENT_BYTES != 0 {
        return Err(EmbeddingError::InvalidByteLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(COMPONENT_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

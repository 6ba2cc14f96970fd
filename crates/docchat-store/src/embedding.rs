//! Embedding BLOB encoding and the cosine distance used by vector search.

use ndarray::ArrayView1;

/// Encode an embedding as little-endian f32 bytes.
pub fn encode_vector(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes. Returns None when the length is not a
/// multiple of four.
pub fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// None when the lengths differ, either vector is empty, or either has zero norm.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return None;
    }

    let similarity = (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0);
    Some(1.0 - similarity as f64)
}

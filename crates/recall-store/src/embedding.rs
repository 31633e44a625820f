//! Little-endian f32 blob codec for chunk embeddings.

/// Encode an embedding as a little-endian f32 byte blob.
pub fn encode_f32(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a blob written by [`encode_f32`]. Trailing bytes that do not form
/// a whole float are ignored.
pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_is_lossless() {
        let original = vec![0.1_f32, -0.5, 3.25, f32::MIN_POSITIVE, 0.0];
        let bytes = encode_f32(&original);
        assert_eq!(bytes.len(), 20);
        assert_eq!(decode_f32(&bytes), original);
    }

    #[test]
    fn test_partial_trailing_bytes_ignored() {
        let mut bytes = encode_f32(&[1.0, 2.0]);
        bytes.push(7);
        assert_eq!(decode_f32(&bytes), vec![1.0, 2.0]);
    }
}

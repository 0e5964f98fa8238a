//! Wire format compression for network messages.
//!
//! Every payload is LZ4-compressed after SBOR encoding. The size prefix is
//! part of LZ4's framing: it stores the original uncompressed size so
//! decompression can pre-allocate the output buffer.

use thiserror::Error;

/// Upper bound on a decompressed payload. Guards the size prefix against
/// hostile values.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Errors from wire encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("declared size {0} exceeds limit")]
    TooLarge(usize),
}

/// Compress data for transmission over the network.
#[inline]
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress data received from the network.
///
/// Expects LZ4 block format with prepended size header.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, WireError> {
    if data.len() >= 4 {
        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if declared > MAX_PAYLOAD_SIZE {
            return Err(WireError::TooLarge(declared));
        }
    }
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| WireError::DecompressionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let original = b"hello world, this is a test message for compression";
        let compressed = compress(original);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_compressible_data() {
        let original = vec![0u8; 10000];
        let compressed = compress(&original);
        assert!(compressed.len() < original.len() / 2);
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_invalid_data() {
        assert!(decompress(b"not valid lz4 data").is_err());
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, 1, 2]);
        assert_eq!(
            decompress(&data),
            Err(WireError::TooLarge(u32::MAX as usize))
        );
    }
}

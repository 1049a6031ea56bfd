use flate2::Compression;
use flate2::read::{GzDecoder, GzEncoder};
use std::io::Read;

/// Marker byte prepended to a compressed payload so `decode` can tell a
/// compressed entry apart from a raw one without external metadata.
const COMPRESSED_MARKER: u8 = 0x01;
const RAW_MARKER: u8 = 0x00;

/// Gzip-compress `value` and prefix it with [`COMPRESSED_MARKER`] if it
/// exceeds `threshold` bytes; otherwise prefix with [`RAW_MARKER`] and store
/// as-is.
pub fn encode(value: &[u8], threshold: usize) -> Vec<u8> {
    if value.len() <= threshold {
        let mut out = Vec::with_capacity(value.len() + 1);
        out.push(RAW_MARKER);
        out.extend_from_slice(value);
        return out;
    }

    let mut encoder = GzEncoder::new(value, Compression::default());
    let mut compressed = Vec::new();
    if encoder.read_to_end(&mut compressed).is_err() {
        let mut out = Vec::with_capacity(value.len() + 1);
        out.push(RAW_MARKER);
        out.extend_from_slice(value);
        return out;
    }

    let mut out = Vec::with_capacity(compressed.len() + 1);
    out.push(COMPRESSED_MARKER);
    out.extend_from_slice(&compressed);
    out
}

/// Inverse of [`encode`]: strip the marker byte and gunzip if necessary.
pub fn decode(stored: &[u8]) -> Vec<u8> {
    match stored.split_first() {
        Some((&COMPRESSED_MARKER, rest)) => {
            let mut decoder = GzDecoder::new(rest);
            let mut out = Vec::new();
            match decoder.read_to_end(&mut out) {
                Ok(_) => out,
                Err(_) => Vec::new(),
            }
        }
        Some((&RAW_MARKER, rest)) => rest.to_vec(),
        Some(_) | None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_values_uncompressed() {
        let value = b"short";
        let stored = encode(value, 1024);
        assert_eq!(stored[0], RAW_MARKER);
        assert_eq!(decode(&stored), value);
    }

    #[test]
    fn round_trips_large_values_compressed() {
        let value = vec![b'a'; 4096];
        let stored = encode(&value, 16);
        assert_eq!(stored[0], COMPRESSED_MARKER);
        assert!(stored.len() < value.len());
        assert_eq!(decode(&stored), value);
    }
}

use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Size above which a frame is compressed, provided the peer advertised
/// support for it (§4.6).
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

/// A logical frame queued for delivery to one client. `bypass_batch`
/// marks welcome/heartbeat/typing/error frames that skip the batcher
/// entirely (§4.6).
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub body: serde_json::Value,
    #[serde(skip)]
    pub bypass_batch: bool,
}

impl Frame {
    pub fn new(frame_type: impl Into<String>, body: serde_json::Value) -> Self {
        Self { frame_type: frame_type.into(), body, bypass_batch: false }
    }

    pub fn bypassing(mut self) -> Self {
        self.bypass_batch = true;
        self
    }

    /// Content hash used for per-client dedup (§4.6): a hash of the
    /// serialized frame, independent of dispatch time.
    pub fn content_hash(&self) -> String {
        let serialized = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        hex::encode(hasher.finalize())
    }
}

/// A batch of frames, wrapped per §4.6 when more than one frame is sent
/// together.
pub fn wrap_batch(frames: &[Frame]) -> serde_json::Value {
    if frames.len() == 1 {
        serde_json::json!({ "type": frames[0].frame_type, "body": frames[0].body })
    } else {
        serde_json::json!({
            "type": "batch",
            "messages": frames.iter().map(|f| serde_json::json!({"type": f.frame_type, "body": f.body})).collect::<Vec<_>>(),
        })
    }
}

/// What actually goes out over the wire: plain JSON text, or a
/// gzip-compressed binary frame when the payload is large and the peer
/// supports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    CompressedBinary(Vec<u8>),
}

/// Marker prepended to a compressed binary frame so the peer can tell a
/// gzip payload apart from any other binary frame shape without probing it.
pub const COMPRESSED_PREFIX: &[u8] = b"COMPRESSED:";

/// Serializes and, if warranted, compresses a batch for the wire (§4.6).
/// A compressed frame carries `COMPRESSED_PREFIX` ahead of the gzip bytes.
pub fn encode_for_wire(frames: &[Frame], peer_supports_compression: bool) -> WireFrame {
    let payload = wrap_batch(frames);
    let json = serde_json::to_string(&payload).unwrap_or_default();

    if peer_supports_compression && json.len() > COMPRESSION_THRESHOLD_BYTES {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(json.as_bytes()).is_ok() {
            if let Ok(compressed) = encoder.finish() {
                let mut framed = Vec::with_capacity(COMPRESSED_PREFIX.len() + compressed.len());
                framed.extend_from_slice(COMPRESSED_PREFIX);
                framed.extend_from_slice(&compressed);
                return WireFrame::CompressedBinary(framed);
            }
        }
    }
    WireFrame::Text(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_frames_hash_identically() {
        let a = Frame::new("typing", serde_json::json!({"user": "u1"}));
        let b = Frame::new("typing", serde_json::json!({"user": "u1"}));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn different_frames_hash_differently() {
        let a = Frame::new("typing", serde_json::json!({"user": "u1"}));
        let b = Frame::new("typing", serde_json::json!({"user": "u2"}));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn multi_frame_batch_wraps_as_batch_envelope() {
        let frames = vec![Frame::new("a", serde_json::json!({})), Frame::new("b", serde_json::json!({}))];
        let wrapped = wrap_batch(&frames);
        assert_eq!(wrapped["type"], "batch");
        assert_eq!(wrapped["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn small_payload_stays_text_even_with_compression_support() {
        let frames = vec![Frame::new("a", serde_json::json!({"x": 1}))];
        let encoded = encode_for_wire(&frames, true);
        assert!(matches!(encoded, WireFrame::Text(_)));
    }

    #[test]
    fn large_payload_compresses_when_peer_supports_it() {
        let body = serde_json::json!({"blob": "x".repeat(4096)});
        let frames = vec![Frame::new("a", body)];
        let encoded = encode_for_wire(&frames, true);
        assert!(matches!(encoded, WireFrame::CompressedBinary(_)));
    }

    #[test]
    fn large_payload_stays_text_when_peer_lacks_compression_support() {
        let body = serde_json::json!({"blob": "x".repeat(4096)});
        let frames = vec![Frame::new("a", body)];
        let encoded = encode_for_wire(&frames, false);
        assert!(matches!(encoded, WireFrame::Text(_)));
    }
}

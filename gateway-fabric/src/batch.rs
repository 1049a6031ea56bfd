use chrono::{DateTime, Utc};

use crate::frame::Frame;

/// Flush thresholds (§4.6): 50 frames, or 100ms since the first frame in
/// the current batch, whichever comes first.
pub const BATCH_MAX_FRAMES: usize = 50;
pub const BATCH_WINDOW: chrono::Duration = chrono::Duration::milliseconds(100);

/// Accumulates frames for one client between flushes. Bypass frames never
/// enter this buffer — callers send them directly.
#[derive(Default)]
pub struct ClientBatcher {
    buffer: Vec<Frame>,
    opened_at: Option<DateTime<Utc>>,
}

impl ClientBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame, flushing and returning the prior batch first if the
    /// size threshold was already reached.
    pub fn enqueue(&mut self, frame: Frame, now: DateTime<Utc>) -> Option<Vec<Frame>> {
        let flushed = if self.buffer.len() >= BATCH_MAX_FRAMES { self.take(now) } else { None };

        if self.buffer.is_empty() {
            self.opened_at = Some(now);
        }
        self.buffer.push(frame);
        flushed
    }

    /// Flushes if the time window has elapsed since the batch opened;
    /// called by a periodic timer rather than only on new-frame arrival so
    /// a slow trickle of frames still flushes promptly.
    pub fn flush_if_stale(&mut self, now: DateTime<Utc>) -> Option<Vec<Frame>> {
        match self.opened_at {
            Some(opened) if now - opened >= BATCH_WINDOW => self.take(now),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self, _now: DateTime<Utc>) -> Option<Vec<Frame>> {
        if self.buffer.is_empty() {
            return None;
        }
        self.opened_at = None;
        Some(std::mem::take(&mut self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn flushes_at_max_frame_count() {
        let mut batcher = ClientBatcher::new();
        for i in 0..BATCH_MAX_FRAMES {
            let flushed = batcher.enqueue(Frame::new("msg", serde_json::json!({"i": i})), at(0));
            assert!(flushed.is_none());
        }
        let flushed = batcher.enqueue(Frame::new("msg", serde_json::json!({"i": 51})), at(1));
        assert_eq!(flushed.unwrap().len(), BATCH_MAX_FRAMES);
    }

    #[test]
    fn flushes_when_window_elapses() {
        let mut batcher = ClientBatcher::new();
        batcher.enqueue(Frame::new("msg", serde_json::json!({})), at(0));
        assert!(batcher.flush_if_stale(at(50)).is_none());
        let flushed = batcher.flush_if_stale(at(150));
        assert_eq!(flushed.unwrap().len(), 1);
    }

    #[test]
    fn empty_batcher_never_flushes() {
        let mut batcher = ClientBatcher::new();
        assert!(batcher.flush_if_stale(at(10_000)).is_none());
    }
}

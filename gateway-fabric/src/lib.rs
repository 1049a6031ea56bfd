//! Connection fabric (§4.6): admission control, per-client batching,
//! content dedup, compression, and group broadcast for live analytics
//! streams. The transport itself (accepting a websocket upgrade, reading
//! inbound frames) belongs to the HTTP surface; this crate owns everything
//! between "a frame is ready to send" and "bytes handed to the socket".

pub mod admission;
pub mod batch;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod frame;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

pub use admission::{AdmissionPermit, AdmissionPool};
pub use connection::{ClientMetadata, ConnectionTable};
pub use error::FabricError;
pub use frame::{Frame, WireFrame, encode_for_wire};

use batch::ClientBatcher;
use dedup::DedupCache;

/// Past this many frames handed to the sender without completing, a
/// client's outbound path is considered backed up and the connection is
/// torn down (§4.6: close code 1009 territory, enforced by the caller).
pub const MAX_QUEUED_OUTBOUND_FRAMES: usize = 1_000;
pub const HEARTBEAT_INTERVAL: chrono::Duration = chrono::Duration::seconds(30);
pub const IDLE_CLEANUP_INTERVAL: chrono::Duration = chrono::Duration::minutes(5);
pub const IDLE_TIMEOUT: chrono::Duration = chrono::Duration::minutes(30);

const DEFAULT_GROUP: &str = "default";

/// Delivers already-encoded wire bytes to one client's socket. Implemented
/// by the HTTP surface over the actual websocket sink; a test double
/// records frames instead of writing to a socket.
#[async_trait]
pub trait FrameSender: Send + Sync {
    async fn send(&self, client_id: &str, wire: WireFrame) -> Result<(), FabricError>;
}

struct ClientChannel {
    batcher: Mutex<ClientBatcher>,
    dedup: Mutex<DedupCache>,
    peer_supports_compression: bool,
    outbound_depth: Arc<AtomicUsize>,
}

/// Ties admission control, the connection table, and per-client
/// batching/dedup/compression together behind one send/broadcast API.
pub struct ConnectionFabric<S: FrameSender> {
    admission: AdmissionPool,
    table: ConnectionTable,
    channels: DashMap<String, ClientChannel>,
    sender: Arc<S>,
}

impl<S: FrameSender> ConnectionFabric<S> {
    pub fn new(capacity: usize, sender: Arc<S>) -> Self {
        Self { admission: AdmissionPool::new(capacity), table: ConnectionTable::new(), channels: DashMap::new(), sender }
    }

    pub fn admit(&self) -> Result<AdmissionPermit, FabricError> {
        self.admission.admit()
    }

    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Registers a newly accepted connection. Callers hold the
    /// `AdmissionPermit` returned by [`Self::admit`] for the connection's
    /// lifetime; it is not owned by the fabric itself.
    pub fn register_client(&self, client_id: &str, peer_supports_compression: bool, now: DateTime<Utc>) {
        self.table.register(client_id, DEFAULT_GROUP, now);
        self.channels.insert(
            client_id.to_string(),
            ClientChannel {
                batcher: Mutex::new(ClientBatcher::new()),
                dedup: Mutex::new(DedupCache::new(1_000)),
                peer_supports_compression,
                outbound_depth: Arc::new(AtomicUsize::new(0)),
            },
        );
    }

    pub fn join_group(&self, client_id: &str, group: &str) {
        self.table.join_group(client_id, group);
    }

    pub fn touch_activity(&self, client_id: &str, now: DateTime<Utc>) {
        self.table.touch_activity(client_id, now);
    }

    pub fn disconnect(&self, client_id: &str) {
        self.table.remove(client_id);
        self.channels.remove(client_id);
    }

    /// Queues one frame for one client: dedup first, then batch, dispatching
    /// immediately if the frame bypasses the batcher or the batch became
    /// full (§4.6).
    pub async fn send_to(&self, client_id: &str, frame: Frame, now: DateTime<Utc>) -> Result<(), FabricError> {
        let ready_batch = {
            let channel =
                self.channels.get(client_id).ok_or_else(|| FabricError::ClientNotFound(client_id.to_string()))?;

            if frame.bypass_batch {
                Some(vec![frame])
            } else {
                let hash = frame.content_hash();
                if channel.dedup.lock().expect("dedup lock poisoned").check_and_record(&hash) {
                    return Ok(());
                }
                channel.batcher.lock().expect("batcher lock poisoned").enqueue(frame, now)
            }
        };

        match ready_batch {
            Some(batch) => self.dispatch(client_id, batch).await,
            None => Ok(()),
        }
    }

    /// Flushes any client whose batch window has elapsed. Driven by a
    /// periodic timer in the host server, not by frame arrival.
    pub async fn flush_stale_batches(&self, now: DateTime<Utc>) -> Vec<(String, FabricError)> {
        let client_ids = self.table.all_client_ids();
        let mut failures = Vec::new();

        for client_id in client_ids {
            let ready = match self.channels.get(&client_id) {
                Some(channel) => channel.batcher.lock().expect("batcher lock poisoned").flush_if_stale(now),
                None => None,
            };
            if let Some(batch) = ready {
                if let Err(e) = self.dispatch(&client_id, batch).await {
                    failures.push((client_id, e));
                }
            }
        }
        failures
    }

    /// Resolves the group's membership once, then fans out concurrently
    /// (§4.6). Targets whose send fails are disconnected.
    pub async fn broadcast(&self, group: &str, frame: Frame, now: DateTime<Utc>) -> Vec<(String, FabricError)> {
        let targets = self.table.members_of(group);
        let sends = targets.into_iter().map(|client_id| {
            let frame = frame.clone();
            async move {
                let result = self.send_to(&client_id, frame, now).await;
                (client_id, result)
            }
        });
        let results = futures::future::join_all(sends).await;
        self.disconnect_failures(results)
    }

    /// Sends a heartbeat frame to every connected client, disconnecting any
    /// whose send fails (§4.6: heartbeat interval of 30s).
    pub async fn broadcast_heartbeat(&self, now: DateTime<Utc>) -> Vec<(String, FabricError)> {
        let heartbeat = Frame::new("heartbeat", serde_json::json!({ "ts": now.to_rfc3339() })).bypassing();
        let client_ids = self.table.all_client_ids();
        let sends = client_ids.into_iter().map(|client_id| {
            let heartbeat = heartbeat.clone();
            async move {
                let result = self.dispatch(&client_id, vec![heartbeat]).await;
                (client_id, result)
            }
        });
        let results = futures::future::join_all(sends).await;
        self.disconnect_failures(results)
    }

    /// Disconnects clients idle past [`IDLE_TIMEOUT`], sending a closing
    /// notice first (§4.6). Driven by a periodic cleanup task.
    pub async fn run_idle_sweep(&self, now: DateTime<Utc>) {
        for client_id in self.table.idle_clients(now - IDLE_TIMEOUT) {
            let notice = Frame::new("connection.closing", serde_json::json!({ "reason": "idle_timeout" }));
            let _ = self.dispatch(&client_id, vec![notice]).await;
            self.disconnect(&client_id);
        }
    }

    async fn dispatch(&self, client_id: &str, batch: Vec<Frame>) -> Result<(), FabricError> {
        let (peer_supports_compression, depth) = {
            let channel =
                self.channels.get(client_id).ok_or_else(|| FabricError::ClientNotFound(client_id.to_string()))?;
            (channel.peer_supports_compression, Arc::clone(&channel.outbound_depth))
        };

        if depth.fetch_add(1, Ordering::SeqCst) + 1 > MAX_QUEUED_OUTBOUND_FRAMES {
            depth.fetch_sub(1, Ordering::SeqCst);
            return Err(FabricError::BackpressureExceeded { limit: MAX_QUEUED_OUTBOUND_FRAMES });
        }

        let wire = encode_for_wire(&batch, peer_supports_compression);
        let result = self.sender.send(client_id, wire).await;
        depth.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn disconnect_failures(&self, results: Vec<(String, Result<(), FabricError>)>) -> Vec<(String, FabricError)> {
        let mut failures = Vec::new();
        for (client_id, result) in results {
            if let Err(e) = result {
                self.disconnect(&client_id);
                failures.push((client_id, e));
            }
        }
        failures
    }
}

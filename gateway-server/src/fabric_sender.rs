//! Bridges `gateway_fabric::FrameSender` to real axum websocket sockets.
//! `ConnectionFabric` knows nothing about sockets — it hands already-encoded
//! [`WireFrame`]s to this sender by client id; this type owns the actual
//! per-connection outbound channel and maps the two wire variants onto
//! [`Message::Text`]/[`Message::Binary`] (§6: a compressed frame's
//! `COMPRESSED:` prefix is already baked into the bytes by
//! `gateway_fabric::frame::encode_for_wire`, so this bridge only needs to
//! pick the right `Message` variant).

use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use gateway_fabric::{FabricError, FrameSender, WireFrame};
use tokio::sync::mpsc;

pub struct WsFrameSender {
    sockets: DashMap<String, mpsc::UnboundedSender<Message>>,
}

impl WsFrameSender {
    pub fn new() -> Self {
        Self { sockets: DashMap::new() }
    }

    pub fn register(&self, client_id: &str, tx: mpsc::UnboundedSender<Message>) {
        self.sockets.insert(client_id.to_string(), tx);
    }

    pub fn unregister(&self, client_id: &str) {
        self.sockets.remove(client_id);
    }
}

impl Default for WsFrameSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSender for WsFrameSender {
    async fn send(&self, client_id: &str, wire: WireFrame) -> Result<(), FabricError> {
        let tx = self.sockets.get(client_id).ok_or_else(|| FabricError::ClientNotFound(client_id.to_string()))?;
        let message = match wire {
            WireFrame::Text(text) => Message::Text(text.into()),
            WireFrame::CompressedBinary(bytes) => Message::Binary(bytes.into()),
        };
        tx.send(message).map_err(|_| FabricError::SendFailed(client_id.to_string()))
    }
}

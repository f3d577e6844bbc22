//! JSON frame types for the WebSocket protocol.
//!
//! Inbound (client -> server): `{"recipient": "...", "text": "..."}`.
//! Outbound (server -> client): `{"type": "message", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::db::models::Message;

/// A client frame asking to send a direct message.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub recipient: String,
    pub text: String,
}

/// Server frames pushed to clients. Tagged by "type" with the payload
/// under "data".
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundFrame {
    Message(Message),
}

impl OutboundFrame {
    /// Serialize to the wire representation. Serialization of these frames
    /// cannot fail for the types involved; errors are logged and yield None.
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode outbound frame");
                None
            }
        }
    }
}

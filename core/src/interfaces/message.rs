//! Outbound event messages.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::utils::gen_id;

/// A fully-formed event ready for delivery: header plus JSON payload.
#[derive(Debug, Clone)]
pub struct EventMessage {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub payload: Value,
}

impl EventMessage {
    pub fn new(namespace: &str, name: &str, payload: Value) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message_id: gen_id(),
            payload,
        }
    }

    /// The wire form of the event.
    pub fn to_json(&self) -> Value {
        json!({
            "header": {
                "namespace": self.namespace,
                "name": self.name,
                "messageId": self.message_id,
            },
            "payload": self.payload,
        })
    }
}

/// Accepts fully-formed events for asynchronous delivery. Never fails
/// synchronously; delivery errors are the sender's concern.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, message: EventMessage);
}

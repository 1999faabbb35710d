//! Transport boundary for relay publish/subscribe
//!
//! The core never talks to relays directly. A [`Transport`] implementation
//! publishes a payload to a target identity and delivers inbound payloads
//! through a subscription callback. Deliveries carry no ordering or
//! uniqueness guarantees across senders; the protocol layer above is built
//! for that.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("transport closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Relay tuning passed through to the transport unmodified.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Relay endpoint URIs, opaque to the core.
    pub relays: Vec<String>,
    /// Proof-of-work difficulty for published events, if the transport
    /// supports it.
    pub pow_difficulty: Option<u8>,
    /// Per-publish timeout in milliseconds.
    pub send_timeout_ms: Option<u64>,
}

/// Raw delivery metadata accompanying an inbound payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Transport-level id of the raw event.
    pub event_id: String,
    /// When the delivery reached this process.
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// Callback invoked once per inbound delivery with
/// `(payload, sender identity, envelope)`.
pub type DeliveryHandler = Arc<dyn Fn(Value, String, Envelope) + Send + Sync>;

/// Publish/subscribe transport over a set of relay endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish `payload` to `target`, returning the transport message id.
    async fn send(
        &self,
        target: &str,
        payload: Value,
        options: &RelayOptions,
    ) -> Result<String, TransportError>;

    /// Open the inbound subscription; `on_message` is invoked once per
    /// delivery until [`Transport::unsubscribe`] is called.
    async fn subscribe(
        &self,
        options: &RelayOptions,
        on_message: DeliveryHandler,
    ) -> Result<(), TransportError>;

    /// Close the inbound subscription.
    async fn unsubscribe(&self) -> Result<(), TransportError>;
}

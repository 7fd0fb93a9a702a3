//! Transport adapter contracts.
//!
//! Adapters own binding encoding (form posts, deflated redirects, SOAP)
//! and XML. The broker hands them protocol objects and gets protocol
//! objects back.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{ProfileMessage, SamlBinding};

/// Errors raised by transport adapters.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The outbound message could not be sent.
    #[error("failed to dispatch message: {0}")]
    Dispatch(String),

    /// The inbound message could not be read or decoded.
    #[error("failed to receive message: {0}")]
    Receive(String),

    /// No inbound message is available.
    #[error("no inbound message")]
    NoMessage,
}

/// A message ready for an outbound adapter.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Protocol message.
    pub message: ProfileMessage,
    /// Binding to encode with.
    pub binding: SamlBinding,
    /// Target location.
    pub destination: String,
    /// Relay state to carry.
    pub relay_state: Option<String>,
    /// Whether the adapter must sign.
    pub sign: bool,
}

/// A message decoded by an inbound adapter.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Protocol message.
    pub message: ProfileMessage,
    /// Binding it arrived on.
    pub binding: Option<SamlBinding>,
    /// Relay state it carried.
    pub relay_state: Option<String>,
    /// Whether the binding carried its own signature.
    pub has_binding_signature: bool,
}

impl InboundMessage {
    /// Wraps a message received over `binding`.
    #[must_use]
    pub const fn new(message: ProfileMessage, binding: SamlBinding) -> Self {
        Self {
            message,
            binding: Some(binding),
            relay_state: None,
            has_binding_signature: false,
        }
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }
}

/// Sends protocol messages.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    /// Encodes and sends `message`.
    ///
    /// ## Errors
    ///
    /// Returns an error if encoding or delivery fails.
    async fn dispatch(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Reads protocol messages.
#[async_trait]
pub trait InboundTransport: Send + Sync {
    /// Reads and decodes the message of the current request.
    ///
    /// ## Errors
    ///
    /// Returns an error if no message can be decoded.
    async fn receive(&self) -> Result<InboundMessage, TransportError>;
}

/// Queue-backed transport that records what is sent and replays what is
/// delivered to it.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    inbound: Mutex<VecDeque<InboundMessage>>,
    fail_dispatch: Mutex<Option<String>>,
}

impl InMemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message for the next [`receive`](InboundTransport::receive).
    pub fn deliver(&self, message: InboundMessage) {
        self.inbound.lock().push_back(message);
    }

    /// Returns everything dispatched so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Returns the last dispatched message.
    #[must_use]
    pub fn last_sent(&self) -> Option<OutboundMessage> {
        self.sent.lock().last().cloned()
    }

    /// Makes every following dispatch fail with `reason`.
    pub fn fail_dispatch_with(&self, reason: impl Into<String>) {
        *self.fail_dispatch.lock() = Some(reason.into());
    }
}

#[async_trait]
impl OutboundTransport for InMemoryTransport {
    async fn dispatch(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if let Some(reason) = self.fail_dispatch.lock().clone() {
            return Err(TransportError::Dispatch(reason));
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

#[async_trait]
impl InboundTransport for InMemoryTransport {
    async fn receive(&self) -> Result<InboundMessage, TransportError> {
        self.inbound.lock().pop_front().ok_or(TransportError::NoMessage)
    }
}

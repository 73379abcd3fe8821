//! Message transport port: asynchronous topic-based publish/subscribe with
//! per-message acknowledgment.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::shared_kernel::DomainError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
    #[error("Failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("Transport is closed")]
    Closed,
}

impl From<TransportError> for DomainError {
    fn from(err: TransportError) -> Self {
        DomainError::Infrastructure {
            message: err.to_string(),
        }
    }
}

/// Routing metadata carried alongside every message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Command/query/event type name
    pub type_name: String,
    /// Id of the command, query or event the payload describes
    pub entity_id: String,
    /// Correlation id for query replies; `None` for everything else
    pub response_id: Option<String>,
}

/// A serialized payload plus its routing metadata.
#[derive(Debug, Clone)]
pub struct Message {
    pub metadata: MessageMetadata,
    pub payload: Vec<u8>,
}

/// Per-delivery acknowledgment hooks provided by the transport.
pub trait Acknowledger: Send + Sync {
    fn ack(&self);
    fn nack(&self, reason: &str);
}

/// One received message. Consumers must `ack` on success or `nack` with a
/// reason on failure; the transport logs every nack.
pub struct Delivery {
    message: Message,
    acknowledger: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: Message, acknowledger: Arc<dyn Acknowledger>) -> Self {
        Self {
            message,
            acknowledger,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn ack(&self) {
        self.acknowledger.ack();
    }

    pub fn nack(&self, reason: &str) {
        self.acknowledger.nack(reason);
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Receiving end of a topic subscription.
pub struct Subscription {
    topic: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: mpsc::Receiver<Delivery>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next delivery, or `None` once the transport is dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// The pub/sub transport decoupling senders from handlers.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver `message` to every current subscriber of `topic`. Per-topic
    /// buffers are bounded; when a subscriber's buffer is full the call
    /// blocks until space frees — it never silently drops.
    async fn publish(&self, topic: &str, message: Message) -> Result<(), TransportError>;

    /// Register a new subscriber for `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;
}

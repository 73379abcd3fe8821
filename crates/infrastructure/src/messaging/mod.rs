//! In-memory message bus.
//!
//! Topic-based fan-out over bounded `mpsc` channels. Every subscriber of a
//! topic receives each published message. When a subscriber's buffer is
//! full, `publish` blocks the caller until space frees; messages are never
//! silently dropped. There is no redelivery: a nack is counted and logged,
//! and persistence (the event store) remains the source of truth.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::transport::{
    Acknowledger, Delivery, Message, MessageBus, Subscription, TransportError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct MessageBusConfig {
    /// Bounded buffer size for each subscriber channel
    pub topic_buffer: usize,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self { topic_buffer: 256 }
    }
}

#[derive(Debug, Default)]
struct AckCounters {
    acked: AtomicU64,
    nacked: AtomicU64,
}

struct CountingAcknowledger {
    topic: String,
    type_name: String,
    counters: Arc<AckCounters>,
}

impl Acknowledger for CountingAcknowledger {
    fn ack(&self) {
        self.counters.acked.fetch_add(1, Ordering::Relaxed);
    }

    fn nack(&self, reason: &str) {
        self.counters.nacked.fetch_add(1, Ordering::Relaxed);
        warn!(
            topic = %self.topic,
            type_name = %self.type_name,
            reason,
            "message negatively acknowledged"
        );
    }
}

pub struct InMemoryMessageBus {
    topics: Mutex<HashMap<String, Vec<mpsc::Sender<Delivery>>>>,
    counters: Arc<AckCounters>,
    config: MessageBusConfig,
}

impl InMemoryMessageBus {
    pub fn new(config: MessageBusConfig) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            counters: Arc::new(AckCounters::default()),
            config,
        }
    }

    pub fn acked_count(&self) -> u64 {
        self.counters.acked.load(Ordering::Relaxed)
    }

    pub fn nacked_count(&self) -> u64 {
        self.counters.nacked.load(Ordering::Relaxed)
    }

    fn prune_closed(&self, topic: &str) {
        let mut topics = self.topics.lock();
        if let Some(senders) = topics.get_mut(topic) {
            senders.retain(|sender| !sender.is_closed());
        }
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new(MessageBusConfig::default())
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), TransportError> {
        // Clone the sender list out so the lock is never held across a send
        let senders: Vec<mpsc::Sender<Delivery>> = {
            let topics = self.topics.lock();
            topics.get(topic).cloned().unwrap_or_default()
        };

        if senders.is_empty() {
            debug!(topic, type_name = %message.metadata.type_name, "publish with no subscribers");
            return Ok(());
        }

        let mut saw_closed = false;
        for sender in senders {
            let delivery = Delivery::new(
                message.clone(),
                Arc::new(CountingAcknowledger {
                    topic: topic.to_string(),
                    type_name: message.metadata.type_name.clone(),
                    counters: Arc::clone(&self.counters),
                }),
            );
            // Blocks when the subscriber's buffer is full
            if sender.send(delivery).await.is_err() {
                saw_closed = true;
            }
        }
        if saw_closed {
            self.prune_closed(topic);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::channel(self.config.topic_buffer);
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}

//! In-memory event store.
//!
//! Append-only per-aggregate logs guarded by one `RwLock`; the optimistic
//! concurrency check and the append happen under the same write lock, so
//! two racing saves with the same stale expected version resolve to exactly
//! one winner. After a successful append each event is broadcast
//! best-effort on `events.<event-type>` for downstream projections; the
//! stored log, not the broadcast, is the source of truth.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::event_store::{EventStore, EventStoreStats};
use hearth_domain::events::Event;
use hearth_domain::shared_kernel::{DomainError, Result};
use hearth_domain::transport::{Message, MessageBus, MessageMetadata};
use hearth_shared::topics;
use parking_lot::RwLock;
use tracing::warn;

#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Vec<Event>>>,
    transport: Option<Arc<dyn MessageBus>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that broadcasts appended events on the given transport.
    pub fn with_transport(transport: Arc<dyn MessageBus>) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            transport: Some(transport),
        }
    }

    async fn broadcast(&self, events: &[Event]) {
        let Some(transport) = &self.transport else {
            return;
        };
        for event in events {
            let payload = match serde_json::to_vec(event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        event_type = %event.event_type,
                        %err,
                        "failed to serialize event for broadcast"
                    );
                    continue;
                }
            };
            let message = Message {
                metadata: MessageMetadata {
                    type_name: event.event_type.clone(),
                    entity_id: event.id.to_string(),
                    response_id: None,
                },
                payload,
            };
            if let Err(err) = transport
                .publish(&topics::event_topic(&event.event_type), message)
                .await
            {
                warn!(
                    event_type = %event.event_type,
                    %err,
                    "event broadcast failed; stored log remains authoritative"
                );
            }
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save(
        &self,
        aggregate_id: &str,
        events: &[Event],
        expected_version: u64,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        {
            let mut streams = self.streams.write();
            let current_version = streams
                .get(aggregate_id)
                .and_then(|stream| stream.last())
                .map(|event| event.version)
                .unwrap_or(0);
            if expected_version != 0 && expected_version != current_version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.to_string(),
                    expected: expected_version,
                    actual: current_version,
                });
            }
            streams
                .entry(aggregate_id.to_string())
                .or_default()
                .extend_from_slice(events);
        }
        self.broadcast(events).await;
        Ok(())
    }

    async fn events(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        Ok(self
            .streams
            .read()
            .get(aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn events_from_version(
        &self,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<Event>> {
        Ok(self
            .streams
            .read()
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|event| event.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_events(&self) -> Result<Vec<Event>> {
        Ok(self
            .streams
            .read()
            .values()
            .flat_map(|stream| stream.iter().cloned())
            .collect())
    }

    async fn stats(&self) -> Result<EventStoreStats> {
        let streams = self.streams.read();
        let aggregate_count = streams.values().filter(|s| !s.is_empty()).count();
        let event_count: usize = streams.values().map(Vec::len).sum();
        let mut event_count_by_type: HashMap<String, usize> = HashMap::new();
        for event in streams.values().flatten() {
            *event_count_by_type
                .entry(event.event_type.clone())
                .or_default() += 1;
        }
        let average_events_per_aggregate = if aggregate_count == 0 {
            0.0
        } else {
            event_count as f64 / aggregate_count as f64
        };
        Ok(EventStoreStats {
            aggregate_count,
            event_count,
            event_count_by_type,
            average_events_per_aggregate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryMessageBus;
    use hearth_domain::events::event_types;
    use serde_json::json;

    fn event(aggregate_id: &str, event_type: &str, version: u64) -> Event {
        Event::new(aggregate_id, event_type, version, json!({}))
    }

    #[tokio::test]
    async fn unknown_aggregate_yields_empty_history() {
        let store = InMemoryEventStore::new();
        assert!(store.events("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_appends_and_reads_back_in_order() {
        let store = InMemoryEventStore::new();
        store
            .save(
                "cfg-1",
                &[
                    event("cfg-1", event_types::CONFIGURATION_CREATED, 1),
                    event("cfg-1", event_types::SETTING_CHANGED, 2),
                ],
                0,
            )
            .await
            .unwrap();

        let history = store.events("cfg-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts_and_persists_nothing() {
        let store = InMemoryEventStore::new();
        store
            .save(
                "cfg-1",
                &[
                    event("cfg-1", event_types::CONFIGURATION_CREATED, 1),
                    event("cfg-1", event_types::SETTING_CHANGED, 2),
                ],
                0,
            )
            .await
            .unwrap();

        let result = store
            .save(
                "cfg-1",
                &[
                    event("cfg-1", event_types::SETTING_CHANGED, 2),
                    event("cfg-1", event_types::SETTING_CHANGED, 3),
                ],
                1,
            )
            .await;
        assert_eq!(
            result,
            Err(DomainError::ConcurrencyConflict {
                aggregate_id: "cfg-1".to_string(),
                expected: 1,
                actual: 2,
            })
        );
        // all-or-nothing: the losing batch left no trace
        assert_eq!(store.events("cfg-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_stale_saves_have_exactly_one_winner() {
        let store = Arc::new(InMemoryEventStore::new());
        store
            .save(
                "cfg-1",
                &[event("cfg-1", event_types::CONFIGURATION_CREATED, 1)],
                0,
            )
            .await
            .unwrap();

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .save("cfg-1", &[event("cfg-1", event_types::SETTING_CHANGED, 2)], 1)
                    .await
            })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .save("cfg-1", &[event("cfg-1", event_types::THEME_CHANGED, 2)], 1)
                    .await
            })
        };

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let winners = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, Err(DomainError::ConcurrencyConflict { .. }))));
        assert_eq!(store.events("cfg-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn events_from_version_returns_the_suffix() {
        let store = InMemoryEventStore::new();
        store
            .save(
                "cfg-1",
                &[
                    event("cfg-1", event_types::CONFIGURATION_CREATED, 1),
                    event("cfg-1", event_types::SETTING_CHANGED, 2),
                    event("cfg-1", event_types::SETTING_CHANGED, 3),
                ],
                0,
            )
            .await
            .unwrap();

        let suffix = store.events_from_version("cfg-1", 2).await.unwrap();
        assert_eq!(suffix.len(), 2);
        assert_eq!(suffix[0].version, 2);
    }

    #[tokio::test]
    async fn stats_cover_all_aggregates() {
        let store = InMemoryEventStore::new();
        store
            .save(
                "cfg-1",
                &[
                    event("cfg-1", event_types::CONFIGURATION_CREATED, 1),
                    event("cfg-1", event_types::SETTING_CHANGED, 2),
                ],
                0,
            )
            .await
            .unwrap();
        store
            .save(
                "cfg-2",
                &[event("cfg-2", event_types::CONFIGURATION_CREATED, 1)],
                0,
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.aggregate_count, 2);
        assert_eq!(stats.event_count, 3);
        assert_eq!(
            stats.event_count_by_type[event_types::CONFIGURATION_CREATED],
            2
        );
        assert!((stats.average_events_per_aggregate - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn appended_events_are_broadcast_by_type() {
        let bus = Arc::new(InMemoryMessageBus::default());
        let mut subscription = bus
            .subscribe(&topics::event_topic(event_types::SETTING_CHANGED))
            .await
            .unwrap();
        let store = InMemoryEventStore::with_transport(bus);

        store
            .save(
                "cfg-1",
                &[event("cfg-1", event_types::SETTING_CHANGED, 1)],
                0,
            )
            .await
            .unwrap();

        let delivery = subscription.recv().await.unwrap();
        assert_eq!(
            delivery.message().metadata.type_name,
            event_types::SETTING_CHANGED
        );
        let broadcast: Event = serde_json::from_slice(&delivery.message().payload).unwrap();
        assert_eq!(broadcast.aggregate_id, "cfg-1");
    }
}

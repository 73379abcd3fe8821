//! Event store port: append-only per-aggregate event log with optimistic
//! concurrency control.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::events::Event;
use crate::shared_kernel::Result;

/// Read-only diagnostic view over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventStoreStats {
    pub aggregate_count: usize,
    pub event_count: usize,
    pub event_count_by_type: HashMap<String, usize>,
    pub average_events_per_aggregate: f64,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` to the aggregate's history.
    ///
    /// The current version is the version of the last stored event (0 when
    /// the aggregate is unknown). A non-zero `expected_version` that does
    /// not match the current version fails with a concurrency conflict and
    /// persists nothing; the batch is all-or-nothing. An `expected_version`
    /// of 0 means "no aggregate exists yet, don't check" and is used only
    /// for first-time creation.
    async fn save(&self, aggregate_id: &str, events: &[Event], expected_version: u64)
        -> Result<()>;

    /// Full history, oldest first. Unknown aggregates yield an empty vec,
    /// not an error.
    async fn events(&self, aggregate_id: &str) -> Result<Vec<Event>>;

    /// Suffix of the history with `version >= from_version`.
    async fn events_from_version(&self, aggregate_id: &str, from_version: u64)
        -> Result<Vec<Event>>;

    /// Every event across all aggregates. Ordering across aggregates is
    /// unspecified but stable within one aggregate.
    async fn all_events(&self) -> Result<Vec<Event>>;

    async fn stats(&self) -> Result<EventStoreStats>;
}

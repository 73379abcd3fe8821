//! Repository port bridging the aggregate and the event store.

use async_trait::async_trait;
use hearth_shared::ConfigurationId;

use crate::configuration::Configuration;
use crate::shared_kernel::Result;

/// The only component permitted to call the event store's `save` and read
/// operations on behalf of aggregates.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Persist the aggregate's uncommitted events. A clean aggregate is a
    /// no-op success; on success the uncommitted buffer is cleared.
    async fn save(&self, configuration: &mut Configuration) -> Result<()>;

    /// Reconstruct an aggregate by replaying its full history. An empty
    /// history is `AggregateNotFound`, never an empty aggregate.
    async fn get_by_id(&self, id: &ConfigurationId) -> Result<Configuration>;

    /// Linear scan over all events grouped by aggregate, returning the
    /// first reconstructed aggregate on the given profile. Callers must not
    /// assume an index exists.
    async fn get_by_profile(&self, profile: &str) -> Result<Configuration>;

    /// Replay every aggregate in the store.
    async fn get_all(&self) -> Result<Vec<Configuration>>;

    /// Always fails with `DeletionNotSupported`: event-sourced aggregates
    /// are not deleted by removing history.
    async fn delete(&self, id: &ConfigurationId) -> Result<()>;
}

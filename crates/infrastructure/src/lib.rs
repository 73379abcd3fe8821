//! Infrastructure layer for the Hearth configuration platform.
//!
//! In-memory adapters for the domain ports: the topic-based message bus,
//! the append-only event store, and the event-sourced repository, plus the
//! tracing bootstrap.

pub mod messaging;
pub mod observability;
pub mod persistence;

pub use messaging::{InMemoryMessageBus, MessageBusConfig};
pub use persistence::event_store::InMemoryEventStore;
pub use persistence::repository::EventSourcedConfigurationRepository;

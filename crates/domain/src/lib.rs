//! Domain layer for the Hearth configuration platform.
//!
//! Pure event-sourced model: the `Configuration` aggregate, its closed set
//! of domain events, the command/query contracts, and the ports implemented
//! by the infrastructure layer (event store, repository, message transport).

pub mod command;
pub mod configuration;
pub mod event_store;
pub mod events;
pub mod query;
pub mod repository;
pub mod shared_kernel;
pub mod transport;

pub use command::{Command, CommandHandler, CommandResult};
pub use configuration::{Configuration, ConfigurationView};
pub use event_store::{EventStore, EventStoreStats};
pub use events::{ConfigurationEvent, Event};
pub use query::{Query, QueryHandler, QueryResult};
pub use repository::ConfigurationRepository;
pub use shared_kernel::{DomainError, Result};
pub use transport::{Delivery, Message, MessageBus, MessageMetadata, Subscription, TransportError};

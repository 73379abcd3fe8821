//! Application layer for the Hearth configuration platform.
//!
//! Hosts the CQRS buses — pure routing over the message transport — and the
//! configuration command/query handlers that wire the repository in.

pub mod configuration;
pub mod core;

pub use self::core::command::CommandBus;
pub use self::core::query::{QueryBus, QueryBusConfig};

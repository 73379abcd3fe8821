//! Shared kernel for the Hearth configuration platform.
//!
//! Holds the typed identifiers, topic naming scheme and runtime
//! configuration loader used by every other crate in the workspace.

pub mod config;
pub mod ids;
pub mod topics;

pub use config::{ConfigError, ConfigLoader, RuntimeConfig};
pub use ids::{CommandId, ConfigurationId, EventId, QueryId};

//! Centralized topic naming for the message transport.
//!
//! A single source of truth for topic names, preventing mismatches
//! between publishers and consumers.
//!
//! ## Naming convention
//! - `commands.{command-type}` — one topic per command type
//! - `queries.{query-type}` — one topic per query type
//! - `query-responses` — shared topic for all correlated query replies
//! - `events.{event-type}` — broadcast topics fed by the event store

/// Prefix for command topics
pub const COMMAND_PREFIX: &str = "commands";

/// Prefix for query topics
pub const QUERY_PREFIX: &str = "queries";

/// Shared topic carrying every correlated query response
pub const QUERY_RESPONSES: &str = "query-responses";

/// Prefix for event broadcast topics
pub const EVENT_PREFIX: &str = "events";

/// Topic for a command type, e.g. `commands.set_setting`
pub fn command_topic(command_type: &str) -> String {
    format!("{COMMAND_PREFIX}.{command_type}")
}

/// Topic for a query type, e.g. `queries.get_configuration`
pub fn query_topic(query_type: &str) -> String {
    format!("{QUERY_PREFIX}.{query_type}")
}

/// Broadcast topic for an event type, e.g. `events.setting_changed`
pub fn event_topic(event_type: &str) -> String {
    format!("{EVENT_PREFIX}.{event_type}")
}

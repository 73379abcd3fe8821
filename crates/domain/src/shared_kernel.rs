//! Error taxonomy shared across the domain.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(
        "Concurrency conflict on {aggregate_id}: expected version {expected}, actual {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Configuration not found: {id}")]
    AggregateNotFound { id: String },

    #[error("No configuration found for profile: {profile}")]
    ProfileNotFound { profile: String },

    #[error("Event replay gap for {aggregate_id}: expected version {expected}, got {actual}")]
    EventVersionGap {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("No handler registered for command type: {name}")]
    UnknownCommandType { name: String },

    #[error("No handler registered for query type: {name}")]
    UnknownQueryType { name: String },

    #[error("Handler already registered for type: {name}")]
    HandlerAlreadyRegistered { name: String },

    #[error("Serialization failure for {type_name}: {reason}")]
    Serialization { type_name: String, reason: String },

    #[error("Query {query_type} timed out")]
    QueryTimeout { query_type: String },

    #[error("Query {query_type} was cancelled")]
    QueryCancelled { query_type: String },

    #[error("Deleting configurations is not supported; record a tombstone event instead")]
    DeletionNotSupported,

    #[error("Infrastructure error: {message}")]
    Infrastructure { message: String },
}

/// Fail-fast check used by command and query `validate` implementations.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

//! Query contracts and the concrete query set.
//!
//! Unlike commands, queries require a reply: handlers produce a
//! `QueryResult` that travels back to the blocked caller through the
//! correlation channel on the shared response topic.

use async_trait::async_trait;
use hearth_shared::{ConfigurationId, QueryId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::shared_kernel::{require_non_empty, Result};

/// Contract every query exposes to the bus.
pub trait Query: Debug + Send + Sync + Serialize + 'static {
    /// Wire-level type name; also the query topic suffix.
    const NAME: &'static str;

    fn id(&self) -> QueryId;

    /// Fail-fast validation, run before publish.
    fn validate(&self) -> Result<()>;
}

/// Handler invoked by the query bus processing loop. The returned value is
/// the serialized projection delivered to the caller.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> Result<Value>;
}

/// Outcome of one query, correlated back to its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub query_id: String,
    pub query_type: String,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(query_id: String, query_type: &str, data: Value) -> Self {
        Self {
            success: true,
            query_id,
            query_type: query_type.to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(query_id: String, query_type: &str, error: String) -> Self {
        Self {
            success: false,
            query_id,
            query_type: query_type.to_string(),
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfiguration {
    pub id: QueryId,
    pub configuration_id: ConfigurationId,
}

impl GetConfiguration {
    pub fn new(configuration_id: ConfigurationId) -> Self {
        Self {
            id: QueryId::new(),
            configuration_id,
        }
    }
}

impl Query for GetConfiguration {
    const NAME: &'static str = "get_configuration";

    fn id(&self) -> QueryId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfigurationByProfile {
    pub id: QueryId,
    pub profile: String,
}

impl GetConfigurationByProfile {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            id: QueryId::new(),
            profile: profile.into(),
        }
    }
}

impl Query for GetConfigurationByProfile {
    const NAME: &'static str = "get_configuration_by_profile";

    fn id(&self) -> QueryId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("profile", &self.profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfigurations {
    pub id: QueryId,
}

impl ListConfigurations {
    pub fn new() -> Self {
        Self { id: QueryId::new() }
    }
}

impl Default for ListConfigurations {
    fn default() -> Self {
        Self::new()
    }
}

impl Query for ListConfigurations {
    const NAME: &'static str = "list_configurations";

    fn id(&self) -> QueryId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetEventStoreStats {
    pub id: QueryId,
}

impl GetEventStoreStats {
    pub fn new() -> Self {
        Self { id: QueryId::new() }
    }
}

impl Default for GetEventStoreStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Query for GetEventStoreStats {
    const NAME: &'static str = "get_event_store_stats";

    fn id(&self) -> QueryId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_kernel::DomainError;

    #[test]
    fn by_profile_query_requires_a_profile() {
        assert!(matches!(
            GetConfigurationByProfile::new("").validate(),
            Err(DomainError::Validation { .. })
        ));
        assert!(GetConfigurationByProfile::new("work").validate().is_ok());
    }

    #[test]
    fn query_result_round_trips() {
        let result = QueryResult::ok(
            QueryId::new().to_string(),
            GetConfiguration::NAME,
            serde_json::json!({"profile": "work"}),
        );
        let bytes = serde_json::to_vec(&result).unwrap();
        let decoded: QueryResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, result);
    }
}

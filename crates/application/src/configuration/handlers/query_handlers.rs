//! Query handlers producing read-side projections.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::configuration::ConfigurationView;
use hearth_domain::event_store::EventStore;
use hearth_domain::query::{
    GetConfiguration, GetConfigurationByProfile, GetEventStoreStats, ListConfigurations, Query,
    QueryHandler,
};
use hearth_domain::repository::ConfigurationRepository;
use hearth_domain::shared_kernel::{DomainError, Result};
use serde_json::Value;

fn to_projection<T: serde::Serialize>(type_name: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| DomainError::Serialization {
        type_name: type_name.to_string(),
        reason: e.to_string(),
    })
}

pub struct GetConfigurationHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl GetConfigurationHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<GetConfiguration> for GetConfigurationHandler {
    async fn handle(&self, query: GetConfiguration) -> Result<Value> {
        let configuration = self.repository.get_by_id(&query.configuration_id).await?;
        to_projection(
            GetConfiguration::NAME,
            &ConfigurationView::from(&configuration),
        )
    }
}

pub struct GetConfigurationByProfileHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl GetConfigurationByProfileHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<GetConfigurationByProfile> for GetConfigurationByProfileHandler {
    async fn handle(&self, query: GetConfigurationByProfile) -> Result<Value> {
        let configuration = self.repository.get_by_profile(&query.profile).await?;
        to_projection(
            GetConfigurationByProfile::NAME,
            &ConfigurationView::from(&configuration),
        )
    }
}

pub struct ListConfigurationsHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl ListConfigurationsHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl QueryHandler<ListConfigurations> for ListConfigurationsHandler {
    async fn handle(&self, _query: ListConfigurations) -> Result<Value> {
        let views: Vec<ConfigurationView> = self
            .repository
            .get_all()
            .await?
            .iter()
            .map(ConfigurationView::from)
            .collect();
        to_projection(ListConfigurations::NAME, &views)
    }
}

pub struct GetEventStoreStatsHandler {
    store: Arc<dyn EventStore>,
}

impl GetEventStoreStatsHandler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryHandler<GetEventStoreStats> for GetEventStoreStatsHandler {
    async fn handle(&self, _query: GetEventStoreStats) -> Result<Value> {
        let stats = self.store.stats().await?;
        to_projection(GetEventStoreStats::NAME, &stats)
    }
}

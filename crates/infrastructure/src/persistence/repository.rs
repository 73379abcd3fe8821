//! Event-sourced repository: loads aggregates by replay, saves uncommitted
//! events under the optimistic-concurrency check.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::configuration::Configuration;
use hearth_domain::event_store::EventStore;
use hearth_domain::events::Event;
use hearth_domain::repository::ConfigurationRepository;
use hearth_domain::shared_kernel::{DomainError, Result};
use hearth_shared::ConfigurationId;

pub struct EventSourcedConfigurationRepository {
    store: Arc<dyn EventStore>,
}

impl EventSourcedConfigurationRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    async fn grouped_histories(&self) -> Result<BTreeMap<String, Vec<Event>>> {
        let mut grouped: BTreeMap<String, Vec<Event>> = BTreeMap::new();
        for event in self.store.all_events().await? {
            grouped
                .entry(event.aggregate_id.clone())
                .or_default()
                .push(event);
        }
        for history in grouped.values_mut() {
            history.sort_by_key(|event| event.version);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl ConfigurationRepository for EventSourcedConfigurationRepository {
    async fn save(&self, configuration: &mut Configuration) -> Result<()> {
        let uncommitted = configuration.uncommitted_events().to_vec();
        if uncommitted.is_empty() {
            return Ok(());
        }
        let expected_version = configuration.version() - uncommitted.len() as u64;
        self.store
            .save(
                &configuration.id().to_string(),
                &uncommitted,
                expected_version,
            )
            .await?;
        configuration.mark_events_as_committed();
        Ok(())
    }

    async fn get_by_id(&self, id: &ConfigurationId) -> Result<Configuration> {
        let history = self.store.events(&id.to_string()).await?;
        if history.is_empty() {
            return Err(DomainError::AggregateNotFound { id: id.to_string() });
        }
        Configuration::from_history(&history)
    }

    async fn get_by_profile(&self, profile: &str) -> Result<Configuration> {
        // Full scan; acceptable while the store is in-memory and bounded
        for history in self.grouped_histories().await?.values() {
            let configuration = Configuration::from_history(history)?;
            if configuration.profile() == profile {
                return Ok(configuration);
            }
        }
        Err(DomainError::ProfileNotFound {
            profile: profile.to_string(),
        })
    }

    async fn get_all(&self) -> Result<Vec<Configuration>> {
        self.grouped_histories()
            .await?
            .values()
            .map(|history| Configuration::from_history(history))
            .collect()
    }

    async fn delete(&self, _id: &ConfigurationId) -> Result<()> {
        Err(DomainError::DeletionNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::event_store::InMemoryEventStore;

    fn repository() -> EventSourcedConfigurationRepository {
        EventSourcedConfigurationRepository::new(Arc::new(InMemoryEventStore::new()))
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let repository = repository();
        let mut configuration = Configuration::create("work", "dark").unwrap();
        configuration.set_setting("font", "mono").unwrap();
        repository.save(&mut configuration).await.unwrap();
        assert!(configuration.uncommitted_events().is_empty());

        let loaded = repository.get_by_id(&configuration.id()).await.unwrap();
        assert_eq!(loaded, configuration);
    }

    #[tokio::test]
    async fn saving_a_clean_aggregate_is_a_no_op() {
        let repository = repository();
        let mut configuration = Configuration::create("work", "dark").unwrap();
        repository.save(&mut configuration).await.unwrap();
        // Second save has nothing to persist
        repository.save(&mut configuration).await.unwrap();
        let loaded = repository.get_by_id(&configuration.id()).await.unwrap();
        assert_eq!(loaded.version(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let repository = repository();
        assert!(matches!(
            repository.get_by_id(&ConfigurationId::new()).await,
            Err(DomainError::AggregateNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stale_copy_save_conflicts() {
        let repository = repository();
        let mut configuration = Configuration::create("work", "dark").unwrap();
        repository.save(&mut configuration).await.unwrap();

        let mut first = repository.get_by_id(&configuration.id()).await.unwrap();
        let mut second = first.clone();

        first.set_setting("font", "mono").unwrap();
        repository.save(&mut first).await.unwrap();

        second.set_setting("font", "serif").unwrap();
        assert!(matches!(
            repository.save(&mut second).await,
            Err(DomainError::ConcurrencyConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
        // The loser keeps its uncommitted events for a reload-and-retry
        assert_eq!(second.uncommitted_events().len(), 1);
    }

    #[tokio::test]
    async fn get_by_profile_scans_all_aggregates() {
        let repository = repository();
        let mut work = Configuration::create("work", "dark").unwrap();
        let mut home = Configuration::create("home", "light").unwrap();
        repository.save(&mut work).await.unwrap();
        repository.save(&mut home).await.unwrap();

        let found = repository.get_by_profile("home").await.unwrap();
        assert_eq!(found.id(), home.id());

        assert!(matches!(
            repository.get_by_profile("gaming").await,
            Err(DomainError::ProfileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn get_all_replays_every_aggregate() {
        let repository = repository();
        let mut work = Configuration::create("work", "dark").unwrap();
        let mut home = Configuration::create("home", "light").unwrap();
        repository.save(&mut work).await.unwrap();
        repository.save(&mut home).await.unwrap();

        let all = repository.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_not_supported() {
        let repository = repository();
        assert_eq!(
            repository.delete(&ConfigurationId::new()).await,
            Err(DomainError::DeletionNotSupported)
        );
    }
}

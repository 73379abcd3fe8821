//! End-to-end tests for the CQRS runtime: command dispatch through the
//! transport into the event store, correlated query responses, cancellation
//! and duplicate-handler rules.

use std::sync::Arc;
use std::time::Duration;

use hearth_application::configuration::handlers::{
    CreateConfigurationHandler, GetConfigurationByProfileHandler, GetConfigurationHandler,
    GetEventStoreStatsHandler, ListConfigurationsHandler, RemoveSettingHandler, SetSettingHandler,
    SetThemeHandler, SwitchProfileHandler,
};
use hearth_application::{CommandBus, QueryBus, QueryBusConfig};
use hearth_domain::command::{CreateConfiguration, RemoveSetting, SetSetting, SetTheme, SwitchProfile};
use hearth_domain::configuration::{Configuration, ConfigurationView};
use hearth_domain::event_store::EventStore;
use hearth_domain::query::{
    GetConfiguration, GetConfigurationByProfile, GetEventStoreStats, ListConfigurations,
};
use hearth_domain::repository::ConfigurationRepository;
use hearth_domain::shared_kernel::DomainError;
use hearth_infrastructure::{
    observability, EventSourcedConfigurationRepository, InMemoryEventStore, InMemoryMessageBus,
    MessageBusConfig,
};
use hearth_shared::RuntimeConfig;
use tokio_util::sync::CancellationToken;

struct Runtime {
    store: Arc<InMemoryEventStore>,
    repository: Arc<EventSourcedConfigurationRepository>,
    command_bus: CommandBus,
    query_bus: QueryBus,
}

async fn runtime() -> Runtime {
    let config = RuntimeConfig::default();
    observability::init_tracing(&config.log_filter);
    let transport = Arc::new(InMemoryMessageBus::new(MessageBusConfig {
        topic_buffer: config.topic_buffer,
    }));
    let store = Arc::new(InMemoryEventStore::with_transport(transport.clone()));
    let repository = Arc::new(EventSourcedConfigurationRepository::new(store.clone()));

    let command_bus = CommandBus::new(transport.clone());
    command_bus
        .register_handler(CreateConfigurationHandler::new(repository.clone()))
        .await
        .unwrap();
    command_bus
        .register_handler(SetSettingHandler::new(repository.clone()))
        .await
        .unwrap();
    command_bus
        .register_handler(RemoveSettingHandler::new(repository.clone()))
        .await
        .unwrap();
    command_bus
        .register_handler(SwitchProfileHandler::new(repository.clone()))
        .await
        .unwrap();
    command_bus
        .register_handler(SetThemeHandler::new(repository.clone()))
        .await
        .unwrap();

    let query_bus = QueryBus::new(
        transport,
        QueryBusConfig {
            default_timeout: Duration::from_millis(config.default_query_timeout_ms),
        },
    )
    .await
    .unwrap();
    query_bus
        .register_handler(GetConfigurationHandler::new(repository.clone()))
        .await
        .unwrap();
    query_bus
        .register_handler(GetConfigurationByProfileHandler::new(repository.clone()))
        .await
        .unwrap();
    query_bus
        .register_handler(ListConfigurationsHandler::new(repository.clone()))
        .await
        .unwrap();
    query_bus
        .register_handler(GetEventStoreStatsHandler::new(store.clone()))
        .await
        .unwrap();

    Runtime {
        store,
        repository,
        command_bus,
        query_bus,
    }
}

/// Poll the read side until the aggregate appears or the deadline passes.
/// Commands are fire-and-forget, so tests wait on the projection.
async fn wait_for_profile(runtime: &Runtime, profile: &str) -> ConfigurationView {
    for _ in 0..100 {
        let result = runtime
            .query_bus
            .send_with_default_timeout(&GetConfigurationByProfile::new(profile))
            .await
            .unwrap();
        if result.success {
            return serde_json::from_value(result.data.unwrap()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("configuration for profile {profile} never appeared");
}

/// Wait until the aggregate reaches at least the given version.
async fn wait_for_version(
    runtime: &Runtime,
    id: hearth_shared::ConfigurationId,
    version: u64,
) -> ConfigurationView {
    for _ in 0..100 {
        let result = runtime
            .query_bus
            .send_with_default_timeout(&GetConfiguration::new(id))
            .await
            .unwrap();
        if result.success {
            let view: ConfigurationView = serde_json::from_value(result.data.unwrap()).unwrap();
            if view.version >= version {
                return view;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("configuration {id} never reached version {version}");
}

#[tokio::test]
async fn command_flows_into_store_and_projection() {
    let runtime = runtime().await;

    runtime
        .command_bus
        .send(&CreateConfiguration::new("work", "dark"))
        .await
        .unwrap();
    let created = wait_for_profile(&runtime, "work").await;
    assert_eq!(created.version, 1);
    assert_eq!(created.theme, "dark");

    let id = hearth_shared::ConfigurationId::from_string(&created.id).unwrap();
    runtime
        .command_bus
        .send(&SetSetting::new(id, "font", "mono"))
        .await
        .unwrap();

    let view = wait_for_version(&runtime, id, 2).await;
    assert_eq!(view.settings.get("font").map(String::as_str), Some("mono"));

    let stats = runtime.store.stats().await.unwrap();
    assert_eq!(stats.event_count, 2);
}

#[tokio::test]
async fn full_command_set_round_trips() {
    let runtime = runtime().await;
    runtime
        .command_bus
        .send(&CreateConfiguration::new("work", "dark"))
        .await
        .unwrap();
    let created = wait_for_profile(&runtime, "work").await;
    let id = hearth_shared::ConfigurationId::from_string(&created.id).unwrap();

    // Each type runs on its own processing loop, so wait for the previous
    // write to land before issuing the next to avoid stale-version races
    runtime
        .command_bus
        .send(&SetSetting::new(id, "font", "mono"))
        .await
        .unwrap();
    wait_for_version(&runtime, id, 2).await;

    runtime
        .command_bus
        .send(&SetTheme::new(id, "light"))
        .await
        .unwrap();
    wait_for_version(&runtime, id, 3).await;

    runtime
        .command_bus
        .send(&SwitchProfile::new(id, "home"))
        .await
        .unwrap();
    let view = wait_for_version(&runtime, id, 4).await;
    assert_eq!(view.profile, "home");
    assert_eq!(view.theme, "light");

    runtime
        .command_bus
        .send(&RemoveSetting::new(id, "font"))
        .await
        .unwrap();
    let view = wait_for_version(&runtime, id, 5).await;
    assert!(view.settings.is_empty());
}

#[tokio::test]
async fn validation_fails_before_the_transport() {
    let runtime = runtime().await;
    let result = runtime
        .command_bus
        .send(&CreateConfiguration::new("", "dark"))
        .await;
    assert!(matches!(result, Err(DomainError::Validation { .. })));
    assert_eq!(runtime.store.stats().await.unwrap().event_count, 0);
}

#[tokio::test]
async fn unregistered_types_are_rejected() {
    let transport = Arc::new(InMemoryMessageBus::default());
    let command_bus = CommandBus::new(transport.clone());
    let query_bus = QueryBus::new(transport, QueryBusConfig::default())
        .await
        .unwrap();

    assert!(matches!(
        command_bus.send(&CreateConfiguration::new("work", "dark")).await,
        Err(DomainError::UnknownCommandType { .. })
    ));
    let cancel = CancellationToken::new();
    assert!(matches!(
        query_bus.send(&ListConfigurations::new(), &cancel).await,
        Err(DomainError::UnknownQueryType { .. })
    ));
}

#[tokio::test]
async fn duplicate_handler_registration_fails() {
    let runtime = runtime().await;
    let err = runtime
        .command_bus
        .register_handler(CreateConfigurationHandler::new(runtime.repository.clone()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::HandlerAlreadyRegistered {
            name: "create_configuration".to_string(),
        }
    );

    let err = runtime
        .query_bus
        .register_handler(GetConfigurationHandler::new(runtime.repository.clone()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::HandlerAlreadyRegistered {
            name: "get_configuration".to_string(),
        }
    );
}

#[tokio::test]
async fn query_receives_the_handlers_exact_projection() {
    let runtime = runtime().await;
    let mut configuration = Configuration::create("work", "dark").unwrap();
    configuration.set_setting("font", "mono").unwrap();
    runtime.repository.save(&mut configuration).await.unwrap();

    let query = GetConfiguration::new(configuration.id());
    let query_id = query.id.to_string();
    let result = runtime
        .query_bus
        .send_with_default_timeout(&query)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.query_id, query_id);
    assert_eq!(result.query_type, "get_configuration");
    let view: ConfigurationView = serde_json::from_value(result.data.unwrap()).unwrap();
    assert_eq!(view, ConfigurationView::from(&configuration));
}

#[tokio::test]
async fn query_handler_errors_are_surfaced_to_the_caller() {
    let runtime = runtime().await;
    let result = runtime
        .query_bus
        .send_with_default_timeout(&GetConfiguration::new(hearth_shared::ConfigurationId::new()))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn cancelled_query_returns_promptly_and_leaks_no_entry() {
    let runtime = runtime().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let started = std::time::Instant::now();
    let result = runtime
        .query_bus
        .send(&ListConfigurations::new(), &cancel)
        .await;
    assert!(matches!(result, Err(DomainError::QueryCancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(runtime.query_bus.pending_responses(), 0);
}

#[tokio::test]
async fn concurrent_stale_saves_resolve_to_one_winner() {
    let runtime = runtime().await;
    let mut configuration = Configuration::create("work", "dark").unwrap();
    runtime.repository.save(&mut configuration).await.unwrap();

    // Two in-memory copies, both loaded at version 1
    let mut first = runtime.repository.get_by_id(&configuration.id()).await.unwrap();
    let mut second = first.clone();
    first.set_setting("font", "mono").unwrap();
    second.set_setting("font", "serif").unwrap();

    let repository = runtime.repository.clone();
    let first_save = {
        let repository = repository.clone();
        tokio::spawn(async move { repository.save(&mut first).await.map(|_| first.version()) })
    };
    let second_save =
        tokio::spawn(async move { repository.save(&mut second).await.map(|_| second.version()) });

    let outcomes = [first_save.await.unwrap(), second_save.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|o| matches!(
        o,
        Err(DomainError::ConcurrencyConflict {
            expected: 1,
            actual: 2,
            ..
        })
    )));

    let stored = runtime
        .store
        .events(&configuration.id().to_string())
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn stats_query_reflects_the_store() {
    let runtime = runtime().await;
    let mut configuration = Configuration::create("work", "dark").unwrap();
    configuration.set_setting("font", "mono").unwrap();
    runtime.repository.save(&mut configuration).await.unwrap();

    let result = runtime
        .query_bus
        .send_with_default_timeout(&GetEventStoreStats::new())
        .await
        .unwrap();
    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["aggregate_count"], 1);
    assert_eq!(data["event_count"], 2);
}

#[tokio::test]
async fn closed_bus_stops_processing() {
    let runtime = runtime().await;
    runtime.query_bus.close();
    // A query sent after close can only end in timeout; the loops are gone
    let result = runtime
        .query_bus
        .send_with_timeout(&ListConfigurations::new(), Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(DomainError::QueryTimeout { .. })));
    assert_eq!(runtime.query_bus.pending_responses(), 0);
}

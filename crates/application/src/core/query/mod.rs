//! Query bus: synchronous-over-asynchronous dispatch with correlation.
//!
//! A query is published to its type's topic carrying a fresh `response_id`;
//! the caller blocks on a single-slot channel registered under that id. The
//! handler side publishes a `QueryResult` on the shared `query-responses`
//! topic, and a dispatch loop routes it back to the waiting caller. The
//! pending-response table entry is removed on every return path, so a late
//! response after timeout or cancellation is dropped (and nacked) rather
//! than leaked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hearth_domain::query::{Query, QueryHandler, QueryResult};
use hearth_domain::shared_kernel::{DomainError, Result};
use hearth_domain::transport::{Delivery, Message, MessageBus, MessageMetadata, Subscription};
use hearth_shared::topics;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueryBusConfig {
    /// Deadline applied by `send_with_default_timeout`
    pub default_timeout: Duration,
}

impl Default for QueryBusConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
        }
    }
}

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<QueryResult>>>>;

pub struct QueryBus {
    transport: Arc<dyn MessageBus>,
    registered: Arc<Mutex<HashSet<String>>>,
    pending: PendingTable,
    config: QueryBusConfig,
    shutdown: CancellationToken,
}

impl QueryBus {
    /// Build the bus and start the response-dispatch loop on the shared
    /// `query-responses` topic.
    pub async fn new(transport: Arc<dyn MessageBus>, config: QueryBusConfig) -> Result<Self> {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let subscription = transport.subscribe(topics::QUERY_RESPONSES).await?;
        let shutdown = CancellationToken::new();
        tokio::spawn(dispatch_responses(
            subscription,
            Arc::clone(&pending),
            shutdown.clone(),
        ));
        Ok(Self {
            transport,
            registered: Arc::new(Mutex::new(HashSet::new())),
            pending,
            config,
            shutdown,
        })
    }

    /// Register the single handler for query type `Q` and start its
    /// processing loop. Duplicate registration fails.
    pub async fn register_handler<Q, H>(&self, handler: H) -> Result<()>
    where
        Q: Query + DeserializeOwned,
        H: QueryHandler<Q> + 'static,
    {
        {
            let mut registered = self.registered.lock();
            if !registered.insert(Q::NAME.to_string()) {
                return Err(DomainError::HandlerAlreadyRegistered {
                    name: Q::NAME.to_string(),
                });
            }
        }
        let mut subscription = match self.transport.subscribe(&topics::query_topic(Q::NAME)).await {
            Ok(subscription) => subscription,
            Err(err) => {
                self.registered.lock().remove(Q::NAME);
                return Err(err.into());
            }
        };

        let handler = Arc::new(handler);
        let transport = Arc::clone(&self.transport);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    delivery = subscription.recv() => {
                        let Some(delivery) = delivery else { break };
                        process_query(handler.as_ref(), &transport, delivery).await;
                    }
                }
            }
            debug!(query_type = Q::NAME, "query processing loop stopped");
        });
        Ok(())
    }

    /// Publish the query and block until its correlated response arrives or
    /// `cancel` fires, whichever happens first. A response arriving after
    /// cancellation is dropped by the dispatch loop.
    pub async fn send<Q: Query>(&self, query: &Q, cancel: &CancellationToken) -> Result<QueryResult> {
        query.validate()?;
        if !self.registered.lock().contains(Q::NAME) {
            return Err(DomainError::UnknownQueryType {
                name: Q::NAME.to_string(),
            });
        }

        let response_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(response_id.clone(), tx);
        // Removes the table entry on every return path
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            response_id: response_id.clone(),
        };

        let payload = serde_json::to_vec(query).map_err(|e| DomainError::Serialization {
            type_name: Q::NAME.to_string(),
            reason: e.to_string(),
        })?;
        let message = Message {
            metadata: MessageMetadata {
                type_name: Q::NAME.to_string(),
                entity_id: query.id().to_string(),
                response_id: Some(response_id),
            },
            payload,
        };
        self.transport
            .publish(&topics::query_topic(Q::NAME), message)
            .await?;

        tokio::select! {
            response = rx => response.map_err(|_| DomainError::Infrastructure {
                message: "response channel closed before delivery".to_string(),
            }),
            _ = cancel.cancelled() => Err(DomainError::QueryCancelled {
                query_type: Q::NAME.to_string(),
            }),
        }
    }

    /// `send` bounded by an explicit deadline.
    pub async fn send_with_timeout<Q: Query>(
        &self,
        query: &Q,
        timeout: Duration,
    ) -> Result<QueryResult> {
        let cancel = CancellationToken::new();
        match tokio::time::timeout(timeout, self.send(query, &cancel)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::QueryTimeout {
                query_type: Q::NAME.to_string(),
            }),
        }
    }

    /// `send` bounded by the configured default deadline.
    pub async fn send_with_default_timeout<Q: Query>(&self, query: &Q) -> Result<QueryResult> {
        self.send_with_timeout(query, self.config.default_timeout)
            .await
    }

    /// Number of outstanding correlation entries; diagnostic only.
    pub fn pending_responses(&self) -> usize {
        self.pending.lock().len()
    }

    /// Stop every processing loop and the response dispatcher. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for QueryBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct PendingGuard {
    pending: PendingTable,
    response_id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.response_id);
    }
}

async fn dispatch_responses(
    mut subscription: Subscription,
    pending: PendingTable,
    shutdown: CancellationToken,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else { break };
                delivery
            }
        };
        let Some(response_id) = delivery.message().metadata.response_id.clone() else {
            delivery.nack("response without correlation id");
            continue;
        };
        let result: QueryResult = match serde_json::from_slice(&delivery.message().payload) {
            Ok(result) => result,
            Err(err) => {
                error!(%response_id, %err, "failed to deserialize query response");
                delivery.nack(&err.to_string());
                continue;
            }
        };
        let sender = pending.lock().remove(&response_id);
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    // Caller gave up between table removal and delivery
                    delivery.nack("caller no longer waiting");
                } else {
                    delivery.ack();
                }
            }
            None => {
                debug!(%response_id, "dropping response with no pending entry");
                delivery.nack("no pending query for correlation id");
            }
        }
    }
    debug!("query response dispatch loop stopped");
}

async fn process_query<Q, H>(handler: &H, transport: &Arc<dyn MessageBus>, delivery: Delivery)
where
    Q: Query + DeserializeOwned,
    H: QueryHandler<Q>,
{
    let metadata = delivery.message().metadata.clone();
    let Some(response_id) = metadata.response_id.clone() else {
        error!(query_type = Q::NAME, "query message missing correlation id");
        delivery.nack("missing correlation id");
        return;
    };

    let (result, handled) = match serde_json::from_slice::<Q>(&delivery.message().payload) {
        Ok(query) => match handler.handle(query).await {
            Ok(data) => (
                QueryResult::ok(metadata.entity_id.clone(), Q::NAME, data),
                true,
            ),
            Err(err) => {
                error!(query_type = Q::NAME, %err, "query handler error");
                (
                    QueryResult::failed(metadata.entity_id.clone(), Q::NAME, err.to_string()),
                    true,
                )
            }
        },
        Err(err) => {
            error!(query_type = Q::NAME, %err, "failed to deserialize query");
            (
                QueryResult::failed(metadata.entity_id.clone(), Q::NAME, err.to_string()),
                false,
            )
        }
    };

    let payload = match serde_json::to_vec(&result) {
        Ok(payload) => payload,
        Err(err) => {
            error!(query_type = Q::NAME, %err, "failed to serialize query response");
            delivery.nack(&err.to_string());
            return;
        }
    };
    let response = Message {
        metadata: MessageMetadata {
            type_name: Q::NAME.to_string(),
            entity_id: metadata.entity_id,
            response_id: Some(response_id),
        },
        payload,
    };
    match transport.publish(topics::QUERY_RESPONSES, response).await {
        Ok(()) if handled => delivery.ack(),
        Ok(()) => delivery.nack("query payload could not be deserialized"),
        Err(err) => {
            error!(query_type = Q::NAME, %err, "failed to publish query response");
            delivery.nack(&err.to_string());
        }
    }
}

//! Command bus: fire-and-forget dispatch over the message transport.
//!
//! Registering a handler subscribes to the command's topic and starts a
//! dedicated processing loop. The bus holds no business state; per-command
//! outcomes are acknowledged (or negatively acknowledged and logged) on the
//! delivery itself and are not surfaced to the sender.

use std::collections::HashSet;
use std::sync::Arc;

use hearth_domain::command::{Command, CommandHandler};
use hearth_domain::shared_kernel::{DomainError, Result};
use hearth_domain::transport::{Delivery, Message, MessageBus, MessageMetadata};
use hearth_shared::topics;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct CommandBus {
    transport: Arc<dyn MessageBus>,
    registered: Arc<Mutex<HashSet<String>>>,
    shutdown: CancellationToken,
}

impl CommandBus {
    pub fn new(transport: Arc<dyn MessageBus>) -> Self {
        Self {
            transport,
            registered: Arc::new(Mutex::new(HashSet::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register the single handler for command type `C` and start its
    /// processing loop. A second registration for the same type fails and
    /// never replaces the first.
    pub async fn register_handler<C, H>(&self, handler: H) -> Result<()>
    where
        C: Command + DeserializeOwned,
        H: CommandHandler<C> + 'static,
    {
        {
            let mut registered = self.registered.lock();
            if !registered.insert(C::NAME.to_string()) {
                return Err(DomainError::HandlerAlreadyRegistered {
                    name: C::NAME.to_string(),
                });
            }
        }
        let mut subscription = match self.transport.subscribe(&topics::command_topic(C::NAME)).await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                self.registered.lock().remove(C::NAME);
                return Err(err.into());
            }
        };

        let handler = Arc::new(handler);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    delivery = subscription.recv() => {
                        let Some(delivery) = delivery else { break };
                        process_command(handler.as_ref(), delivery).await;
                    }
                }
            }
            debug!(command_type = C::NAME, "command processing loop stopped");
        });
        Ok(())
    }

    /// Validate, serialize and publish; returns as soon as the message is
    /// on the topic. Handling outcome is not awaited.
    pub async fn send<C: Command>(&self, command: &C) -> Result<()> {
        command.validate()?;
        if !self.registered.lock().contains(C::NAME) {
            return Err(DomainError::UnknownCommandType {
                name: C::NAME.to_string(),
            });
        }
        let payload = serde_json::to_vec(command).map_err(|e| DomainError::Serialization {
            type_name: C::NAME.to_string(),
            reason: e.to_string(),
        })?;
        let message = Message {
            metadata: MessageMetadata {
                type_name: C::NAME.to_string(),
                entity_id: command.id().to_string(),
                response_id: None,
            },
            payload,
        };
        self.transport
            .publish(&topics::command_topic(C::NAME), message)
            .await
            .map_err(Into::into)
    }

    /// Stop every processing loop. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for CommandBus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn process_command<C, H>(handler: &H, delivery: Delivery)
where
    C: Command + DeserializeOwned,
    H: CommandHandler<C>,
{
    let command: C = match serde_json::from_slice(&delivery.message().payload) {
        Ok(command) => command,
        Err(err) => {
            error!(command_type = C::NAME, %err, "failed to deserialize command");
            delivery.nack(&err.to_string());
            return;
        }
    };
    match handler.handle(command).await {
        Ok(result) if result.success => {
            debug!(
                command_type = C::NAME,
                command_id = %result.command_id,
                aggregate_id = result.aggregate_id.as_deref().unwrap_or(""),
                "command handled"
            );
            delivery.ack();
        }
        Ok(result) => {
            let reason = result.error.unwrap_or_else(|| "handler failed".to_string());
            error!(command_type = C::NAME, %reason, "command handler reported failure");
            delivery.nack(&reason);
        }
        Err(err) => {
            error!(command_type = C::NAME, %err, "command handler error");
            delivery.nack(&err.to_string());
        }
    }
}

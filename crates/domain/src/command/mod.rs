//! Command contracts and the concrete command set.
//!
//! Commands represent atomic write operations dispatched through the
//! command bus. Each carries its own id and validates itself before it
//! reaches storage or the transport.

use async_trait::async_trait;
use hearth_shared::{CommandId, ConfigurationId};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::shared_kernel::{require_non_empty, Result};

/// Contract every command exposes to the bus.
pub trait Command: Debug + Send + Sync + Serialize + 'static {
    /// Wire-level type name; also the command topic suffix.
    const NAME: &'static str;

    fn id(&self) -> CommandId;

    /// Fail-fast business validation, run before publish.
    fn validate(&self) -> Result<()>;
}

/// Handler invoked by the command bus processing loop.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> Result<CommandResult>;
}

/// Outcome of handling one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub command_id: String,
    pub command_type: String,
    pub error: Option<String>,
    pub aggregate_id: Option<String>,
    pub version: Option<u64>,
}

impl CommandResult {
    pub fn ok(
        command_id: CommandId,
        command_type: &str,
        aggregate_id: String,
        version: u64,
    ) -> Self {
        Self {
            success: true,
            command_id: command_id.to_string(),
            command_type: command_type.to_string(),
            error: None,
            aggregate_id: Some(aggregate_id),
            version: Some(version),
        }
    }

    /// Failure shape of the wire contract. In-process handlers surface
    /// failures as `Err` instead, so this is for consumers decoding results
    /// off the transport.
    pub fn failed(command_id: CommandId, command_type: &str, error: String) -> Self {
        Self {
            success: false,
            command_id: command_id.to_string(),
            command_type: command_type.to_string(),
            error: Some(error),
            aggregate_id: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConfiguration {
    pub id: CommandId,
    pub profile: String,
    pub theme: String,
}

impl CreateConfiguration {
    pub fn new(profile: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            profile: profile.into(),
            theme: theme.into(),
        }
    }
}

impl Command for CreateConfiguration {
    const NAME: &'static str = "create_configuration";

    fn id(&self) -> CommandId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("profile", &self.profile)?;
        require_non_empty("theme", &self.theme)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSetting {
    pub id: CommandId,
    pub configuration_id: ConfigurationId,
    pub key: String,
    pub value: String,
}

impl SetSetting {
    pub fn new(
        configuration_id: ConfigurationId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: CommandId::new(),
            configuration_id,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Command for SetSetting {
    const NAME: &'static str = "set_setting";

    fn id(&self) -> CommandId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("key", &self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveSetting {
    pub id: CommandId,
    pub configuration_id: ConfigurationId,
    pub key: String,
}

impl RemoveSetting {
    pub fn new(configuration_id: ConfigurationId, key: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            configuration_id,
            key: key.into(),
        }
    }
}

impl Command for RemoveSetting {
    const NAME: &'static str = "remove_setting";

    fn id(&self) -> CommandId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("key", &self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchProfile {
    pub id: CommandId,
    pub configuration_id: ConfigurationId,
    pub profile: String,
}

impl SwitchProfile {
    pub fn new(configuration_id: ConfigurationId, profile: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            configuration_id,
            profile: profile.into(),
        }
    }
}

impl Command for SwitchProfile {
    const NAME: &'static str = "switch_profile";

    fn id(&self) -> CommandId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("profile", &self.profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTheme {
    pub id: CommandId,
    pub configuration_id: ConfigurationId,
    pub theme: String,
}

impl SetTheme {
    pub fn new(configuration_id: ConfigurationId, theme: impl Into<String>) -> Self {
        Self {
            id: CommandId::new(),
            configuration_id,
            theme: theme.into(),
        }
    }
}

impl Command for SetTheme {
    const NAME: &'static str = "set_theme";

    fn id(&self) -> CommandId {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("theme", &self.theme)
    }
}

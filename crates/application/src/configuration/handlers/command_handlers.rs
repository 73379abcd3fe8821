//! Command handlers for the configuration aggregate.
//!
//! Each handler loads (or creates) the aggregate, applies one domain
//! operation and saves through the repository. Domain errors propagate to
//! the bus, which logs and negatively acknowledges the message.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::command::{
    Command, CommandHandler, CommandResult, CreateConfiguration, RemoveSetting, SetSetting,
    SetTheme, SwitchProfile,
};
use hearth_domain::configuration::Configuration;
use hearth_domain::repository::ConfigurationRepository;
use hearth_domain::shared_kernel::Result;

pub struct CreateConfigurationHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl CreateConfigurationHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<CreateConfiguration> for CreateConfigurationHandler {
    async fn handle(&self, command: CreateConfiguration) -> Result<CommandResult> {
        let mut configuration = Configuration::create(&command.profile, &command.theme)?;
        self.repository.save(&mut configuration).await?;
        Ok(CommandResult::ok(
            command.id,
            CreateConfiguration::NAME,
            configuration.id().to_string(),
            configuration.version(),
        ))
    }
}

pub struct SetSettingHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl SetSettingHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<SetSetting> for SetSettingHandler {
    async fn handle(&self, command: SetSetting) -> Result<CommandResult> {
        let mut configuration = self.repository.get_by_id(&command.configuration_id).await?;
        configuration.set_setting(&command.key, &command.value)?;
        self.repository.save(&mut configuration).await?;
        Ok(CommandResult::ok(
            command.id,
            SetSetting::NAME,
            configuration.id().to_string(),
            configuration.version(),
        ))
    }
}

pub struct RemoveSettingHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl RemoveSettingHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<RemoveSetting> for RemoveSettingHandler {
    async fn handle(&self, command: RemoveSetting) -> Result<CommandResult> {
        let mut configuration = self.repository.get_by_id(&command.configuration_id).await?;
        configuration.remove_setting(&command.key)?;
        self.repository.save(&mut configuration).await?;
        Ok(CommandResult::ok(
            command.id,
            RemoveSetting::NAME,
            configuration.id().to_string(),
            configuration.version(),
        ))
    }
}

pub struct SwitchProfileHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl SwitchProfileHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<SwitchProfile> for SwitchProfileHandler {
    async fn handle(&self, command: SwitchProfile) -> Result<CommandResult> {
        let mut configuration = self.repository.get_by_id(&command.configuration_id).await?;
        configuration.switch_profile(&command.profile)?;
        self.repository.save(&mut configuration).await?;
        Ok(CommandResult::ok(
            command.id,
            SwitchProfile::NAME,
            configuration.id().to_string(),
            configuration.version(),
        ))
    }
}

pub struct SetThemeHandler {
    repository: Arc<dyn ConfigurationRepository>,
}

impl SetThemeHandler {
    pub fn new(repository: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler<SetTheme> for SetThemeHandler {
    async fn handle(&self, command: SetTheme) -> Result<CommandResult> {
        let mut configuration = self.repository.get_by_id(&command.configuration_id).await?;
        configuration.set_theme(&command.theme)?;
        self.repository.save(&mut configuration).await?;
        Ok(CommandResult::ok(
            command.id,
            SetTheme::NAME,
            configuration.id().to_string(),
            configuration.version(),
        ))
    }
}

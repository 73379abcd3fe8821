//! The `Configuration` aggregate root.
//!
//! Observable state is a pure function of the ordered event sequence applied
//! since creation. Mutating operations validate against in-memory state,
//! raise an event when a material change results, and never touch storage;
//! the repository is the only component that persists events.

use std::collections::HashMap;

use hearth_shared::ConfigurationId;
use serde::{Deserialize, Serialize};

use crate::events::{
    ConfigurationCreated, ConfigurationEvent, Event, ProfileSwitched, SettingChanged,
    SettingRemoved, ThemeChanged,
};
use crate::shared_kernel::{require_non_empty, DomainError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    id: ConfigurationId,
    profile: String,
    theme: String,
    settings: HashMap<String, String>,
    version: u64,
    uncommitted_events: Vec<Event>,
}

impl Configuration {
    /// Factory: raises the creation event immediately, so a fresh aggregate
    /// is already at version 1 with one uncommitted event.
    pub fn create(profile: &str, theme: &str) -> Result<Self> {
        require_non_empty("profile", profile)?;
        require_non_empty("theme", theme)?;
        let mut configuration = Self::empty(ConfigurationId::new());
        configuration.raise(ConfigurationEvent::Created(ConfigurationCreated {
            profile: profile.to_string(),
            theme: theme.to_string(),
        }))?;
        Ok(configuration)
    }

    /// Rebuild an aggregate by replaying its full history.
    pub fn from_history(events: &[Event]) -> Result<Self> {
        let mut configuration = Self::empty(ConfigurationId::from_uuid(uuid::Uuid::nil()));
        configuration.load_from_history(events)?;
        Ok(configuration)
    }

    fn empty(id: ConfigurationId) -> Self {
        Self {
            id,
            profile: String::new(),
            theme: String::new(),
            settings: HashMap::new(),
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Events raised but not yet persisted.
    pub fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    /// Clears the uncommitted buffer; called only after a successful store
    /// write (the commit boundary).
    pub fn mark_events_as_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    /// Applies events strictly in ascending version order. A gap in the
    /// sequence fails; an unrecognized event type is skipped, though its
    /// version still advances the aggregate.
    pub fn load_from_history(&mut self, events: &[Event]) -> Result<()> {
        for event in events {
            if event.version != self.version + 1 {
                return Err(DomainError::EventVersionGap {
                    aggregate_id: event.aggregate_id.clone(),
                    expected: self.version + 1,
                    actual: event.version,
                });
            }
            if self.version == 0 {
                self.id = ConfigurationId::from_string(&event.aggregate_id).ok_or_else(|| {
                    DomainError::Validation {
                        field: "aggregate_id".to_string(),
                        reason: format!("not a valid id: {}", event.aggregate_id),
                    }
                })?;
            }
            if let Some(decoded) = ConfigurationEvent::decode(event)? {
                self.apply(&decoded);
            }
            self.version = event.version;
        }
        Ok(())
    }

    /// Change one setting. Idempotent: an equal value raises no event.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        require_non_empty("key", key)?;
        if self.setting(key) == Some(value) {
            return Ok(());
        }
        self.raise(ConfigurationEvent::SettingChanged(SettingChanged {
            key: key.to_string(),
            old_value: self.settings.get(key).cloned(),
            new_value: value.to_string(),
        }))
    }

    /// Remove a setting. Removing an absent key is a no-op.
    pub fn remove_setting(&mut self, key: &str) -> Result<()> {
        require_non_empty("key", key)?;
        if !self.settings.contains_key(key) {
            return Ok(());
        }
        self.raise(ConfigurationEvent::SettingRemoved(SettingRemoved {
            key: key.to_string(),
        }))
    }

    /// Switch to another profile. Switching to the current profile is a
    /// no-op.
    pub fn switch_profile(&mut self, profile: &str) -> Result<()> {
        require_non_empty("profile", profile)?;
        if self.profile == profile {
            return Ok(());
        }
        self.raise(ConfigurationEvent::ProfileSwitched(ProfileSwitched {
            old_profile: self.profile.clone(),
            new_profile: profile.to_string(),
        }))
    }

    /// Change the theme. An equal theme raises no event.
    pub fn set_theme(&mut self, theme: &str) -> Result<()> {
        require_non_empty("theme", theme)?;
        if self.theme == theme {
            return Ok(());
        }
        self.raise(ConfigurationEvent::ThemeChanged(ThemeChanged {
            old_theme: self.theme.clone(),
            new_theme: theme.to_string(),
        }))
    }

    fn raise(&mut self, event: ConfigurationEvent) -> Result<()> {
        let stored = event.encode(&self.id.to_string(), self.version + 1)?;
        self.apply(&event);
        self.version += 1;
        self.uncommitted_events.push(stored);
        Ok(())
    }

    fn apply(&mut self, event: &ConfigurationEvent) {
        match event {
            ConfigurationEvent::Created(p) => {
                self.profile = p.profile.clone();
                self.theme = p.theme.clone();
            }
            ConfigurationEvent::SettingChanged(p) => {
                self.settings.insert(p.key.clone(), p.new_value.clone());
            }
            ConfigurationEvent::SettingRemoved(p) => {
                self.settings.remove(&p.key);
            }
            ConfigurationEvent::ProfileSwitched(p) => {
                self.profile = p.new_profile.clone();
            }
            ConfigurationEvent::ThemeChanged(p) => {
                self.theme = p.new_theme.clone();
            }
        }
    }
}

/// Read-side projection of a configuration, as returned by query handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationView {
    pub id: String,
    pub profile: String,
    pub theme: String,
    pub settings: HashMap<String, String>,
    pub version: u64,
}

impl From<&Configuration> for ConfigurationView {
    fn from(configuration: &Configuration) -> Self {
        Self {
            id: configuration.id().to_string(),
            profile: configuration.profile().to_string(),
            theme: configuration.theme().to_string(),
            settings: configuration.settings().clone(),
            version: configuration.version(),
        }
    }
}

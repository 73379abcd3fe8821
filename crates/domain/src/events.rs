//! Domain events for the configuration aggregate.
//!
//! `Event` is the stored, transport-friendly record; `ConfigurationEvent`
//! is the typed closed set the aggregate replays. Encoding and decoding go
//! through an explicit per-type table rather than reflection, and decoding
//! an unknown event type yields `None` so replay can skip it (forward
//! compatibility).

use chrono::{DateTime, Utc};
use hearth_shared::EventId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared_kernel::{DomainError, Result};

/// Immutable record of a state change to one aggregate.
///
/// `version` is the event's 1-based ordinal in its aggregate's history,
/// strictly increasing by exactly one per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub aggregate_id: String,
    pub event_type: String,
    pub version: u64,
    pub occurred_at: DateTime<Utc>,
    pub payload: Value,
}

impl Event {
    pub fn new(
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        version: u64,
        payload: Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            version,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

/// Event type names as they appear on the wire and in the store.
pub mod event_types {
    pub const CONFIGURATION_CREATED: &str = "configuration_created";
    pub const SETTING_CHANGED: &str = "setting_changed";
    pub const SETTING_REMOVED: &str = "setting_removed";
    pub const PROFILE_SWITCHED: &str = "profile_switched";
    pub const THEME_CHANGED: &str = "theme_changed";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationCreated {
    pub profile: String,
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChanged {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRemoved {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSwitched {
    pub old_profile: String,
    pub new_profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeChanged {
    pub old_theme: String,
    pub new_theme: String,
}

/// Closed set of events the configuration aggregate understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationEvent {
    Created(ConfigurationCreated),
    SettingChanged(SettingChanged),
    SettingRemoved(SettingRemoved),
    ProfileSwitched(ProfileSwitched),
    ThemeChanged(ThemeChanged),
}

impl ConfigurationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => event_types::CONFIGURATION_CREATED,
            Self::SettingChanged(_) => event_types::SETTING_CHANGED,
            Self::SettingRemoved(_) => event_types::SETTING_REMOVED,
            Self::ProfileSwitched(_) => event_types::PROFILE_SWITCHED,
            Self::ThemeChanged(_) => event_types::THEME_CHANGED,
        }
    }

    /// Encode into the stored representation at the given version.
    pub fn encode(&self, aggregate_id: &str, version: u64) -> Result<Event> {
        let payload = match self {
            Self::Created(p) => to_payload(self.event_type(), p)?,
            Self::SettingChanged(p) => to_payload(self.event_type(), p)?,
            Self::SettingRemoved(p) => to_payload(self.event_type(), p)?,
            Self::ProfileSwitched(p) => to_payload(self.event_type(), p)?,
            Self::ThemeChanged(p) => to_payload(self.event_type(), p)?,
        };
        Ok(Event::new(aggregate_id, self.event_type(), version, payload))
    }

    /// Decode a stored event. Returns `Ok(None)` for unrecognized event
    /// types; a malformed payload of a known type is an error.
    pub fn decode(event: &Event) -> Result<Option<Self>> {
        let decoded = match event.event_type.as_str() {
            event_types::CONFIGURATION_CREATED => Self::Created(from_payload(event)?),
            event_types::SETTING_CHANGED => Self::SettingChanged(from_payload(event)?),
            event_types::SETTING_REMOVED => Self::SettingRemoved(from_payload(event)?),
            event_types::PROFILE_SWITCHED => Self::ProfileSwitched(from_payload(event)?),
            event_types::THEME_CHANGED => Self::ThemeChanged(from_payload(event)?),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }
}

fn to_payload<T: Serialize>(event_type: &str, payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| DomainError::Serialization {
        type_name: event_type.to_string(),
        reason: e.to_string(),
    })
}

fn from_payload<T: DeserializeOwned>(event: &Event) -> Result<T> {
    serde_json::from_value(event.payload.clone()).map_err(|e| DomainError::Serialization {
        type_name: event.event_type.clone(),
        reason: e.to_string(),
    })
}

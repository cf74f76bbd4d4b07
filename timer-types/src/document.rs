//! Document shapes stored in and delivered by the remote session store.
//!
//! A session lives at `sessions/{code}` as one JSON document; each connected
//! device owns one entry under `sessions/{code}/presence/{deviceId}`. Field
//! names are camelCase on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;
use crate::ids::{DeviceId, ParticipantId, SessionCode, Timestamp};

/// Direction the clock runs for every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimerMode {
    /// Elapsed time counts up from zero without bound.
    #[default]
    #[serde(rename = "countup")]
    CountUp,
    /// Remaining time counts down from the initial allowance, floored at zero.
    #[serde(rename = "countdown")]
    CountDown,
}

impl TimerMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::CountUp => "countup",
            TimerMode::CountDown => "countdown",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "countup" | "up" => Ok(TimerMode::CountUp),
            "countdown" | "down" => Ok(TimerMode::CountDown),
            other => Err(TypesError::InvalidMode(other.to_string())),
        }
    }
}

/// One timed entity (player) within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Unique within the session.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Seconds elapsed (count-up) or remaining (count-down).
    pub elapsed: u64,
    /// Whether this participant currently holds the turn.
    pub is_active: bool,
}

impl Participant {
    /// Create an inactive participant.
    pub fn new(id: ParticipantId, name: impl Into<String>, elapsed: u64) -> Self {
        Self {
            id,
            name: name.into(),
            elapsed,
            is_active: false,
        }
    }
}

/// Liveness record for one connected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    /// The device this entry belongs to.
    pub device_id: DeviceId,
    /// When the device joined the session.
    pub joined_at: Timestamp,
    /// When the device last refreshed the entry.
    pub last_seen: Timestamp,
}

impl PresenceEntry {
    /// Create an entry for a device joining now.
    pub fn joined(device_id: DeviceId, now: Timestamp) -> Self {
        Self {
            device_id,
            joined_at: now,
            last_seen: now,
        }
    }
}

/// Full gameplay snapshot the host publishes on every debounced write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Participants in turn order.
    pub participants: Vec<Participant>,
    /// Participant holding the turn, if any.
    pub active_participant_id: Option<ParticipantId>,
    /// Whether the active participant's clock is advancing.
    pub is_running: bool,
    /// Whether any turn has been started since the last reset.
    pub has_started: bool,
    /// Clock direction.
    pub mode: TimerMode,
    /// Count-down allowance applied on reset.
    pub initial_seconds: u64,
    /// Free-form game title.
    pub title: String,
    /// Write time.
    pub last_updated: Timestamp,
    /// Device holding write authority.
    pub host_id: DeviceId,
}

/// The session document as stored at `sessions/{code}`.
///
/// Every field is optional because remote documents may be partial. A field
/// that is absent from the stored JSON is `None`; for
/// `active_participant_id`, an explicit `null` is `Some(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    /// Session code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionCode>,
    /// Device holding write authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<DeviceId>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Participants in turn order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<Participant>>,
    /// Participant holding the turn.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_participant_id: Option<Option<ParticipantId>>,
    /// Whether the clock is advancing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    /// Whether any turn has started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_started: Option<bool>,
    /// Clock direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TimerMode>,
    /// Count-down allowance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_seconds: Option<u64>,
    /// Game title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Last host write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
    /// Presence sub-document keyed by device id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub presence: BTreeMap<String, PresenceEntry>,
}

/// Distinguish an explicit `null` from an absent key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl SessionDocument {
    /// Convert to a JSON value for storage.
    pub fn to_value(&self) -> Result<serde_json::Value, TypesError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a stored JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, TypesError> {
        Ok(serde_json::from_value(value)?)
    }
}

impl SessionSnapshot {
    /// Convert to a JSON value for a merge write.
    pub fn to_value(&self) -> Result<serde_json::Value, TypesError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl From<SessionSnapshot> for SessionDocument {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            id: None,
            host_id: Some(snapshot.host_id),
            created_at: None,
            participants: Some(snapshot.participants),
            active_participant_id: Some(snapshot.active_participant_id),
            is_running: Some(snapshot.is_running),
            has_started: Some(snapshot.has_started),
            mode: Some(snapshot.mode),
            initial_seconds: Some(snapshot.initial_seconds),
            title: Some(snapshot.title),
            last_updated: Some(snapshot.last_updated),
            presence: BTreeMap::new(),
        }
    }
}

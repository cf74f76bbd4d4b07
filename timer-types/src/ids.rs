//! Identity types for bgtimer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TypesError;

/// Length of a session code.
pub const SESSION_CODE_LEN: usize = 6;

const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DEVICE_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DEVICE_SUFFIX_LEN: usize = 11;

/// A short code identifying one shared game session.
///
/// Generated codes are six uppercase alphanumerics. Collisions with existing
/// sessions are not checked; a fresh code is treated as a new space.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Generate a new random session code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..SESSION_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..SESSION_CODE_ALPHABET.len());
                SESSION_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Normalize user input into a session code.
    ///
    /// Input is trimmed and uppercased. Codes typed by hand are not required
    /// to be exactly six characters, but must be non-empty ASCII alphanumerics
    /// because the code becomes a path segment in the remote store.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        let code = input.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(TypesError::EmptySessionCode);
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypesError::InvalidSessionCode(code));
        }
        Ok(Self(code))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionCode({})", self.0)
    }
}

/// An opaque identifier for one device taking part in a session.
///
/// Time-based prefix plus random suffix: `device_<unix millis>_<suffix>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

static PROCESS_DEVICE_ID: OnceLock<DeviceId> = OnceLock::new();

impl DeviceId {
    /// Generate a new device identifier.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..DEVICE_SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..DEVICE_SUFFIX_ALPHABET.len());
                DEVICE_SUFFIX_ALPHABET[idx] as char
            })
            .collect();
        Self(format!("device_{}_{}", Timestamp::now().as_millis(), suffix))
    }

    /// The identifier for this process.
    ///
    /// Generated on first use and stable for the lifetime of the process,
    /// including across reconnects.
    pub fn for_process() -> &'static DeviceId {
        PROCESS_DEVICE_ID.get_or_init(DeviceId::generate)
    }

    /// Wrap an identifier received from the remote store.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

/// Identifier of a participant, unique within one session.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ParticipantId(u32);

impl ParticipantId {
    /// Create a participant id from its numeric value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The id that follows this one. `None` at `u32::MAX`.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

/// A unique identifier for a saved game record.
///
/// UUID v4 format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Create a new random RecordId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Create a timestamp from milliseconds since the epoch.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

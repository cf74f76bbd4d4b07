//! Connection status machine for bgtimer.
//!
//! Pure transitions only. The replication client feeds in what the remote
//! store did and stores the resulting status; this module never touches the
//! store itself.

use std::fmt;

/// How the local device relates to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// No remote session. Gameplay runs locally.
    #[default]
    Offline,
    /// A create or join is in progress.
    Connecting,
    /// The store acknowledged the session.
    Connected,
    /// The store failed during connect. Gameplay continues locally.
    Error,
}

/// Something that happened between the client and the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A create or join was requested while a store is configured.
    ConnectRequested,
    /// The store acknowledged a write or read.
    Acknowledged,
    /// A store call failed or timed out.
    Failed {
        /// Description for logs.
        reason: String,
    },
    /// No store is configured or it is unreachable.
    Unavailable,
    /// The session was left.
    Left,
}

impl ConnectionStatus {
    /// Apply an event and return the next status.
    pub fn on_event(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (_, ConnectionEvent::ConnectRequested) => Self::Connecting,
            (Self::Connecting, ConnectionEvent::Acknowledged) => Self::Connected,
            (Self::Connecting, ConnectionEvent::Failed { .. }) => Self::Error,
            // Later write failures are logged, never surfaced as a transition.
            (Self::Connected, ConnectionEvent::Failed { .. }) => Self::Connected,
            (_, ConnectionEvent::Unavailable) => Self::Offline,
            (_, ConnectionEvent::Left) => Self::Offline,
            (status, _) => status,
        }
    }

    /// Whether subscription and publication are active.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lower-case display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

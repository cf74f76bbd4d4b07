//! Plain-text rendering of a session.

use bgtimer_client::{ReplicationPort, SessionClient};
use bgtimer_core::{format_time, ConnectionStatus, GameRecord, Role, SessionState};
use bgtimer_types::{DeviceId, SessionCode};
use std::fmt::Write;

/// Session facts shown above the participant list.
#[derive(Debug, Clone)]
pub struct Header {
    /// Current session, if any.
    pub code: Option<SessionCode>,
    /// This device's role.
    pub role: Option<Role>,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Devices counted as connected.
    pub connected: usize,
    /// Devices with a presence entry, in id order.
    pub devices: Vec<DeviceId>,
}

impl Header {
    /// Read the header fields from a client.
    pub async fn of<P: ReplicationPort>(client: &SessionClient<P>) -> Self {
        Self {
            code: client.session_code().await,
            role: client.role().await,
            status: client.status().await,
            connected: client.connected_count().await,
            devices: client
                .presence()
                .await
                .iter()
                .map(|entry| entry.device_id.clone())
                .collect(),
        }
    }
}

/// Render a client's current session.
pub async fn render_client<P: ReplicationPort>(client: &SessionClient<P>) -> String {
    let header = Header::of(client).await;
    render(&header, &client.state().await)
}

/// Render a session as a block of text.
pub fn render(header: &Header, state: &SessionState) -> String {
    let mut out = String::new();
    match &header.code {
        Some(code) => {
            let role = header.role.map(|r| r.to_string()).unwrap_or_default();
            let _ = writeln!(
                out,
                "Session: {} ({}, {}, {} connected)",
                code, role, header.status, header.connected
            );
        }
        None => {
            let _ = writeln!(out, "Session: none ({})", header.status);
        }
    }
    if !header.devices.is_empty() {
        let devices: Vec<String> = header
            .devices
            .iter()
            .map(|device| {
                if state.host_id() == Some(device) {
                    format!("{} (host)", device)
                } else {
                    device.to_string()
                }
            })
            .collect();
        let _ = writeln!(out, "Devices: {}", devices.join(", "));
    }
    if !state.title().is_empty() {
        let _ = writeln!(out, "Title:   {}", state.title());
    }
    let run_state = if state.is_running() {
        "running"
    } else if state.has_started() {
        "paused"
    } else {
        "not started"
    };
    let _ = writeln!(out, "Mode:    {} ({})", state.mode(), run_state);

    for participant in state.participants() {
        let marker = if state.active_participant_id() == Some(participant.id) {
            " *"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  [{}] {:<16} {:>8}{}",
            participant.id,
            participant.name,
            format_time(participant.elapsed),
            marker
        );
    }
    out
}

/// Render saved games, newest first.
pub fn render_history(records: &[GameRecord]) -> String {
    if records.is_empty() {
        return "No saved games.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "{} ({}, total {})",
            record.name,
            record.mode,
            format_time(record.total_seconds)
        );
        for player in &record.players {
            let _ = writeln!(out, "    {:<16} {:>8}", player.name, player.formatted);
        }
    }
    out
}

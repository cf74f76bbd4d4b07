//! Saved game records and clock formatting.
//!
//! History is an in-memory, newest-first list. It is never replicated and
//! never written to disk.

use bgtimer_types::{RecordId, TimerMode, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Format a clock value as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Format a timestamp as a UTC calendar date, `YYYY-MM-DD`.
///
/// Timestamps outside chrono's range fall back to the raw millisecond value.
pub fn format_date(at: Timestamp) -> String {
    i64::try_from(at.as_millis())
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| at.to_string())
}

/// One participant's final clock in a saved game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    /// Display name at save time.
    pub name: String,
    /// Clock value in seconds.
    pub seconds: u64,
    /// Clock value as shown to players.
    pub formatted: String,
}

/// A finished or in-progress game captured by [`GameHistory::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Unique record id.
    pub id: RecordId,
    /// Session title, or `Game <date>` when untitled.
    pub name: String,
    /// Save time.
    pub date: Timestamp,
    /// Every participant in display order.
    pub players: Vec<PlayerResult>,
    /// Clock direction during the game.
    pub mode: TimerMode,
    /// Sum of all clocks.
    pub total_seconds: u64,
}

impl GameRecord {
    /// Capture the current state of a game.
    pub fn capture(state: &SessionState, now: Timestamp) -> Self {
        let name = if state.title().is_empty() {
            format!("Game {}", format_date(now))
        } else {
            state.title().to_string()
        };
        let players = state
            .participants()
            .iter()
            .map(|p| PlayerResult {
                name: p.name.clone(),
                seconds: p.elapsed,
                formatted: format_time(p.elapsed),
            })
            .collect();
        Self {
            id: RecordId::new(),
            name,
            date: now,
            players,
            mode: state.mode(),
            total_seconds: state.total_seconds(),
        }
    }
}

/// Newest-first list of saved games.
#[derive(Debug, Clone, Default)]
pub struct GameHistory {
    records: Vec<GameRecord>,
}

impl GameHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the current game.
    ///
    /// A game that has not started is not saved and `None` is returned.
    pub fn save(&mut self, state: &SessionState, now: Timestamp) -> Option<&GameRecord> {
        if !state.has_started() {
            return None;
        }
        self.records.insert(0, GameRecord::capture(state, now));
        self.records.first()
    }

    /// The `n` most recent records.
    pub fn recent(&self, n: usize) -> &[GameRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Every record, newest first.
    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    /// Number of saved games.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

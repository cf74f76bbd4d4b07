//! Inbound merge policy for replicated session documents.
//!
//! Whole-document last-writer-wins: there is no per-field reconciliation and
//! no detection of competing hosts.

use bgtimer_types::SessionDocument;
use std::fmt;

use crate::presence::PresenceSet;
use crate::session::SessionState;

/// A device's relationship to the session it is in.
///
/// Fixed for the lifetime of one session membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created the session. Sole writer of gameplay fields.
    Host,
    /// Joined an existing session. Follows the host's snapshots.
    Participant,
}

impl Role {
    /// Whether this role publishes gameplay snapshots.
    pub fn publishes(&self) -> bool {
        matches!(self, Role::Host)
    }

    /// Whether this role applies inbound gameplay snapshots.
    pub fn applies_inbound(&self) -> bool {
        matches!(self, Role::Participant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Participant => f.write_str("participant"),
        }
    }
}

/// Apply an inbound document to local state.
///
/// The presence sub-document always replaces the local presence set. Gameplay
/// fields are only applied for [`Role::Participant`]:
/// - `activeParticipantId`, `isRunning`, `hasStarted`, `mode` and
///   `initialSeconds` are applied whenever present.
/// - `title` is applied when present and different.
/// - `participants` is replaced wholesale when it differs. When absent, the
///   local `isActive` flags are realigned with the applied active id.
///
/// Returns whether any gameplay field changed.
pub fn merge_inbound(
    state: &mut SessionState,
    presence: &mut PresenceSet,
    role: Role,
    doc: &SessionDocument,
) -> bool {
    presence.replace_all(doc.presence.clone());

    if !role.applies_inbound() {
        return false;
    }

    let before = state.clone();

    if let Some(active) = doc.active_participant_id {
        state.set_active_participant_id(active);
    }
    if let Some(running) = doc.is_running {
        state.set_running(running);
    }
    if let Some(started) = doc.has_started {
        state.set_started(started);
    }
    if let Some(mode) = doc.mode {
        state.set_mode(mode);
    }
    if let Some(initial) = doc.initial_seconds {
        state.set_initial_seconds(initial);
    }
    if let Some(title) = &doc.title {
        if title != state.title() {
            state.set_title(title);
        }
    }
    match &doc.participants {
        Some(participants) => {
            if participants.as_slice() != state.participants() {
                state.set_participants(participants.clone());
            }
        }
        None => state.sync_active_flags(),
    }
    if let Some(at) = doc.last_updated {
        state.touch(at);
    }

    *state != before
}

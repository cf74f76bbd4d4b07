//! Session state and turn timer for bgtimer.
//!
//! [`SessionState`] is the canonical in-memory representation of one game.
//! Every operation here is a pure mutation: it takes the current state and an
//! input and either applies it or rejects it as a no-op. Nothing here
//! schedules ticks or talks to the network; bgtimer-client drives the clock
//! and replication around these calls.
//!
//! Operations that can be rejected return `bool` (`true` = applied). Invalid
//! requests never panic and never surface errors.

use bgtimer_types::{
    DeviceId, Participant, ParticipantId, SessionCode, SessionDocument, SessionSnapshot,
    TimerMode, Timestamp,
};

/// Minimum number of participants in a session.
pub const MIN_PARTICIPANTS: usize = 2;

/// Default count-down allowance (ten minutes).
pub const DEFAULT_INITIAL_SECONDS: u64 = 600;

/// The canonical state of one game.
///
/// Invariants maintained by every operation:
/// - `active_participant_id` is `None` or names an existing participant.
/// - `is_running` implies `active_participant_id` is `Some`.
/// - At most one participant has `is_active`, and it is the active one.
/// - There are always at least [`MIN_PARTICIPANTS`] participants.
///
/// Inbound replicated snapshots are last-writer-wins and may carry
/// whatever the host last wrote; see `replication::merge_inbound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    session_id: Option<SessionCode>,
    host_id: Option<DeviceId>,
    participants: Vec<Participant>,
    active_participant_id: Option<ParticipantId>,
    is_running: bool,
    has_started: bool,
    mode: TimerMode,
    initial_seconds: u64,
    title: String,
    last_updated: Timestamp,
}

impl SessionState {
    /// Create a fresh two-participant game.
    pub fn new(mode: TimerMode, initial_seconds: u64) -> Self {
        let start = starting_time(mode, initial_seconds);
        let participants = (1..=MIN_PARTICIPANTS as u32)
            .map(|n| {
                let id = ParticipantId::new(n);
                Participant::new(id, default_name(id), start)
            })
            .collect();
        Self {
            session_id: None,
            host_id: None,
            participants,
            active_participant_id: None,
            is_running: false,
            has_started: false,
            mode,
            initial_seconds,
            title: String::new(),
            last_updated: Timestamp::default(),
        }
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Session this state belongs to, if any.
    pub fn session_id(&self) -> Option<&SessionCode> {
        self.session_id.as_ref()
    }

    /// Device holding write authority, if known.
    pub fn host_id(&self) -> Option<&DeviceId> {
        self.host_id.as_ref()
    }

    /// Participants in display and turn order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Look up a participant by id.
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participant holding the turn.
    pub fn active_participant_id(&self) -> Option<ParticipantId> {
        self.active_participant_id
    }

    /// Whether the active participant's clock is advancing.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Whether a turn has been started since the last reset.
    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// Clock direction.
    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Count-down allowance applied by [`reset`](Self::reset).
    pub fn initial_seconds(&self) -> u64 {
        self.initial_seconds
    }

    /// Game title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Time of the last replicated write seen or made.
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Sum of every participant's clock.
    pub fn total_seconds(&self) -> u64 {
        self.participants.iter().map(|p| p.elapsed).sum()
    }

    /// The participant and direction the clock should advance, if any.
    ///
    /// The tick task is armed while this is `Some` and must be re-armed
    /// whenever the value changes.
    pub fn ticking(&self) -> Option<(ParticipantId, TimerMode)> {
        match (self.is_running, self.active_participant_id) {
            (true, Some(id)) => Some((id, self.mode)),
            _ => None,
        }
    }

    // ===========================================
    // Turn timer
    // ===========================================

    /// Advance the active participant's clock by one second.
    ///
    /// +1 in count-up mode, -1 floored at zero in count-down mode. Returns
    /// whether any clock changed.
    pub fn tick(&mut self) -> bool {
        let Some(active) = self.active_participant_id else {
            return false;
        };
        let mode = self.mode;
        match self.participants.iter_mut().find(|p| p.id == active) {
            Some(participant) => {
                let next = match mode {
                    TimerMode::CountUp => participant.elapsed.saturating_add(1),
                    TimerMode::CountDown => participant.elapsed.saturating_sub(1),
                };
                let changed = next != participant.elapsed;
                participant.elapsed = next;
                changed
            }
            None => false,
        }
    }

    /// Give the turn to `id` and start its clock.
    ///
    /// Rejected if no participant has that id.
    pub fn start(&mut self, id: ParticipantId) -> bool {
        if self.participant(id).is_none() {
            return false;
        }
        self.active_participant_id = Some(id);
        self.is_running = true;
        self.has_started = true;
        for participant in &mut self.participants {
            participant.is_active = participant.id == id;
        }
        true
    }

    /// Stop the clock, keeping the active participant and all times.
    pub fn pause(&mut self) -> bool {
        let was_running = self.is_running;
        self.is_running = false;
        was_running
    }

    /// Restart the clock for the current active participant.
    ///
    /// Rejected when nobody holds the turn.
    pub fn resume(&mut self) -> bool {
        if self.active_participant_id.is_none() {
            return false;
        }
        self.is_running = true;
        true
    }

    /// Pass the turn to the next participant in display order, wrapping
    /// around to the first. With nobody active, the first participant starts.
    pub fn advance_to_next(&mut self) -> bool {
        if self.participants.is_empty() {
            return false;
        }
        let next_index = match self.active_index() {
            Some(index) => (index + 1) % self.participants.len(),
            None => 0,
        };
        let next_id = self.participants[next_index].id;
        self.start(next_id)
    }

    /// Clear the turn and reset every clock to its starting value.
    ///
    /// Count-down clocks restart from `initial_seconds`, count-up clocks from
    /// zero.
    pub fn reset(&mut self) {
        self.active_participant_id = None;
        self.is_running = false;
        self.has_started = false;
        let start = starting_time(self.mode, self.initial_seconds);
        for participant in &mut self.participants {
            participant.elapsed = start;
            participant.is_active = false;
        }
    }

    fn active_index(&self) -> Option<usize> {
        let active = self.active_participant_id?;
        self.participants.iter().position(|p| p.id == active)
    }

    // ===========================================
    // Roster and configuration
    // ===========================================

    /// Append a participant with the next unused id.
    ///
    /// The id is one more than the largest existing id. A blank or missing
    /// name becomes `Player <id>`. The clock starts per the current mode.
    /// Returns `None` when the largest id is already `u32::MAX`.
    pub fn add_participant(&mut self, name: Option<&str>) -> Option<ParticipantId> {
        let id = match self.participants.iter().map(|p| p.id).max() {
            Some(max) => max.next()?,
            None => ParticipantId::new(1),
        };
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_name(id),
        };
        let start = starting_time(self.mode, self.initial_seconds);
        self.participants.push(Participant::new(id, name, start));
        Some(id)
    }

    /// Remove a participant.
    ///
    /// Rejected when it would leave fewer than [`MIN_PARTICIPANTS`] or the id
    /// is unknown. Removing the active participant clears the turn and stops
    /// the clock.
    pub fn remove_participant(&mut self, id: ParticipantId) -> bool {
        if self.participants.len() <= MIN_PARTICIPANTS {
            return false;
        }
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        if self.participants.len() == before {
            return false;
        }
        if self.active_participant_id == Some(id) {
            self.active_participant_id = None;
            self.is_running = false;
        }
        true
    }

    /// Change a participant's display name.
    pub fn rename_participant(&mut self, id: ParticipantId, name: &str) -> bool {
        match self.participants.iter_mut().find(|p| p.id == id) {
            Some(participant) => {
                participant.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Change the clock direction.
    ///
    /// Existing clocks keep their values until the next reset.
    pub fn set_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
    }

    /// Change the count-down allowance used by the next reset.
    pub fn set_initial_seconds(&mut self, seconds: u64) {
        self.initial_seconds = seconds;
    }

    /// Change the game title.
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    // ===========================================
    // Session binding and replication shapes
    // ===========================================

    /// Bind this state to a session.
    pub fn bind(&mut self, session_id: SessionCode, host_id: Option<DeviceId>) {
        self.session_id = Some(session_id);
        self.host_id = host_id;
    }

    /// Detach this state from its session, keeping gameplay values.
    pub fn unbind(&mut self) {
        self.session_id = None;
        self.host_id = None;
    }

    /// Record the time of a replicated write.
    pub fn touch(&mut self, at: Timestamp) {
        self.last_updated = at;
    }

    /// The full gameplay snapshot a host publishes.
    pub fn snapshot(&self, host_id: &DeviceId, now: Timestamp) -> SessionSnapshot {
        SessionSnapshot {
            participants: self.participants.clone(),
            active_participant_id: self.active_participant_id,
            is_running: self.is_running,
            has_started: self.has_started,
            mode: self.mode,
            initial_seconds: self.initial_seconds,
            title: self.title.clone(),
            last_updated: now,
            host_id: host_id.clone(),
        }
    }

    /// The document a host writes when it creates a session.
    ///
    /// Clocks are written at their starting values and no turn is active.
    pub fn creation_document(
        &self,
        code: &SessionCode,
        host_id: &DeviceId,
        now: Timestamp,
    ) -> SessionDocument {
        let start = starting_time(self.mode, self.initial_seconds);
        let participants = self
            .participants
            .iter()
            .map(|p| Participant {
                elapsed: start,
                ..p.clone()
            })
            .collect();
        SessionDocument {
            id: Some(code.clone()),
            host_id: Some(host_id.clone()),
            created_at: Some(now),
            participants: Some(participants),
            active_participant_id: Some(None),
            is_running: Some(false),
            has_started: Some(false),
            mode: Some(self.mode),
            initial_seconds: Some(self.initial_seconds),
            title: Some(String::new()),
            last_updated: Some(now),
            presence: Default::default(),
        }
    }

    /// Adopt a remote document wholesale when joining a session.
    ///
    /// Missing fields fall back to: current participants, no active turn,
    /// stopped, not started, count-up, empty title.
    pub fn adopt(&mut self, doc: &SessionDocument) {
        if let Some(participants) = &doc.participants {
            self.participants = participants.clone();
        }
        self.active_participant_id = doc.active_participant_id.flatten();
        if doc.participants.is_none() {
            self.sync_active_flags();
        }
        self.is_running = doc.is_running.unwrap_or(false);
        self.has_started = doc.has_started.unwrap_or(false);
        self.mode = doc.mode.unwrap_or_default();
        if let Some(initial) = doc.initial_seconds {
            self.initial_seconds = initial;
        }
        self.title = doc.title.clone().unwrap_or_default();
        if doc.host_id.is_some() {
            self.host_id = doc.host_id.clone();
        }
        if let Some(at) = doc.last_updated {
            self.last_updated = at;
        }
    }

    /// Point every `is_active` flag at the current active id.
    pub(crate) fn sync_active_flags(&mut self) {
        let active = self.active_participant_id;
        for participant in &mut self.participants {
            participant.is_active = Some(participant.id) == active;
        }
    }

    pub(crate) fn set_participants(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub(crate) fn set_active_participant_id(&mut self, id: Option<ParticipantId>) {
        self.active_participant_id = id;
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.is_running = running;
    }

    pub(crate) fn set_started(&mut self, started: bool) {
        self.has_started = started;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(TimerMode::default(), DEFAULT_INITIAL_SECONDS)
    }
}

/// Clock value a participant starts from in the given mode.
pub fn starting_time(mode: TimerMode, initial_seconds: u64) -> u64 {
    match mode {
        TimerMode::CountUp => 0,
        TimerMode::CountDown => initial_seconds,
    }
}

fn default_name(id: ParticipantId) -> String {
    format!("Player {}", id)
}

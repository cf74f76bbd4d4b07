//! SessionClient - the main interface for bgtimer.
//!
//! This module provides [`SessionClient`], which owns one device's view of a
//! game and keeps it in step with other devices through a
//! [`ReplicationPort`].
//!
//! # Architecture
//!
//! SessionClient uses the pure state types from bgtimer-core for all game
//! logic and performs the I/O around them:
//!
//! ```text
//! UI → SessionClient → ReplicationPort → remote store
//!           ↓
//!      bgtimer-core (SessionState, merge policy, status machine)
//! ```
//!
//! Three background tasks run per client, each in its own slot:
//! - the ticker, armed while a participant's clock is running
//! - the debounced publisher (host only)
//! - the subscription reader, applying inbound snapshots
//!
//! Every task and every public operation takes the same lock for the whole
//! of its state mutation, so a tick and an inbound snapshot never interleave
//! mid-update. The lock is never held across a store call.
//!
//! Remote failures never surface to the caller. They are logged, drive the
//! connection status, and leave the local game fully playable.
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new();
//! let host = SessionClient::new(ClientConfig::default(), Some(store.clone()));
//! let code = host.create_session().await;
//! host.start(ParticipantId::new(1)).await;
//!
//! let guest = SessionClient::new(ClientConfig::default(), Some(store));
//! guest.join_session(code.as_str()).await;
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bgtimer_core::{
    merge_inbound, ConnectionEvent, ConnectionStatus, GameHistory, GameRecord, PresenceSet,
    Role, SessionState,
};
use bgtimer_types::{
    DeviceId, ParticipantId, PresenceEntry, SessionCode, TimerMode, Timestamp,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::deferred::{DeferredTask, TaskSlot};
use crate::port::{PortError, ReplicationPort, Subscription};

/// One device's handle on a game, local or shared.
pub struct SessionClient<P: ReplicationPort> {
    shared: Arc<Shared<P>>,
}

struct Shared<P> {
    config: ClientConfig,
    device_id: DeviceId,
    port: Option<P>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SessionState,
    presence: PresenceSet,
    status: ConnectionStatus,
    role: Option<Role>,
    history: GameHistory,
    // Bumped on every create, join and leave. Work that awaited a store
    // call checks it before touching state.
    membership: u64,
    ticking: Option<(ParticipantId, TimerMode)>,
    ticker: TaskSlot,
    publisher: DeferredTask,
    subscription: TaskSlot,
    heartbeat: TaskSlot,
}

impl<P: ReplicationPort> SessionClient<P> {
    /// Create a client for this process's device.
    ///
    /// With `port` set to `None` every session is local-only.
    pub fn new(config: ClientConfig, port: Option<P>) -> Self {
        Self::with_device(config, port, DeviceId::for_process().clone())
    }

    /// Create a client with an explicit device id.
    pub fn with_device(config: ClientConfig, port: Option<P>, device_id: DeviceId) -> Self {
        let inner = Inner {
            state: SessionState::new(config.timer.mode, config.timer.initial_seconds),
            presence: PresenceSet::new(),
            status: ConnectionStatus::Offline,
            role: None,
            history: GameHistory::new(),
            membership: 0,
            ticking: None,
            ticker: TaskSlot::new(),
            publisher: DeferredTask::new(config.sync.publish_debounce()),
            subscription: TaskSlot::new(),
            heartbeat: TaskSlot::new(),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                device_id,
                port,
                inner: Mutex::new(inner),
            }),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().await
    }

    // ===========================================
    // Session lifecycle
    // ===========================================

    /// Start a new session with this device as host.
    ///
    /// Clocks are reset; participants and settings carry over. If the store
    /// is missing or fails, the session continues locally under the new code.
    pub async fn create_session(&self) -> SessionCode {
        self.leave_session().await;
        let code = SessionCode::generate();

        let (membership, doc) = {
            let mut inner = self.lock().await;
            inner.membership += 1;
            inner.state.reset();
            inner
                .state
                .bind(code.clone(), Some(self.shared.device_id.clone()));
            inner.role = Some(Role::Host);
            sync_ticker(&self.shared, &mut inner);
            info!("Created session {} as host", code);

            if self.shared.port.is_none() {
                inner.status = inner.status.on_event(ConnectionEvent::Unavailable);
                warn!("No session store configured, {} is local-only", code);
                return code;
            }
            inner.status = inner.status.on_event(ConnectionEvent::ConnectRequested);
            let doc =
                inner
                    .state
                    .creation_document(&code, &self.shared.device_id, Timestamp::now());
            (inner.membership, doc)
        };

        let Some(port) = self.shared.port.as_ref() else {
            return code;
        };
        match self.shared.call(port.create_session(&code, &doc)).await {
            Ok(()) => self.finish_connect(&code, membership).await,
            Err(e) => self.connect_failed(&code, membership, e.to_string()).await,
        }
        code
    }

    /// Join an existing session as a participant.
    ///
    /// The code is trimmed and uppercased. An empty or malformed code is
    /// ignored and `None` returned. If the session does not exist or the
    /// store fails, play continues locally under the requested code.
    pub async fn join_session(&self, code: &str) -> Option<SessionCode> {
        let code = match SessionCode::parse(code) {
            Ok(code) => code,
            Err(e) => {
                debug!("Ignoring join request: {}", e);
                return None;
            }
        };
        self.leave_session().await;

        let membership = {
            let mut inner = self.lock().await;
            inner.membership += 1;
            inner.state.bind(code.clone(), None);
            inner.role = Some(Role::Participant);
            info!("Joining session {}", code);

            if self.shared.port.is_none() {
                inner.status = inner.status.on_event(ConnectionEvent::Unavailable);
                warn!("No session store configured, {} is local-only", code);
                return Some(code);
            }
            inner.status = inner.status.on_event(ConnectionEvent::ConnectRequested);
            inner.membership
        };

        let port = self.shared.port.as_ref()?;
        match self.shared.call(port.read_session(&code)).await {
            Ok(Some(doc)) => {
                {
                    let mut inner = self.lock().await;
                    if inner.membership != membership {
                        return Some(code);
                    }
                    inner.state.adopt(&doc);
                    sync_ticker(&self.shared, &mut inner);
                }
                self.finish_connect(&code, membership).await;
            }
            Ok(None) => {
                self.connect_failed(&code, membership, "session not found".into())
                    .await
            }
            Err(e) => self.connect_failed(&code, membership, e.to_string()).await,
        }
        Some(code)
    }

    /// Leave the current session.
    ///
    /// Cancels the subscription, any pending publish and the heartbeat, and
    /// deletes this device's presence entry in the background. The local
    /// game, including a running clock, carries on.
    pub async fn leave_session(&self) {
        let (code, was_online) = {
            let mut inner = self.lock().await;
            let Some(code) = inner.state.session_id().cloned() else {
                return;
            };
            inner.membership += 1;
            inner.subscription.cancel();
            inner.publisher.cancel();
            inner.heartbeat.cancel();
            let was_online = inner.status.is_online();
            inner.status = inner.status.on_event(ConnectionEvent::Left);
            inner.role = None;
            inner.state.unbind();
            inner.presence.clear();
            info!("Left session {}", code);
            (code, was_online)
        };

        if was_online {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                let Some(port) = shared.port.as_ref() else {
                    return;
                };
                match shared
                    .call(port.remove_presence(&code, &shared.device_id))
                    .await
                {
                    Ok(()) => debug!("Removed presence from session {}", code),
                    Err(e) => error!("Failed to remove presence from session {}: {}", code, e),
                }
            });
        }
    }

    async fn finish_connect(&self, code: &SessionCode, membership: u64) {
        let Some(port) = self.shared.port.as_ref() else {
            return;
        };
        let subscription = match self.shared.call(port.subscribe(code)).await {
            Ok(subscription) => subscription,
            Err(e) => return self.connect_failed(code, membership, e.to_string()).await,
        };

        let entry = {
            let mut inner = self.lock().await;
            if inner.membership != membership {
                return;
            }
            inner.status = inner.status.on_event(ConnectionEvent::Acknowledged);
            let weak = Arc::downgrade(&self.shared);
            inner
                .subscription
                .set(tokio::spawn(run_subscription(weak, subscription)));
            schedule_publish(&self.shared, &mut inner);
            info!("Connected to session {}", code);

            let entry = PresenceEntry::joined(self.shared.device_id.clone(), Timestamp::now());
            if let Some(period) = self.shared.config.presence.heartbeat() {
                let weak = Arc::downgrade(&self.shared);
                inner.heartbeat.set(tokio::spawn(run_heartbeat(
                    weak,
                    code.clone(),
                    entry.clone(),
                    period,
                )));
            }
            entry
        };

        let written = self.shared.call(port.put_presence(code, &entry)).await;
        let mut inner = self.lock().await;
        if inner.membership != membership {
            // Left while the write was in flight; it may have landed after
            // the leave's removal. A rejoin of the same code owns the entry.
            let rejoined = inner.state.session_id() == Some(code);
            drop(inner);
            if written.is_ok() && !rejoined {
                debug!("Withdrawing presence written after leaving {}", code);
                if let Err(e) = self
                    .shared
                    .call(port.remove_presence(code, &self.shared.device_id))
                    .await
                {
                    error!("Failed to remove presence from session {}: {}", code, e);
                }
            }
            return;
        }
        if let Err(e) = written {
            error!("Failed to write presence for session {}: {}", code, e);
            inner.status = inner.status.on_event(ConnectionEvent::Failed {
                reason: e.to_string(),
            });
        }
    }

    async fn connect_failed(&self, code: &SessionCode, membership: u64, reason: String) {
        let mut inner = self.lock().await;
        if inner.membership != membership {
            return;
        }
        warn!("Session {} unavailable, playing locally: {}", code, reason);
        inner.status = inner.status.on_event(ConnectionEvent::Failed { reason });
    }

    // ===========================================
    // Turn timer
    // ===========================================

    /// Give the turn to a participant and start their clock.
    pub async fn start(&self, id: ParticipantId) -> bool {
        self.host_update(|state| state.start(id))
            .await
            .unwrap_or(false)
    }

    /// Stop the clock.
    pub async fn pause(&self) -> bool {
        self.host_update(SessionState::pause).await.unwrap_or(false)
    }

    /// Restart the clock for the participant holding the turn.
    pub async fn resume(&self) -> bool {
        self.host_update(SessionState::resume).await.unwrap_or(false)
    }

    /// Pass the turn to the next participant.
    pub async fn advance_to_next(&self) -> bool {
        self.host_update(SessionState::advance_to_next)
            .await
            .unwrap_or(false)
    }

    /// Clear the turn and reset every clock.
    pub async fn reset(&self) -> bool {
        self.host_update(SessionState::reset).await.is_some()
    }

    // ===========================================
    // Roster and settings
    // ===========================================

    /// Add a participant. `None` if rejected.
    pub async fn add_participant(&self, name: Option<&str>) -> Option<ParticipantId> {
        self.host_update(|state| state.add_participant(name))
            .await
            .flatten()
    }

    /// Remove a participant.
    pub async fn remove_participant(&self, id: ParticipantId) -> bool {
        self.host_update(|state| state.remove_participant(id))
            .await
            .unwrap_or(false)
    }

    /// Rename a participant.
    ///
    /// Allowed for every role. A connected participant's rename stays local
    /// until the host's next snapshot replaces it.
    pub async fn rename_participant(&self, id: ParticipantId, name: &str) -> bool {
        self.update(|state| state.rename_participant(id, name)).await
    }

    /// Change the clock direction.
    pub async fn set_mode(&self, mode: TimerMode) -> bool {
        self.host_update(|state| state.set_mode(mode)).await.is_some()
    }

    /// Change the count-down allowance.
    pub async fn set_initial_seconds(&self, seconds: u64) -> bool {
        self.host_update(|state| state.set_initial_seconds(seconds))
            .await
            .is_some()
    }

    /// Change the game title.
    pub async fn set_title(&self, title: &str) -> bool {
        self.host_update(|state| state.set_title(title))
            .await
            .is_some()
    }

    /// Whether this device mirrors a connected host and may not change
    /// gameplay.
    pub async fn follows_host(&self) -> bool {
        follows_host(&*self.lock().await)
    }

    /// Like [`update`](Self::update), but `None` without applying `f` while
    /// this device follows a connected host.
    async fn host_update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut inner = self.lock().await;
        if follows_host(&inner) {
            debug!("Ignoring local change: following the host");
            return None;
        }
        Some(apply(&self.shared, &mut inner, f))
    }

    async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut inner = self.lock().await;
        apply(&self.shared, &mut inner, f)
    }

    // ===========================================
    // History
    // ===========================================

    /// Save the current game to history. `None` if no turn has started.
    pub async fn save_game(&self) -> Option<GameRecord> {
        let mut inner = self.lock().await;
        let Inner { state, history, .. } = &mut *inner;
        let record = history.save(state, Timestamp::now()).cloned();
        if let Some(record) = &record {
            info!("Saved game \"{}\" ({} in history)", record.name, history.len());
        }
        record
    }

    /// Saved games, newest first.
    pub async fn history(&self) -> Vec<GameRecord> {
        self.lock().await.history.records().to_vec()
    }

    /// The `n` most recently saved games.
    pub async fn recent_games(&self, n: usize) -> Vec<GameRecord> {
        self.lock().await.history.recent(n).to_vec()
    }

    // ===========================================
    // Read access
    // ===========================================

    /// A copy of the current game state.
    pub async fn state(&self) -> SessionState {
        self.lock().await.state.clone()
    }

    /// A copy of the current presence set.
    pub async fn presence(&self) -> PresenceSet {
        self.lock().await.presence.clone()
    }

    /// Devices counted as connected, honoring the staleness window.
    pub async fn connected_count(&self) -> usize {
        let stale_after = self.shared.config.presence.stale_after();
        self.lock()
            .await
            .presence
            .connected_count(Timestamp::now(), stale_after)
    }

    /// Current connection status.
    pub async fn status(&self) -> ConnectionStatus {
        self.lock().await.status
    }

    /// Whether the session is replicating.
    pub async fn is_online(&self) -> bool {
        self.lock().await.status.is_online()
    }

    /// This device's role in the current session.
    pub async fn role(&self) -> Option<Role> {
        self.lock().await.role
    }

    /// Code of the current session.
    pub async fn session_code(&self) -> Option<SessionCode> {
        self.lock().await.state.session_id().cloned()
    }

    /// Text for inviting other players. `None` outside a session.
    pub async fn share_text(&self) -> Option<String> {
        let inner = self.lock().await;
        let code = inner.state.session_id()?;
        Some(if inner.status.is_online() {
            format!(
                "Game ID: {}\n\nShare this ID with other players so they can join your game!",
                code
            )
        } else {
            format!("Game ID: {}\n\nNote: Running in local mode.", code)
        })
    }

    /// This client's device id.
    pub fn device_id(&self) -> &DeviceId {
        &self.shared.device_id
    }

    /// This client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

impl<P: ReplicationPort> Shared<P> {
    /// Bound a store call by the configured timeout.
    async fn call<T, F>(&self, fut: F) -> Result<T, PortError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        match tokio::time::timeout(self.config.sync.store_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout),
        }
    }
}

fn follows_host(inner: &Inner) -> bool {
    inner.role.is_some_and(|role| role.applies_inbound()) && inner.status.is_online()
}

/// Apply a local mutation, then re-arm the ticker and schedule a publish if
/// anything changed.
fn apply<P: ReplicationPort, R>(
    shared: &Arc<Shared<P>>,
    inner: &mut Inner,
    f: impl FnOnce(&mut SessionState) -> R,
) -> R {
    let before = inner.state.clone();
    let result = f(&mut inner.state);
    if inner.state != before {
        sync_ticker(shared, inner);
        schedule_publish(shared, inner);
    }
    result
}

/// Re-arm or stop the ticker if the running participant or mode changed.
fn sync_ticker<P: ReplicationPort>(shared: &Arc<Shared<P>>, inner: &mut Inner) {
    let ticking = inner.state.ticking();
    if ticking == inner.ticking {
        return;
    }
    inner.ticking = ticking;
    match ticking {
        Some((id, mode)) => {
            debug!("Ticker armed for participant {} ({})", id, mode);
            let period = shared.config.timer.tick_interval();
            inner
                .ticker
                .set(tokio::spawn(run_ticker(Arc::downgrade(shared), period)));
        }
        None => {
            debug!("Ticker stopped");
            inner.ticker.cancel();
        }
    }
}

/// Arm the debounced publish if this device is a connected host.
fn schedule_publish<P: ReplicationPort>(shared: &Arc<Shared<P>>, inner: &mut Inner) {
    let publishes = inner.role.is_some_and(|role| role.publishes());
    if !publishes || !inner.status.is_online() {
        return;
    }
    let weak = Arc::downgrade(shared);
    inner.publisher.arm(async move {
        if let Some(shared) = weak.upgrade() {
            publish_now(&shared).await;
        }
    });
}

async fn publish_now<P: ReplicationPort>(shared: &Arc<Shared<P>>) {
    let Some(port) = shared.port.as_ref() else {
        return;
    };
    let (code, snapshot) = {
        let mut inner = shared.inner.lock().await;
        let publishes = inner.role.is_some_and(|role| role.publishes());
        if !publishes || !inner.status.is_online() {
            return;
        }
        let Some(code) = inner.state.session_id().cloned() else {
            return;
        };
        let now = Timestamp::now();
        inner.state.touch(now);
        let snapshot = inner.state.snapshot(&shared.device_id, now);
        (code, snapshot)
    };

    match shared.call(port.publish(&code, &snapshot)).await {
        Ok(()) => debug!("Published snapshot for session {}", code),
        Err(e) => {
            error!("Failed to publish session {}: {}", code, e);
            let mut inner = shared.inner.lock().await;
            inner.status = inner.status.on_event(ConnectionEvent::Failed {
                reason: e.to_string(),
            });
        }
    }
}

async fn run_ticker<P: ReplicationPort>(weak: Weak<Shared<P>>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let mut inner = shared.inner.lock().await;
        if inner.state.tick() {
            schedule_publish(&shared, &mut inner);
        }
    }
}

async fn run_subscription<P: ReplicationPort>(weak: Weak<Shared<P>>, mut subscription: Subscription) {
    while let Some(doc) = subscription.next().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let mut inner = shared.inner.lock().await;
        let Some(role) = inner.role else {
            break;
        };
        let Inner {
            state, presence, ..
        } = &mut *inner;
        if merge_inbound(state, presence, role, &doc) {
            debug!("Applied inbound snapshot");
            sync_ticker(&shared, &mut inner);
        }
    }
    debug!("Subscription closed");
}

async fn run_heartbeat<P: ReplicationPort>(
    weak: Weak<Shared<P>>,
    code: SessionCode,
    entry: PresenceEntry,
    period: Duration,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let Some(port) = shared.port.as_ref() else {
            break;
        };
        let entry = PresenceEntry {
            last_seen: Timestamp::now(),
            ..entry.clone()
        };
        match shared.call(port.put_presence(&code, &entry)).await {
            Ok(()) => debug!("Refreshed presence for session {}", code),
            Err(e) => error!("Failed to refresh presence for session {}: {}", code, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{presence_path, MemoryStore, StoreWrite};
    use tokio::time::sleep;

    fn pid(n: u32) -> ParticipantId {
        ParticipantId::new(n)
    }

    fn client_with(
        config: ClientConfig,
        store: &MemoryStore,
        device: &str,
    ) -> SessionClient<MemoryStore> {
        SessionClient::with_device(config, Some(store.clone()), DeviceId::from_string(device))
    }

    fn host(store: &MemoryStore) -> SessionClient<MemoryStore> {
        client_with(ClientConfig::default(), store, "device_1_host")
    }

    fn guest(store: &MemoryStore) -> SessionClient<MemoryStore> {
        client_with(ClientConfig::default(), store, "device_2_guest")
    }

    // Let spawned tasks run without crossing a tick boundary.
    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    async fn elapsed(client: &SessionClient<MemoryStore>, id: ParticipantId) -> u64 {
        client.state().await.participant(id).unwrap().elapsed
    }

    // ===========================================
    // Session lifecycle
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn create_session_connects_and_registers_presence() {
        let store = MemoryStore::new();
        let host = host(&store);

        let code = host.create_session().await;

        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_eq!(host.status().await, ConnectionStatus::Connected);
        assert_eq!(host.role().await, Some(Role::Host));
        assert_eq!(host.session_code().await, Some(code.clone()));

        let doc = store.document(&code).unwrap();
        assert_eq!(doc.id, Some(code.clone()));
        assert_eq!(doc.host_id, Some(DeviceId::from_string("device_1_host")));
        assert_eq!(doc.is_running, Some(false));
        assert!(doc.presence.contains_key("device_1_host"));
        assert_eq!(store.subscriber_count(&code), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn host_scenario_add_start_tick_advance() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;

        let id = host.add_participant(None).await;
        assert_eq!(id, Some(pid(3)));
        assert_eq!(host.state().await.participants().len(), 3);

        assert!(host.start(pid(2)).await);
        let state = host.state().await;
        assert!(state.participant(pid(2)).unwrap().is_active);
        assert!(state.is_running());

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(elapsed(&host, pid(2)).await, 5);

        assert!(host.advance_to_next().await);
        let state = host.state().await;
        assert_eq!(state.active_participant_id(), Some(pid(3)));
        assert!(!state.participant(pid(2)).unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn join_adopts_remote_document() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        host.set_title("Catan").await;
        host.add_participant(Some("Carol")).await;
        sleep(Duration::from_secs(1)).await;

        let guest = guest(&store);
        let joined = guest.join_session(&code.as_str().to_lowercase()).await;

        assert_eq!(joined, Some(code.clone()));
        assert_eq!(guest.status().await, ConnectionStatus::Connected);
        assert_eq!(guest.role().await, Some(Role::Participant));
        let state = guest.state().await;
        assert_eq!(state.title(), "Catan");
        assert_eq!(state.participants().len(), 3);
        assert!(store.document(&code).unwrap().presence.contains_key("device_2_guest"));
    }

    #[tokio::test(start_paused = true)]
    async fn join_missing_session_plays_locally() {
        let store = MemoryStore::new();
        let guest = guest(&store);

        let code = guest.join_session("  nope12 ").await.unwrap();

        assert_eq!(code.as_str(), "NOPE12");
        assert_eq!(guest.status().await, ConnectionStatus::Error);
        assert_eq!(guest.session_code().await, Some(code));
        assert_eq!(guest.state().await.participants().len(), 2);

        assert!(guest.start(pid(1)).await);
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(elapsed(&guest, pid(1)).await, 2);
        assert!(store.writes().is_empty());

        let text = guest.share_text().await.unwrap();
        assert_eq!(text, "Game ID: NOPE12\n\nNote: Running in local mode.");
    }

    #[tokio::test(start_paused = true)]
    async fn join_with_empty_code_is_ignored() {
        let store = MemoryStore::new();
        let guest = guest(&store);

        assert_eq!(guest.join_session("   ").await, None);
        assert_eq!(guest.status().await, ConnectionStatus::Offline);
        assert_eq!(guest.session_code().await, None);
        assert_eq!(guest.role().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn no_store_means_local_only() {
        let client = SessionClient::<MemoryStore>::with_device(
            ClientConfig::default(),
            None,
            DeviceId::from_string("device_9_solo"),
        );
        let code = client.create_session().await;

        assert_eq!(client.status().await, ConnectionStatus::Offline);
        assert_eq!(client.role().await, Some(Role::Host));
        assert!(client.start(pid(1)).await);
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(elapsed(&client, pid(1)).await, 1);

        let text = client.share_text().await.unwrap();
        assert_eq!(text, format!("Game ID: {}\n\nNote: Running in local mode.", code));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_falls_back_to_error_status() {
        let store = MemoryStore::new();
        store.fail_next_write("permission denied");
        let host = host(&store);

        let code = host.create_session().await;

        assert_eq!(host.status().await, ConnectionStatus::Error);
        assert_eq!(store.subscriber_count(&code), 0);

        host.set_title("Offline game").await;
        sleep(Duration::from_secs(1)).await;
        assert!(store.publishes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_subscribe_falls_back_to_error_status() {
        let store = MemoryStore::new();
        store.fail_next_subscribe("listener limit");
        let host = host(&store);

        host.create_session().await;
        assert_eq!(host.status().await, ConnectionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let store = MemoryStore::new();
        store.set_latency(Some(Duration::from_secs(30)));
        let host = host(&store);

        host.create_session().await;
        assert_eq!(host.status().await, ConnectionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_on_join_is_error() {
        let store = MemoryStore::new();
        store.set_unavailable(Some("no network"));
        let guest = guest(&store);

        assert!(guest.join_session("ABC123").await.is_some());
        assert_eq!(guest.status().await, ConnectionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_removes_presence_and_keeps_playing() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        let guest = guest(&store);
        guest.join_session(code.as_str()).await;
        settle().await;
        assert_eq!(host.connected_count().await, 2);

        host.start(pid(1)).await;
        sleep(Duration::from_millis(600)).await;
        assert!(guest.state().await.is_running());
        guest.leave_session().await;
        settle().await;

        assert_eq!(guest.status().await, ConnectionStatus::Offline);
        assert_eq!(guest.session_code().await, None);
        assert_eq!(guest.role().await, None);
        assert!(!store
            .document(&code)
            .unwrap()
            .presence
            .contains_key("device_2_guest"));
        assert_eq!(host.connected_count().await, 1);
        assert_eq!(store.subscriber_count(&code), 1);

        // Local clock keeps running after leaving, and the game is ours.
        sleep(Duration::from_secs(2)).await;
        assert!(elapsed(&guest, pid(1)).await >= 2);
        assert!(!guest.follows_host().await);
        assert!(guest.pause().await);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_cancels_pending_publish() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;
        sleep(Duration::from_secs(1)).await;
        store.clear_writes();

        host.set_title("Never sent").await;
        host.leave_session().await;
        sleep(Duration::from_secs(2)).await;

        assert!(store.publishes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn leave_during_presence_write_withdraws_entry() {
        let store = MemoryStore::new();
        store.set_latency(Some(Duration::from_millis(100)));
        let host = host(&store);

        // create lands at 100ms, subscribe at 200ms, presence at 300ms.
        let (code, ()) = tokio::join!(host.create_session(), async {
            sleep(Duration::from_millis(250)).await;
            host.leave_session().await;
        });
        sleep(Duration::from_secs(1)).await;

        let path = presence_path(&code, host.device_id());
        let removals = store
            .writes()
            .iter()
            .filter(|w| matches!(w, StoreWrite::Remove { path: p } if *p == path))
            .count();
        assert_eq!(removals, 2);
        assert!(matches!(store.writes().last(), Some(StoreWrite::Remove { .. })));
        assert!(store.document(&code).unwrap().presence.is_empty());
        assert_eq!(host.status().await, ConnectionStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn new_session_leaves_previous() {
        let store = MemoryStore::new();
        let host = host(&store);
        let first = host.create_session().await;
        let second = host.create_session().await;
        settle().await;

        assert_ne!(first, second);
        assert!(store.document(&first).unwrap().presence.is_empty());
        assert!(store
            .document(&second)
            .unwrap()
            .presence
            .contains_key("device_1_host"));
        assert_eq!(store.subscriber_count(&first), 0);
    }

    // ===========================================
    // Publication
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_publishes_once() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;
        sleep(Duration::from_secs(1)).await;
        store.clear_writes();

        for name in ["A", "Al", "Ali", "Alic", "Alice"] {
            host.rename_participant(pid(1), name).await;
            sleep(Duration::from_millis(100)).await;
        }
        // Last change at t+400ms; nothing before t+900ms.
        sleep(Duration::from_millis(300)).await;
        assert!(store.publishes().is_empty());

        sleep(Duration::from_millis(200)).await;
        let publishes = store.publishes();
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0]["participants"][0]["name"], "Alice");
        assert_eq!(publishes[0]["hostId"], "device_1_host");
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_carries_gameplay_fields() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        host.set_mode(TimerMode::CountDown).await;
        host.set_initial_seconds(90).await;
        host.set_title("Gloomhaven").await;
        host.start(pid(2)).await;
        host.pause().await;
        sleep(Duration::from_secs(1)).await;

        let doc = store.document(&code).unwrap();
        assert_eq!(doc.mode, Some(TimerMode::CountDown));
        assert_eq!(doc.initial_seconds, Some(90));
        assert_eq!(doc.title.as_deref(), Some("Gloomhaven"));
        assert_eq!(doc.active_participant_id, Some(Some(pid(2))));
        assert_eq!(doc.is_running, Some(false));
        assert_eq!(doc.has_started, Some(true));
        assert!(doc.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_state_does_not_publish() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;
        sleep(Duration::from_secs(1)).await;
        store.clear_writes();

        assert!(!host.resume().await);
        assert!(!host.remove_participant(pid(1)).await);
        assert!(!host.pause().await);
        sleep(Duration::from_secs(1)).await;

        assert!(store.publishes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connected_participant_cannot_change_gameplay() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        let guest = guest(&store);
        guest.join_session(code.as_str()).await;
        sleep(Duration::from_secs(1)).await;
        assert!(guest.follows_host().await);
        assert!(!host.follows_host().await);
        store.clear_writes();
        let before = guest.state().await;

        assert!(!guest.start(pid(2)).await);
        assert!(!guest.pause().await);
        assert!(!guest.resume().await);
        assert!(!guest.advance_to_next().await);
        assert!(!guest.reset().await);
        assert_eq!(guest.add_participant(None).await, None);
        assert!(!guest.remove_participant(pid(1)).await);
        assert!(!guest.set_mode(TimerMode::CountDown).await);
        assert!(!guest.set_initial_seconds(30).await);
        assert!(!guest.set_title("Guest edit").await);
        sleep(Duration::from_millis(3_200)).await;

        assert_eq!(guest.state().await, before);
        assert!(store.publishes().is_empty());
        assert!(!host.state().await.is_running());

        // Renaming stays a local edit.
        assert!(guest.rename_participant(pid(1), "Me").await);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(guest.state().await.participant(pid(1)).unwrap().name, "Me");
        assert!(store.publishes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_keeps_connected_status() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        sleep(Duration::from_secs(1)).await;

        store.fail_next_write("rejected");
        host.set_title("Lost").await;
        sleep(Duration::from_secs(1)).await;
        assert_eq!(host.status().await, ConnectionStatus::Connected);
        assert_eq!(store.document(&code).unwrap().title.as_deref(), Some(""));

        host.set_title("Kept").await;
        sleep(Duration::from_secs(1)).await;
        assert_eq!(store.document(&code).unwrap().title.as_deref(), Some("Kept"));
    }

    // ===========================================
    // Subscription and role gating
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn participant_follows_host() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        let guest = guest(&store);
        guest.join_session(code.as_str()).await;

        host.set_title("Wingspan").await;
        host.start(pid(1)).await;
        sleep(Duration::from_millis(700)).await;

        let state = guest.state().await;
        assert_eq!(state.title(), "Wingspan");
        assert_eq!(state.active_participant_id(), Some(pid(1)));
        assert!(state.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn host_ignores_inbound_gameplay() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        let guest = guest(&store);
        guest.join_session(code.as_str()).await;
        settle().await;

        let mut other = SessionState::default();
        other.set_title("Intruder");
        store
            .publish(
                &code,
                &other.snapshot(&DeviceId::from_string("device_7_rogue"), Timestamp::now()),
            )
            .await
            .unwrap();
        settle().await;

        assert_eq!(host.state().await.title(), "");
        assert_eq!(guest.state().await.title(), "Intruder");
        // Presence still flows to the host.
        assert_eq!(host.presence().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_stop_halts_participant_ticker() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;
        let guest = guest(&store);
        guest.join_session(code.as_str()).await;

        host.start(pid(1)).await;
        sleep(Duration::from_millis(600)).await;
        assert!(guest.state().await.ticking().is_some());

        host.pause().await;
        sleep(Duration::from_millis(600)).await;
        assert_eq!(guest.state().await.ticking(), None);
    }

    // ===========================================
    // Ticker
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_control_ticks() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;

        host.start(pid(1)).await;
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(elapsed(&host, pid(1)).await, 2);

        host.pause().await;
        sleep(Duration::from_secs(3)).await;
        assert_eq!(elapsed(&host, pid(1)).await, 2);

        host.resume().await;
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(elapsed(&host, pid(1)).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_floors_at_zero() {
        let mut config = ClientConfig::default();
        config.timer.mode = TimerMode::CountDown;
        config.timer.initial_seconds = 2;
        let store = MemoryStore::new();
        let host = client_with(config, &store, "device_1_host");
        host.create_session().await;

        host.start(pid(1)).await;
        sleep(Duration::from_secs(5)).await;
        assert_eq!(elapsed(&host, pid(1)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_turn_moves_ticks() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;

        host.start(pid(1)).await;
        sleep(Duration::from_millis(1_500)).await;
        host.start(pid(2)).await;
        sleep(Duration::from_millis(2_500)).await;

        assert_eq!(elapsed(&host, pid(1)).await, 1);
        assert_eq!(elapsed(&host, pid(2)).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_active_participant_stops_ticker() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;
        host.add_participant(None).await;

        host.start(pid(3)).await;
        assert!(host.remove_participant(pid(3)).await);
        sleep(Duration::from_secs(2)).await;

        let state = host.state().await;
        assert!(!state.is_running());
        assert_eq!(state.total_seconds(), 0);
    }

    // ===========================================
    // Presence
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_not_counted_when_window_set() {
        let mut config = ClientConfig::default();
        config.presence.stale_after_secs = 30;
        let store = MemoryStore::new();
        let host = client_with(config, &store, "device_1_host");
        let code = host.create_session().await;

        let ghost = PresenceEntry {
            device_id: DeviceId::from_string("device_0_ghost"),
            joined_at: Timestamp::from_millis(1),
            last_seen: Timestamp::from_millis(1),
        };
        store.put_presence(&code, &ghost).await.unwrap();
        settle().await;

        assert_eq!(host.presence().await.len(), 2);
        assert_eq!(host.connected_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_count_by_default() {
        let store = MemoryStore::new();
        let host = host(&store);
        let code = host.create_session().await;

        let ghost = PresenceEntry {
            device_id: DeviceId::from_string("device_0_ghost"),
            joined_at: Timestamp::from_millis(1),
            last_seen: Timestamp::from_millis(1),
        };
        store.put_presence(&code, &ghost).await.unwrap();
        settle().await;

        assert_eq!(host.connected_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_refreshes_presence() {
        let mut config = ClientConfig::default();
        config.presence.heartbeat_secs = 10;
        let store = MemoryStore::new();
        let host = client_with(config, &store, "device_1_host");
        let code = host.create_session().await;
        store.clear_writes();

        sleep(Duration::from_secs(25)).await;

        let path = presence_path(&code, host.device_id());
        let refreshes = store
            .writes()
            .iter()
            .filter(|w| matches!(w, StoreWrite::Set { path: p, .. } if *p == path))
            .count();
        assert_eq!(refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_heartbeat_by_default() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;
        sleep(Duration::from_secs(1)).await;
        store.clear_writes();

        sleep(Duration::from_secs(60)).await;
        assert!(store.writes().is_empty());
    }

    // ===========================================
    // History and sharing
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn save_game_requires_started_game() {
        let store = MemoryStore::new();
        let host = host(&store);
        host.create_session().await;

        assert!(host.save_game().await.is_none());

        host.start(pid(1)).await;
        sleep(Duration::from_millis(1_500)).await;
        let record = host.save_game().await.unwrap();
        assert_eq!(record.players[0].seconds, 1);
        assert_eq!(host.history().await.len(), 1);
        assert_eq!(host.recent_games(3).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn share_text_online_and_outside_session() {
        let store = MemoryStore::new();
        let host = host(&store);
        assert!(host.share_text().await.is_none());

        let code = host.create_session().await;
        assert_eq!(
            host.share_text().await.unwrap(),
            format!(
                "Game ID: {}\n\nShare this ID with other players so they can join your game!",
                code
            )
        );
    }
}

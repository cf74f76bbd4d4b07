//! Replication port for bgtimer.
//!
//! This module provides a narrow, pluggable interface to the remote
//! document store that carries shared sessions (a hosted realtime database,
//! or [`MemoryStore`] for tests and single-process play).
//!
//! # Store layout
//!
//! ```text
//! sessions/{code}                      SessionDocument
//! sessions/{code}/presence/{deviceId}  PresenceEntry
//! ```
//!
//! Subscriptions deliver the full `sessions/{code}` subtree, presence
//! included, every time anything under it changes.

mod memory;

pub use memory::{MemoryStore, StoreWrite};

use async_trait::async_trait;
use bgtimer_types::{
    DeviceId, PresenceEntry, SessionCode, SessionDocument, SessionSnapshot, TypesError,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Replication port errors.
#[derive(Debug, Error)]
pub enum PortError {
    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused a write.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// A read failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A subscription could not be opened.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// The store did not answer in time.
    #[error("store call timed out")]
    Timeout,

    /// A stored document could not be decoded or encoded.
    #[error("document error: {0}")]
    Document(#[from] TypesError),
}

/// Path of a session document.
pub fn session_path(code: &SessionCode) -> String {
    format!("sessions/{}", code)
}

/// Path of one device's presence entry.
pub fn presence_path(code: &SessionCode, device_id: &DeviceId) -> String {
    format!("sessions/{}/presence/{}", code, device_id)
}

/// A live stream of session snapshots.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SessionDocument>,
}

impl Subscription {
    /// Wrap a receiver fed by a store adapter.
    pub fn new(rx: mpsc::UnboundedReceiver<SessionDocument>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot. `None` once the store closes the stream.
    pub async fn next(&mut self) -> Option<SessionDocument> {
        self.rx.recv().await
    }
}

/// The operations the session client needs from a remote store.
///
/// Implementations map these onto a concrete store API. All calls are
/// best-effort; the client bounds each one with a timeout.
#[async_trait]
pub trait ReplicationPort: Send + Sync + 'static {
    /// Write a new session document, replacing anything at its path.
    async fn create_session(
        &self,
        code: &SessionCode,
        doc: &SessionDocument,
    ) -> Result<(), PortError>;

    /// Read a session document. `None` if nothing is stored at its path.
    async fn read_session(&self, code: &SessionCode) -> Result<Option<SessionDocument>, PortError>;

    /// Merge a gameplay snapshot into a session document.
    ///
    /// Top-level keys in the snapshot replace stored keys. Keys the snapshot
    /// does not carry, such as presence, are kept.
    async fn publish(&self, code: &SessionCode, snapshot: &SessionSnapshot)
        -> Result<(), PortError>;

    /// Subscribe to a session document.
    ///
    /// The current document, if any, is delivered first.
    async fn subscribe(&self, code: &SessionCode) -> Result<Subscription, PortError>;

    /// Write this device's presence entry.
    async fn put_presence(&self, code: &SessionCode, entry: &PresenceEntry)
        -> Result<(), PortError>;

    /// Delete a device's presence entry.
    async fn remove_presence(&self, code: &SessionCode, device_id: &DeviceId)
        -> Result<(), PortError>;
}

//! # bgtimer-client
//!
//! Replication client for the bgtimer multiplayer turn timer.
//!
//! This is the library a front end drives: it owns the game state, runs the
//! once-per-second ticker, and keeps devices in step through a remote
//! document store.
//!
//! ## Features
//!
//! - **Host-authoritative replication**: the host publishes, participants follow
//! - **Debounced publishing**: bursts of edits collapse into one write
//! - **Graceful degradation**: any store failure falls back to local play
//! - **Pluggable store**: [`ReplicationPort`] trait, with [`MemoryStore`] built in
//!
//! ## Example
//!
//! ```ignore
//! use bgtimer_client::{ClientConfig, MemoryStore, SessionClient};
//!
//! let client = SessionClient::new(ClientConfig::default(), Some(MemoryStore::new()));
//! let code = client.create_session().await;
//! client.advance_to_next().await;
//! println!("{}", client.share_text().await.unwrap_or_default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod deferred;
pub mod port;

pub use client::SessionClient;
pub use config::{ClientConfig, ConfigError, PresenceConfig, SyncConfig, TimerConfig};
pub use deferred::{DeferredTask, TaskSlot};
pub use port::{
    presence_path, session_path, MemoryStore, PortError, ReplicationPort, StoreWrite,
    Subscription,
};

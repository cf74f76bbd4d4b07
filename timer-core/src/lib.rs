//! # bgtimer-core
//!
//! Pure turn-timer and session logic for bgtimer (no I/O, instant tests).
//!
//! Every module here takes input and produces output without side effects:
//! no clocks, no tasks, no network. `bgtimer-client` owns the tick task, the
//! debounced publisher and the remote store, and calls into this crate for
//! every state change.
//!
//! - [`session`]: session state, turn timer and roster mutators
//! - [`connection`]: connection status transitions
//! - [`replication`]: host/participant roles and the inbound merge policy
//! - [`presence`]: the local presence set
//! - [`history`]: saved game records and time formatting

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod history;
pub mod presence;
pub mod replication;
pub mod session;

pub use connection::{ConnectionEvent, ConnectionStatus};
pub use history::{format_date, format_time, GameHistory, GameRecord, PlayerResult};
pub use presence::PresenceSet;
pub use replication::{merge_inbound, Role};
pub use session::{starting_time, SessionState, DEFAULT_INITIAL_SECONDS, MIN_PARTICIPANTS};

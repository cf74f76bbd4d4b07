//! # bgtimer-types
//!
//! Identity and document types for the bgtimer multiplayer turn timer.
//!
//! This crate provides the foundational types used across all bgtimer crates:
//! - [`SessionCode`], [`DeviceId`], [`ParticipantId`], [`RecordId`], [`Timestamp`] - Identity types
//! - [`SessionDocument`], [`SessionSnapshot`], [`PresenceEntry`] - Remote store shapes
//! - [`Participant`], [`TimerMode`] - Gameplay values shared by every layer
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod document;
mod error;
mod ids;

pub use document::{Participant, PresenceEntry, SessionDocument, SessionSnapshot, TimerMode};
pub use error::TypesError;
pub use ids::{DeviceId, ParticipantId, RecordId, SessionCode, Timestamp, SESSION_CODE_LEN};

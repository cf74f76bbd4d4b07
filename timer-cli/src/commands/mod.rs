//! CLI command implementations.

pub mod code;
pub mod demo;
pub mod play;
pub mod view;

//! Generate a session code.

use bgtimer_types::{DeviceId, SessionCode};

/// Run the code command.
pub fn run() {
    println!("Session code: {}", SessionCode::generate());
    println!("Device ID:    {}", DeviceId::for_process());
}

//! Host and participant side by side.

use anyhow::{bail, Result};
use bgtimer_client::{ClientConfig, MemoryStore, SessionClient};
use bgtimer_types::{DeviceId, ParticipantId};
use std::time::Duration;

use super::view::render_client;

/// Run the demo command.
pub async fn run(config: ClientConfig, seconds: u64) -> Result<()> {
    let store = MemoryStore::new();
    // Enough for one debounced publish to land and be applied.
    let settle = config.sync.publish_debounce() + Duration::from_millis(200);

    let host = SessionClient::with_device(
        config.clone(),
        Some(store.clone()),
        DeviceId::from_string("demo-host"),
    );
    let guest = SessionClient::with_device(
        config,
        Some(store.clone()),
        DeviceId::from_string("demo-guest"),
    );

    let code = host.create_session().await;
    println!("Host created session {} ({})", code, host.status().await);
    if guest.join_session(code.as_str()).await.is_none() {
        bail!("could not join session {}", code);
    }
    println!("Participant joined ({})", guest.status().await);

    host.set_title("Demo game").await;
    host.start(ParticipantId::new(1)).await;
    println!("Player 1 takes the first turn for {}s", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    host.advance_to_next().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    host.pause().await;
    tokio::time::sleep(settle).await;

    println!();
    println!("Host view");
    print!("{}", render_client(&host).await);
    println!();
    println!("Participant view");
    print!("{}", render_client(&guest).await);

    guest.leave_session().await;
    host.leave_session().await;
    Ok(())
}

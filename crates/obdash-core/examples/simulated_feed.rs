//! Simulated dashboard feed.
//!
//! Runs the telemetry loop without an adapter for a few seconds, printing
//! every event a dashboard subscriber would receive.
//!
//! Run: `cargo run --example simulated_feed`

use std::sync::Arc;
use std::time::Duration;

use obdash_core::{HourlyLog, Sampler, Store, SystemClock, TelemetryLoop};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let dir = std::env::temp_dir().join("obdash-simulated-feed");
    let store = Arc::new(Store::default());
    let fast = TelemetryLoop::new(
        Sampler::new(None, Duration::from_secs(2)),
        HourlyLog::create(&dir)?,
        store.clone(),
        Arc::new(SystemClock),
        Duration::from_millis(500),
    );

    let mut sub = store.subscribe();
    for event in &sub.replay {
        println!("replay {}", serde_json::to_string(event)?);
    }

    let token = CancellationToken::new();
    let handle = tokio::spawn(fast.run(token.clone()));

    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Ok(event) = sub.receiver.recv() => {
                println!("live   {}", serde_json::to_string(&event)?);
            }
        }
    }

    token.cancel();
    let _ = handle.await;
    println!("\nLogs written to {}", dir.display());
    Ok(())
}

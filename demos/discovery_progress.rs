//! Follow a device discovery job until every device has been processed.
//!
//! Reads `FLEET_TRACKER_*` settings from the environment (or `.env`).
//!
//! ```sh
//! FLEET_TRACKER_ENDPOINT=http://localhost:8080/api cargo run --example discovery_progress
//! ```

use fleet_tracker::{DeviceInventory, DiscoveryProbe, LifecycleClient, Poller, TrackerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrackerConfig::from_env()?;
    let client = LifecycleClient::from_config(&config);

    let poller = Poller::new(DiscoveryProbe::new(client.clone()), config.poll_interval);
    let mut updates = poller.reader();
    poller.start();

    loop {
        tokio::select! {
            status = updates.changed() => {
                let Some(Some(status)) = status else { continue };
                let progress = status.progress();
                println!(
                    "  {}/{} processed ({}%): {} ok, {} pending, {} failed",
                    progress.processed_count,
                    progress.total_count,
                    progress.percent(),
                    status.success,
                    status.pending,
                    status.failed
                );
            }
            _ = poller.wait_complete() => break,
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                println!("Stopped");
                return Ok(());
            }
        }
    }
    println!("Discovery complete");

    let inventory = DeviceInventory::new(client);
    inventory.refresh().await?;
    for device in inventory.displayable() {
        println!(
            "  {:<24} {:<12} {:<10} {}",
            device.master_identifier,
            device.serial_number,
            device.os_version,
            String::from(device.status)
        );
    }

    Ok(())
}

//! Track a batch firmware upgrade step by step.
//!
//! Prints how many devices sit at each tracked step on every refresh, and
//! the step log of the most recently active flow once the batch finishes.
//!
//! ```sh
//! cargo run --example batch_upgrade -- <task-id>
//! ```

use fleet_tracker::{
    BatchUpgradeProbe, LifecycleClient, Poller, StepFilter, StepTimeline, TrackerConfig,
};
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

    let Some(task_id) = std::env::args().nth(1) else {
        eprintln!("usage: batch_upgrade <task-id>");
        return Ok(());
    };

    let config = TrackerConfig::from_env()?;
    let client = LifecycleClient::from_config(&config);

    let probe = BatchUpgradeProbe::new(client.clone(), task_id.as_str(), config.tracked_steps.clone());
    let poller = Poller::new(probe, config.poll_interval);
    let mut views = poller.reader();
    poller.start();

    loop {
        tokio::select! {
            view = views.changed() => {
                let Some(Some(view)) = view else { continue };
                println!("{} devices, {} events", view.aggregate.all, view.event_count);
                for step in &config.tracked_steps {
                    println!("  {:<28} {}", step.label(), view.aggregate.count(step));
                }
            }
            _ = poller.wait_complete() => break,
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                return Ok(());
            }
        }
    }
    println!("Batch {} complete", task_id);

    let Some(view) = poller.snapshot() else { return Ok(()) };
    let Some(latest) = view.devices_at(&StepFilter::All).first().map(|e| e.flow_instance_id.clone()) else {
        return Ok(());
    };

    let logs = client.flow_logs(&latest, &config.tracked_steps).await?;
    let timeline = StepTimeline::derive(&logs, &config.tracked_steps);
    println!(
        "Flow {}: {} of {} steps completed, {} failed",
        latest,
        timeline.completed_count(),
        timeline.steps().len(),
        timeline.failed_count()
    );
    println!("{}", timeline.console_transcript());

    Ok(())
}

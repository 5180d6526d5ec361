//! # fleet-tracker
//!
//! Async Rust client for a network-device lifecycle backend: device
//! discovery, batch firmware upgrades, technician rescheduling, and
//! service-order editing.
//!
//! Provides a typed REST client, a generic interval [`Poller`] that stops
//! itself once a job completes, and a reconciler that turns raw workflow
//! step events into a per-device, per-step view of an upgrade batch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fleet_tracker::{BatchUpgradeProbe, LifecycleClient, Poller, StepFilter, TrackerConfig};
//!
//! # async fn example() -> fleet_tracker::Result<()> {
//! let config = TrackerConfig::from_env()?;
//! let client = LifecycleClient::from_config(&config);
//!
//! // Watch an upgrade batch until every device has finished
//! let probe = BatchUpgradeProbe::new(client, "task-42", config.tracked_steps.clone());
//! let poller = Poller::new(probe, config.poll_interval);
//! poller.start();
//! poller.wait_complete().await;
//!
//! if let Some(view) = poller.snapshot() {
//!     for step in &config.tracked_steps {
//!         println!("{}: {}", step.label(), view.aggregate.count(step));
//!     }
//!     for event in view.devices_at(&StepFilter::All) {
//!         println!("{} at {} ({})", event.device_id, event.step, event.status);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod poller;
pub mod probe;
pub mod reconcile;
pub mod search;
pub mod store;
pub mod timeline;
pub mod tree;
pub mod types;

pub use client::{slot_window, LifecycleClient};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use inventory::{DeviceInventory, InventoryState};
pub use poller::{PollStats, Poller, PollerState, Probe};
pub use probe::{BatchUpgradeProbe, DiscoveryProbe, FlowLogProbe};
pub use reconcile::{ReconciledView, Reconciler, StepAggregate, StepFilter};
pub use search::{CustomerSearch, LatestRequest};
pub use store::{Store, StoreReader};
pub use timeline::{StepState, StepTimeline};
pub use tree::{NodeKind, ServiceNode, ServiceOrder, ServiceTree};
pub use types::{
    Contact, CreateCustomerPayload, Device, DeviceStatus, DiscoveryStatus, ExecutionStatus, JobProgress,
    Page, Site, Step, StepLogEntry, WorkflowExecutionEvent, WorkflowExecutionFilter,
};

use std::sync::Mutex;

use crate::client::LifecycleClient;
use crate::error::Result;
use crate::poller::Probe;
use crate::reconcile::{ReconciledView, Reconciler};
use crate::store::StoreReader;
use crate::timeline::StepTimeline;
use crate::types::{DiscoveryStatus, Step, StepLogEntry, WorkflowExecutionEvent};

/// Polls `GET /devices/status` until every discovered device is processed.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe {
    client: LifecycleClient,
}

impl DiscoveryProbe {
    pub fn new(client: LifecycleClient) -> Self {
        Self { client }
    }
}

impl Probe for DiscoveryProbe {
    type Response = DiscoveryStatus;
    type Snapshot = DiscoveryStatus;

    async fn fetch(&self) -> Result<DiscoveryStatus> {
        self.client.discovery_status().await
    }

    fn accept(&self, fetched: Result<DiscoveryStatus>) -> Result<DiscoveryStatus> {
        fetched
    }

    fn is_complete(&self, status: &DiscoveryStatus) -> bool {
        status.progress().is_complete()
    }

    fn name(&self) -> &str {
        "discovery"
    }
}

/// Polls a batch upgrade task and reconciles its workflow events into a
/// per-step view. Complete once every device finished successfully.
pub struct BatchUpgradeProbe {
    client: LifecycleClient,
    task_id: String,
    reconciler: Mutex<Reconciler>,
}

impl BatchUpgradeProbe {
    pub fn new(client: LifecycleClient, task_id: impl Into<String>, tracked_steps: Vec<Step>) -> Self {
        Self {
            client,
            task_id: task_id.into(),
            reconciler: Mutex::new(Reconciler::new(tracked_steps)),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Read-only view kept by the reconciler. Unlike the poller snapshot it
    /// starts out listing every tracked step at zero. Only responses the
    /// poller accepts reach it.
    pub fn view(&self) -> StoreReader<ReconciledView> {
        self.reconciler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .reader()
    }
}

impl Probe for BatchUpgradeProbe {
    type Response = Vec<WorkflowExecutionEvent>;
    type Snapshot = ReconciledView;

    async fn fetch(&self) -> Result<Vec<WorkflowExecutionEvent>> {
        self.client.task_workflows(&self.task_id).await
    }

    fn accept(&self, fetched: Result<Vec<WorkflowExecutionEvent>>) -> Result<ReconciledView> {
        self.reconciler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(fetched)
    }

    fn is_complete(&self, view: &ReconciledView) -> bool {
        view.batch_complete
    }

    fn name(&self) -> &str {
        "batch-upgrade"
    }
}

/// Polls the step log of one upgrade flow until its `flow-complete` marker
/// succeeds.
#[derive(Debug, Clone)]
pub struct FlowLogProbe {
    client: LifecycleClient,
    flow_id: String,
    steps: Vec<Step>,
}

impl FlowLogProbe {
    pub fn new(client: LifecycleClient, flow_id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            client,
            flow_id: flow_id.into(),
            steps,
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }
}

impl Probe for FlowLogProbe {
    type Response = Vec<StepLogEntry>;
    type Snapshot = StepTimeline;

    async fn fetch(&self) -> Result<Vec<StepLogEntry>> {
        self.client.flow_logs(&self.flow_id, &self.steps).await
    }

    fn accept(&self, fetched: Result<Vec<StepLogEntry>>) -> Result<StepTimeline> {
        fetched.map(|logs| StepTimeline::derive(&logs, &self.steps))
    }

    fn is_complete(&self, timeline: &StepTimeline) -> bool {
        timeline.is_flow_complete()
    }

    fn name(&self) -> &str {
        "flow-log"
    }
}

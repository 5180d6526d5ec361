use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::store::{Store, StoreReader};
use crate::types::{ExecutionStatus, Step, WorkflowExecutionEvent};

/// Newest event per device, keyed by device id.
pub type DeviceLatestState = BTreeMap<String, WorkflowExecutionEvent>;

/// Reduce an event log to the newest event for each device.
///
/// Newest means the greatest `last_updated_at`. Equal timestamps fall back
/// to the greater `flow_instance_id`; a full tie keeps the later event in
/// input order.
pub fn latest_by_device(events: &[WorkflowExecutionEvent]) -> DeviceLatestState {
    let mut latest = DeviceLatestState::new();
    for event in events {
        match latest.get(&event.device_id) {
            Some(current) if !supersedes(event, current) => {}
            _ => {
                latest.insert(event.device_id.clone(), event.clone());
            }
        }
    }
    latest
}

fn supersedes(candidate: &WorkflowExecutionEvent, current: &WorkflowExecutionEvent) -> bool {
    (candidate.last_updated_at, &candidate.flow_instance_id)
        >= (current.last_updated_at, &current.flow_instance_id)
}

/// True when there is at least one device and every device's newest event
/// is a completed success.
pub fn batch_complete(latest: &DeviceLatestState) -> bool {
    !latest.is_empty()
        && latest
            .values()
            .all(|e| e.completed && e.status == ExecutionStatus::Success)
}

/// Number of devices currently sitting at each tracked step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepAggregate {
    /// Distinct devices seen, whatever their step.
    pub all: usize,
    /// Per tracked step. Every tracked step is present, possibly at zero.
    pub per_step: BTreeMap<Step, usize>,
}

impl StepAggregate {
    pub fn from_latest(latest: &DeviceLatestState, tracked: &[Step]) -> Self {
        let mut per_step: BTreeMap<Step, usize> =
            tracked.iter().map(|s| (s.clone(), 0)).collect();
        for event in latest.values() {
            // Steps outside the tracked list (flow-complete included) only count toward `all`.
            if let Some(count) = per_step.get_mut(&event.step) {
                *count += 1;
            }
        }
        Self {
            all: latest.len(),
            per_step,
        }
    }

    pub fn count(&self, step: &Step) -> usize {
        self.per_step.get(step).copied().unwrap_or(0)
    }

    /// Sum over tracked steps. Never exceeds [`all`](Self::all).
    pub fn tracked_total(&self) -> usize {
        self.per_step.values().sum()
    }
}

/// Which devices to list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepFilter {
    #[default]
    All,
    At(Step),
}

/// Display-ready state derived from one event fetch.
#[derive(Debug, Clone, Default)]
pub struct ReconciledView {
    pub latest: DeviceLatestState,
    pub aggregate: StepAggregate,
    pub batch_complete: bool,
    /// Number of raw events the view was built from.
    pub event_count: usize,
}

impl ReconciledView {
    /// Full recompute from an event list.
    pub fn build(events: &[WorkflowExecutionEvent], tracked: &[Step]) -> Self {
        let latest = latest_by_device(events);
        let aggregate = StepAggregate::from_latest(&latest, tracked);
        let batch_complete = batch_complete(&latest);
        Self {
            latest,
            aggregate,
            batch_complete,
            event_count: events.len(),
        }
    }

    /// A view with no devices but every tracked step listed at zero.
    pub fn empty(tracked: &[Step]) -> Self {
        Self::build(&[], tracked)
    }

    /// Newest events for the devices matching `filter`, newest first.
    pub fn devices_at(&self, filter: &StepFilter) -> Vec<&WorkflowExecutionEvent> {
        let mut rows: Vec<&WorkflowExecutionEvent> = self
            .latest
            .values()
            .filter(|e| match filter {
                StepFilter::All => true,
                StepFilter::At(step) => &e.step == step,
            })
            .collect();
        rows.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        rows
    }
}

/// Owns the reconciled view for one batch and applies fetch results to it.
///
/// A failed fetch empties the working event list but leaves the published
/// view untouched, so consumers keep showing the last good state.
#[derive(Debug)]
pub struct Reconciler {
    tracked: Vec<Step>,
    working: Vec<WorkflowExecutionEvent>,
    view: Store<ReconciledView>,
}

impl Reconciler {
    pub fn new(tracked: Vec<Step>) -> Self {
        let view = Store::new(ReconciledView::empty(&tracked));
        Self {
            tracked,
            working: Vec::new(),
            view,
        }
    }

    pub fn tracked_steps(&self) -> &[Step] {
        &self.tracked
    }

    /// Apply one fetch outcome, returning the freshly published view. A
    /// failure is handed back unchanged after clearing the working list.
    pub fn apply(&mut self, fetched: Result<Vec<WorkflowExecutionEvent>>) -> Result<ReconciledView> {
        match fetched {
            Ok(events) => {
                let view = ReconciledView::build(&events, &self.tracked);
                debug!(
                    events = events.len(),
                    devices = view.aggregate.all,
                    batch_complete = view.batch_complete,
                    "Reconciled workflow events"
                );
                self.working = events;
                self.view.set(view.clone());
                Ok(view)
            }
            Err(e) => {
                debug!(error = %e, "Workflow fetch failed, keeping previous view");
                self.working.clear();
                Err(e)
            }
        }
    }

    /// Events from the most recent successful fetch, or empty after a failure.
    pub fn working_events(&self) -> &[WorkflowExecutionEvent] {
        &self.working
    }

    pub fn view(&self) -> ReconciledView {
        self.view.snapshot()
    }

    pub fn reader(&self) -> StoreReader<ReconciledView> {
        self.view.reader()
    }
}

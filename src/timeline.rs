use std::collections::HashMap;

use crate::types::{ExecutionStatus, Step, StepLogEntry};

/// Where a single step of one flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Per-step progress of one upgrade flow, derived from its step log.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTimeline {
    steps: Vec<Step>,
    states: Vec<StepState>,
    logs_by_step: HashMap<Step, Vec<StepLogEntry>>,
    entries: Vec<StepLogEntry>,
    flow_complete: bool,
}

impl StepTimeline {
    /// Derive step states for `steps` (in execution order) from `logs`.
    pub fn derive(logs: &[StepLogEntry], steps: &[Step]) -> Self {
        let mut entries = logs.to_vec();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut logs_by_step: HashMap<Step, Vec<StepLogEntry>> = HashMap::new();
        for entry in &entries {
            logs_by_step
                .entry(entry.step.clone())
                .or_default()
                .push(entry.clone());
        }

        let flow_complete = entries
            .iter()
            .any(|e| e.step == Step::FlowComplete && e.status == ExecutionStatus::Success);

        let mut states: Vec<StepState> = steps
            .iter()
            .map(|step| match logs_by_step.get(step).and_then(|l| l.first()) {
                None => StepState::Pending,
                Some(newest) if newest.status == ExecutionStatus::Failed => StepState::Failed,
                Some(_) => StepState::Completed,
            })
            .collect();

        if flow_complete {
            states.fill(StepState::Completed);
        } else if let Some(failed) = states.iter().position(|s| *s == StepState::Failed) {
            states[..failed].fill(StepState::Completed);
            states[failed + 1..].fill(StepState::Pending);
        } else if let Some(last) = states.iter().rposition(|s| *s != StepState::Pending) {
            states[..last].fill(StepState::Completed);
            states[last] = StepState::InProgress;
            states[last + 1..].fill(StepState::Pending);
        } else if let Some(first) = states.first_mut() {
            *first = StepState::InProgress;
        }

        Self {
            steps: steps.to_vec(),
            states,
            logs_by_step,
            entries,
            flow_complete,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn states(&self) -> &[StepState] {
        &self.states
    }

    pub fn state_of(&self, step: &Step) -> Option<StepState> {
        self.steps
            .iter()
            .position(|s| s == step)
            .map(|i| self.states[i])
    }

    /// Whether the flow wrote a successful `flow-complete` marker.
    pub fn is_flow_complete(&self) -> bool {
        self.flow_complete
    }

    /// Index of the step currently running, if any.
    pub fn active_index(&self) -> Option<usize> {
        self.states.iter().position(|s| *s == StepState::InProgress)
    }

    pub fn completed_count(&self) -> usize {
        self.states.iter().filter(|s| **s == StepState::Completed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.states.iter().filter(|s| **s == StepState::Failed).count()
    }

    /// Log entries for one step, newest first.
    pub fn logs_for(&self, step: &Step) -> &[StepLogEntry] {
        self.logs_by_step.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All entries, newest first.
    pub fn entries(&self) -> &[StepLogEntry] {
        &self.entries
    }

    /// One line per entry, newest first:
    /// `"{timestamp} [{status}] {step} ({stage}): {message}"`.
    pub fn console_transcript(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{} [{}] {} ({}): {}",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.status,
                    e.step,
                    e.stage,
                    e.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

use std::sync::{Arc, Mutex, PoisonError};

use crate::core::result::{RunResult, RunStatus};
use crate::core::tracker::ConvergenceTracker;
use crate::model::node::{NodeId, ScenariosNode};
use crate::report::Reporter;

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Enter { node: NodeId, name: String },
    Exit { node: NodeId, name: String },
    RunResult { node: NodeId, name: String, status: RunStatus },
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
    watched: Mutex<Vec<(NodeId, NodeId, ConvergenceTracker)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of entered nodes, in order.
    pub fn entered(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Enter { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Statuses reported for the behavior displayed as `name`.
    pub fn results_for(&self, name: &str) -> Vec<RunStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::RunResult {
                    name: reported,
                    status,
                    ..
                } if reported == name => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Tracker registered for `behavior` within `phase`, if any.
    pub fn tracker(&self, phase: NodeId, behavior: NodeId) -> Option<ConvergenceTracker> {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(p, b, _)| *p == phase && *b == behavior)
            .map(|(_, _, tracker)| tracker.clone())
    }

    fn push(&self, event: ReportEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Reporter for MemoryReporter {
    fn report_run_result(&self, node: &Arc<ScenariosNode>, result: &RunResult) {
        self.push(ReportEvent::RunResult {
            node: node.id(),
            name: node.to_string(),
            status: result.status,
        });
    }

    fn report_enter(&self, node: &Arc<ScenariosNode>) {
        self.push(ReportEvent::Enter {
            node: node.id(),
            name: node.to_string(),
        });
    }

    fn report_exit(&self, node: &Arc<ScenariosNode>) {
        self.push(ReportEvent::Exit {
            node: node.id(),
            name: node.to_string(),
        });
    }

    fn watch(
        &self,
        phase: &Arc<ScenariosNode>,
        behavior: &Arc<ScenariosNode>,
        tracker: &ConvergenceTracker,
    ) {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((phase.id(), behavior.id(), tracker.clone()));
    }
}

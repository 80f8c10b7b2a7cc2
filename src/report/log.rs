use std::sync::Arc;

use tracing::{debug, info};

use crate::core::result::{RunResult, RunStatus};
use crate::model::node::ScenariosNode;
use crate::report::Reporter;

/// Reporter that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report_run_result(&self, node: &Arc<ScenariosNode>, result: &RunResult) {
        match result.status {
            RunStatus::Failure => debug!(
                behavior = %node,
                score = result.transcript.mean_score(),
                error = result.error.as_deref().unwrap_or(""),
                "Run failed"
            ),
            _ => debug!(behavior = %node, status = %result.status, "Run finished"),
        }
    }

    fn report_enter(&self, node: &Arc<ScenariosNode>) {
        info!(node = %node, kind = ?node.kind(), "Entering");
    }

    fn report_exit(&self, node: &Arc<ScenariosNode>) {
        info!(node = %node, kind = ?node.kind(), "Leaving");
    }
}

//! Repeat a pass until its behaviors converge or attempts run out.

use tracing::{debug, info};

use crate::core::counter::{CompoundCounter, Counter};
use crate::core::gate::Gate;
use crate::core::pass::AutomationPass;
use crate::core::result::RunStatus;
use crate::error::Result;

/// Loop state machine over one `AutomationPass`.
///
/// Continues while `attempts < maximum_attempts` and the success gate is
/// closed. Each iteration runs the pass once and then increments the
/// attempt and since-last-save counters together.
pub struct AutomationLoop {
    pass: AutomationPass,
    attempts: Counter,
    increments: CompoundCounter,
    continue_gate: Gate,
    success_gate: Gate,
}

impl AutomationLoop {
    pub fn new(
        pass: AutomationPass,
        attempts: Counter,
        since_last_save: Counter,
        maximum_attempts: u64,
        success_gate: Gate,
    ) -> Self {
        let continue_gate = Gate::for_and(
            Gate::for_counter_and_maximum(attempts.clone(), maximum_attempts),
            Gate::for_not(success_gate.clone()),
        );
        Self {
            pass,
            increments: CompoundCounter::new(vec![attempts.clone(), since_last_save]),
            attempts,
            continue_gate,
            success_gate,
        }
    }

    pub fn pass(&self) -> &AutomationPass {
        &self.pass
    }

    /// Passes run so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.get()
    }

    pub fn success_gate(&self) -> &Gate {
        &self.success_gate
    }

    pub fn succeeded(&self) -> bool {
        self.success_gate.is_open()
    }

    /// Drive the loop to completion. The loop itself is never graded, so
    /// the status is always `NotRun`; see `succeeded` for the outcome.
    pub async fn run(&self) -> Result<RunStatus> {
        while self.continue_gate.is_open() {
            self.pass.run().await?;
            self.increments.increment();
            debug!(attempt = self.attempts.get(), "Loop iteration");
        }

        info!(
            attempts = self.attempts.get(),
            converged = self.succeeded(),
            "Loop finished"
        );
        Ok(RunStatus::NotRun)
    }
}

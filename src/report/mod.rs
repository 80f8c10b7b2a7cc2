//! Observers of a training run.
//!
//! The engine pushes events to a `Reporter` and never waits on it beyond
//! the call itself. Implementations that render do so from their own task.

mod console;
mod log;
mod memory;

use std::sync::Arc;

pub use console::{ConsoleReporter, ProgressHandle};
pub use log::TracingReporter;
pub use memory::{MemoryReporter, ReportEvent};

use crate::core::result::RunResult;
use crate::core::tracker::ConvergenceTracker;
use crate::model::node::ScenariosNode;

/// Push-style observer of plan execution.
pub trait Reporter: Send + Sync {
    fn report_run_result(&self, node: &Arc<ScenariosNode>, result: &RunResult);

    fn report_enter(&self, node: &Arc<ScenariosNode>);

    fn report_exit(&self, node: &Arc<ScenariosNode>);

    /// Called once per behavior of a leaf phase at plan build time with the
    /// tracker that will hold its convergence window while `phase` runs.
    fn watch(
        &self,
        _phase: &Arc<ScenariosNode>,
        _behavior: &Arc<ScenariosNode>,
        _tracker: &ConvergenceTracker,
    ) {
    }
}

/// Reports `enter` on creation and `exit` on drop, so the pair stays
/// balanced when the scope is left through `?`.
pub struct ReportScope<'a> {
    reporter: &'a dyn Reporter,
    node: &'a Arc<ScenariosNode>,
}

impl<'a> ReportScope<'a> {
    pub fn enter(reporter: &'a dyn Reporter, node: &'a Arc<ScenariosNode>) -> Self {
        reporter.report_enter(node);
        Self { reporter, node }
    }
}

impl Drop for ReportScope<'_> {
    fn drop(&mut self) {
        self.reporter.report_exit(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    #[test]
    fn test_scope_pairs_enter_and_exit() {
        let model = Model::builder("scope").build().unwrap();
        let reporter = MemoryReporter::new();

        {
            let _scope = ReportScope::enter(&reporter, model.root());
            assert_eq!(reporter.events().len(), 1);
        }

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ReportEvent::Enter { .. }));
        assert!(matches!(events[1], ReportEvent::Exit { .. }));
    }

    #[test]
    fn test_scope_exits_on_early_return() {
        fn fails(reporter: &dyn Reporter, node: &Arc<ScenariosNode>) -> Result<(), String> {
            let _scope = ReportScope::enter(reporter, node);
            let step: Result<(), String> = Err("boom".to_string());
            step?;
            Ok(())
        }

        let model = Model::builder("scope").build().unwrap();
        let reporter = MemoryReporter::new();
        assert!(fails(&reporter, model.root()).is_err());
        assert_eq!(reporter.events().len(), 2);
    }
}

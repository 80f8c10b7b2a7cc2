//! One sweep over the behaviors of a leaf phase.

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::counter::Counter;
use crate::core::gate::Gate;
use crate::core::weighted::DynamicWeightedRunnable;
use crate::error::{FailOpen, Result};
use crate::mind::MindPool;
use crate::model::node::ScenariosNode;
use crate::report::Reporter;

/// Checkpoint hook invoked when a pass's save gate is open.
pub trait Saver: Send + Sync {
    fn save(&self);
}

/// Saves every brain held by the pool, then restarts the since-last-save
/// count.
pub struct PoolSaver {
    pool: MindPool,
    since_last_save: Counter,
}

impl PoolSaver {
    pub fn new(pool: MindPool, since_last_save: Counter) -> Self {
        Self {
            pool,
            since_last_save,
        }
    }
}

impl Saver for PoolSaver {
    fn save(&self) {
        let saved = self.pool.save_all().fail_open_default("checkpoint save");
        info!(saved, "Checkpoint");
        self.since_last_save.reset();
    }
}

/// A behavior node paired with its weighted runnable.
#[derive(Clone)]
pub struct PassEntry {
    pub node: Arc<ScenariosNode>,
    pub runnable: DynamicWeightedRunnable,
}

pub struct AutomationPass {
    entries: Vec<PassEntry>,
    reporter: Arc<dyn Reporter>,
    save_gate: Gate,
    saver: Arc<dyn Saver>,
}

impl AutomationPass {
    pub fn new(
        entries: Vec<PassEntry>,
        reporter: Arc<dyn Reporter>,
        save_gate: Gate,
        saver: Arc<dyn Saver>,
    ) -> Self {
        Self {
            entries,
            reporter,
            save_gate,
            saver,
        }
    }

    pub fn entries(&self) -> &[PassEntry] {
        &self.entries
    }

    /// Run every entry once, in order, recording each executed run into
    /// its tracker. Only a fatal error stops the sweep.
    pub async fn run(&self) -> Result<()> {
        let mut executed = 0usize;
        for entry in &self.entries {
            let Some(result) = entry.runnable.run().await? else {
                continue;
            };
            executed += 1;
            self.reporter.report_run_result(&entry.node, &result);
            entry.runnable.tracker().record_run(&result);
        }
        debug!(entries = self.entries.len(), executed, "Pass complete");

        if self.save_gate.is_open() {
            self.saver.save();
        }
        Ok(())
    }
}

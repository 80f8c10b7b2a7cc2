//! Convergence-weighted behavior execution.
//!
//! A behavior's chance of running on a given trial falls linearly from the
//! maximum dynamic weight (convergence 0) to the minimum dynamic weight
//! (convergence 1). A skipped trial records nothing, so the tracker window
//! keeps its previous contents.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::core::counter::Counter;
use crate::core::result::RunResult;
use crate::core::runner::BehaviorRunner;
use crate::core::tracker::ConvergenceTracker;
use crate::error::Result;

/// Random source shared by every weighted runnable of a training run.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Create the run's random source, seeded when `seed` is given.
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}

/// Behavior runner gated by a convergence-dependent execution weight.
#[derive(Clone)]
pub struct DynamicWeightedRunnable {
    runner: BehaviorRunner,
    tracker: ConvergenceTracker,
    minimum: f64,
    maximum: f64,
    rng: SharedRng,
    /// Trial index shared by every runnable of one pass sweep. Counts skipped
    /// trials too and only feeds trace output; it never affects the roll.
    trials: Counter,
}

impl DynamicWeightedRunnable {
    pub fn new(
        runner: BehaviorRunner,
        tracker: ConvergenceTracker,
        minimum: f64,
        maximum: f64,
        rng: SharedRng,
        trials: Counter,
    ) -> Self {
        Self {
            runner,
            tracker,
            minimum,
            maximum,
            rng,
            trials,
        }
    }

    pub fn runner(&self) -> &BehaviorRunner {
        &self.runner
    }

    pub fn tracker(&self) -> &ConvergenceTracker {
        &self.tracker
    }

    /// Diagnostic trial index for the current pass.
    pub fn trials(&self) -> &Counter {
        &self.trials
    }

    /// Current execution probability.
    pub fn weight(&self) -> f64 {
        weight_for(self.minimum, self.maximum, self.tracker.measure_convergence())
    }

    /// Run one trial. Returns `None` when the trial was skipped.
    pub async fn run(&self) -> Result<Option<RunResult>> {
        let trial = self.trials.increment();
        let weight = self.weight();

        if !self.roll(weight) {
            trace!(behavior = %self.runner.node(), trial, weight, "Trial skipped");
            return Ok(None);
        }

        self.runner.run().await.map(Some)
    }

    fn roll(&self, weight: f64) -> bool {
        if weight >= 1.0 {
            return true;
        }
        if weight <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_bool(weight)
    }
}

/// Linear interpolation from `maximum` at convergence 0 down to `minimum` at 1.
pub fn weight_for(minimum: f64, maximum: f64, convergence: f64) -> f64 {
    let weight = maximum - (maximum - minimum) * convergence.clamp(0.0, 1.0);
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

//! The curriculum engine.
//!
//! Bottom-up: a `BehaviorRunner` produces `RunResult`s, which feed
//! `ConvergenceTracker`s, whose measurements open `Gate`s. A
//! `DynamicWeightedRunnable` decides per trial whether a behavior runs; an
//! `AutomationPass` sweeps them once; an `AutomationLoop` repeats the pass
//! until its success gate opens or attempts run out; a `TrainingPlan`
//! composes loops along the phase tree.

pub mod automation;
pub mod counter;
pub mod gate;
pub mod pass;
pub mod plan;
pub mod result;
pub mod runner;
pub mod scheme;
pub mod summarizer;
pub mod tracker;
pub mod weighted;

pub use automation::AutomationLoop;
pub use counter::{CompoundCounter, Counter};
pub use gate::Gate;
pub use pass::{AutomationPass, PassEntry, PoolSaver, Saver};
pub use plan::{PlanContext, PlanFuture, TrainingPlan};
pub use result::{BehaviorError, Grade, IntoOutcome, Outcome, RunResult, RunStatus, Transcript};
pub use runner::{BehaviorInvoker, BehaviorRunner, Console};
pub use scheme::TrainingDataScheme;
pub use summarizer::Summarizer;
pub use tracker::ConvergenceTracker;
pub use weighted::{shared_rng, DynamicWeightedRunnable, SharedRng};

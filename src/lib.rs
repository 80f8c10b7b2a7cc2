//! Syllabus - curriculum-driven training orchestrator
//!
//! Declare minds, capabilities with behaviors, and phased curricula with
//! convergence standards; Syllabus runs each behavior repeatedly against
//! its minds until the measured success rate clears the bar, saving brains
//! along the way.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod mind;
pub mod model;
pub mod report;

pub use config::Config;
pub use core::{
    BehaviorError, Console, ConvergenceTracker, Gate, Grade, RunResult, RunStatus, Summarizer,
    TrainingPlan, Transcript,
};
pub use error::{Result, SyllabusError};
pub use mind::{MindKind, MindPool};
pub use model::{Capability, Curriculum, Directory, Model, Phase};
pub use report::{ConsoleReporter, MemoryReporter, Reporter, TracingReporter};

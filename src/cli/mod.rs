//! CLI commands for Syllabus.
//!
//! - **train**: run curricula of a model ([`TrainCommand`])
//! - **host**: argument handling for curriculum binaries
//! - **project**: build and launch a curriculum project for `syllabus train`

pub mod host;
pub mod project;
pub mod train;

pub use host::HostArgs;
pub use project::Project;
pub use train::{CurriculumReport, TrainCommand, TrainOptions, TrainOutput};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
///
/// Does nothing when a subscriber is already installed.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

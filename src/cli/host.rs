//! Entry point for curriculum binaries.
//!
//! A project that declares curricula calls [`run`] from its `main`:
//!
//! ```ignore
//! fn main() -> std::process::ExitCode {
//!     syllabus::cli::host::run(build_model())
//! }
//! ```
//!
//! `syllabus train` builds such a binary and launches it with the curriculum
//! filter and output flags.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use crate::cli::init_logging;
use crate::cli::train::{TrainCommand, TrainOptions, TrainOutput};
use crate::config::Config;
use crate::error::exit_codes;
use crate::model::Model;
use crate::report::{ConsoleReporter, Reporter, TracingReporter};

/// Arguments accepted by a curriculum binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(about = "Train the curricula declared by this program")]
pub struct HostArgs {
    /// Curriculum to run (repeatable). Runs all curricula when omitted.
    #[arg(long = "curriculum", short = 'c', value_name = "NAME")]
    pub curricula: Vec<String>,
    /// Print the summary as JSON instead of the live dashboard
    #[arg(long)]
    pub json: bool,
    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
    /// List the declared curricula and exit
    #[arg(long)]
    pub list: bool,
}

/// Parse the process arguments, train, and map the outcome to an exit code.
///
/// Creates its own tokio runtime, so it must not be called from async code;
/// use [`train`] there instead.
pub fn run(model: Model) -> ExitCode {
    let args = HostArgs::parse();
    init_logging(args.verbose);

    if args.list {
        for curriculum in model.curricula() {
            println!("{}", curriculum.name());
        }
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start runtime: {}", err);
            return ExitCode::from(exit_codes::FATAL as u8);
        }
    };

    let output = runtime.block_on(train(model, &args, load_config()));
    ExitCode::from(u8::try_from(output.exit_code()).unwrap_or(exit_codes::FATAL as u8))
}

/// Effective configuration for the current directory.
pub fn load_config() -> Config {
    match env::current_dir() {
        Ok(cwd) => Config::load_from_cwd(&cwd),
        Err(_) => Config::load(),
    }
}

/// Brain directory for a curriculum binary running in its project.
///
/// Mind kinds take this when the model is declared, so their brain files
/// land where `[saving] brain_dir` says.
pub fn brain_dir() -> PathBuf {
    let root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    load_config().brain_dir(&root)
}

/// Train `model` with the given arguments and print the summary.
///
/// Without `--json` a live console dashboard is shown while training; with
/// it, progress goes to the log and stdout carries only the JSON summary.
pub async fn train(model: Model, args: &HostArgs, config: Config) -> TrainOutput {
    let options = TrainOptions {
        curricula: args.curricula.clone(),
        json: args.json,
        quiet: false,
    };

    let dashboard = (!args.json).then(|| ConsoleReporter::new(config.report.clone()));
    let reporter: Arc<dyn Reporter> = match &dashboard {
        Some(console) => Arc::new(console.clone()),
        None => Arc::new(TracingReporter),
    };
    let progress = dashboard.as_ref().map(ConsoleReporter::spawn_progress);

    let mut command = TrainCommand::new(config, model);
    if let Ok(cwd) = env::current_dir() {
        command = command.with_project_root(cwd);
    }
    let output = command.run(&options, reporter).await;

    if let Some(progress) = progress {
        progress.stop().await;
    }
    print!("{}", command.format_output(&output, &options));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_args() {
        let args = HostArgs::try_parse_from([
            "echo-app",
            "--curriculum",
            "basics",
            "-c",
            "advanced",
            "--json",
        ])
        .unwrap();

        assert_eq!(args.curricula, vec!["basics", "advanced"]);
        assert!(args.json);
        assert!(!args.verbose);
        assert!(!args.list);
    }

    #[test]
    fn test_parse_host_args_defaults() {
        let args = HostArgs::try_parse_from(["echo-app"]).unwrap();
        assert!(args.curricula.is_empty());
        assert!(!args.json);
    }

    #[tokio::test]
    async fn test_train_empty_model_converges() {
        let brains = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.saving.brain_dir = brains.path().join("brains");

        let model = Model::builder("nothing").build().unwrap();
        let args = HostArgs {
            json: true,
            ..Default::default()
        };
        let output = train(model, &args, config).await;
        assert!(output.success);
        assert_eq!(output.exit_code(), exit_codes::CONVERGED);
    }
}

//! Syllabus - curriculum-driven training orchestrator
//!
//! CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use syllabus::cli::{init_logging, Project};
use syllabus::config::Config;
use syllabus::error::{exit_codes, Result};

// =============================================================================
// CLI Definition
// =============================================================================

/// Syllabus - train small neural minds through phased curricula
#[derive(Parser)]
#[command(name = "syllabus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a curriculum project and run its curricula
    Train {
        /// Path to the project (directory containing Cargo.toml)
        project: PathBuf,
        /// Skip `cargo build` and run the existing binary
        #[arg(long)]
        no_build: bool,
        /// Curriculum to run (repeatable). Runs all curricula when omitted
        #[arg(long = "curriculum", short = 'c', value_name = "NAME")]
        curricula: Vec<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Extra arguments passed to `cargo build`
        #[arg(last = true)]
        build_args: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            eprintln!("syllabus: {err}");
            ExitCode::from(exit_codes::FATAL as u8)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Train {
            project,
            no_build,
            curricula,
            json,
            build_args,
        } => run_train(project, no_build, &curricula, json, &build_args, cli.verbose),
        Commands::Config { json } => run_config(json),
    }
}

fn run_train(
    path: PathBuf,
    no_build: bool,
    curricula: &[String],
    json: bool,
    build_args: &[String],
    verbose: bool,
) -> Result<ExitCode> {
    let project = Project::open(&path)?;
    if !no_build {
        project.build(build_args)?;
    }
    let binary = project.binary_path(build_args);
    let code = project.launch(&binary, curricula, json, verbose)?;
    Ok(ExitCode::from(
        u8::try_from(code).unwrap_or(exit_codes::FATAL as u8),
    ))
}

fn run_config(json: bool) -> Result<ExitCode> {
    let config = match env::current_dir() {
        Ok(cwd) => Config::load_from_cwd(&cwd),
        Err(_) => Config::load(),
    };
    let text = if json {
        serde_json::to_string_pretty(&config)?
    } else {
        config.to_toml()?
    };
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

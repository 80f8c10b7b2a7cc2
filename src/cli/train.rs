//! Train command.
//!
//! Runs the selected curricula of a model one after another with a single
//! shared mind pool, saving every held brain after each curriculum.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::plan::{PlanContext, TrainingPlan};
use crate::core::result::RunStatus;
use crate::core::weighted::shared_rng;
use crate::error::{exit_codes, FailOpen, Result, SyllabusError};
use crate::mind::MindPool;
use crate::model::node::ScenariosNode;
use crate::model::{Model, TreeFinder};
use crate::report::Reporter;

/// Options for the train command.
#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    /// Curricula to run, by name. Empty runs all of them.
    pub curricula: Vec<String>,
    /// Output as JSON.
    pub json: bool,
    /// Suppress the summary.
    pub quiet: bool,
}

/// Outcome of one curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumReport {
    pub name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CurriculumReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Output format for the train command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutput {
    /// Whether every selected curriculum converged.
    pub success: bool,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub curricula: Vec<CurriculumReport>,
    /// Brain saves performed at curriculum boundaries.
    pub brains_saved: usize,
    /// Whether the run was aborted by a fatal error.
    pub fatal: bool,
    /// Error that stopped the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainOutput {
    fn new(model: &str) -> Self {
        let now = Utc::now();
        Self {
            success: false,
            model: model.to_string(),
            started_at: now,
            finished_at: now,
            curricula: Vec::new(),
            brains_saved: 0,
            fatal: false,
            error: None,
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.fatal || self.error.is_some() {
            exit_codes::FATAL
        } else if self.success {
            exit_codes::CONVERGED
        } else {
            exit_codes::NOT_CONVERGED
        }
    }
}

/// The train command implementation.
pub struct TrainCommand {
    config: Config,
    model: Model,
    project_root: PathBuf,
}

impl TrainCommand {
    /// Create the command. Relative brain directories resolve against the
    /// current directory unless `with_project_root` says otherwise.
    pub fn new(config: Config, model: Model) -> Self {
        Self {
            config,
            model,
            project_root: PathBuf::from("."),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Directory brains are saved under for this run.
    pub fn brain_dir(&self) -> PathBuf {
        self.config.brain_dir(&self.project_root)
    }

    /// Resolve the curricula to run, in declaration order when no filter is
    /// given and in filter order otherwise.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<ScenariosNode>>> {
        if names.is_empty() {
            return Ok(self.model.curricula());
        }
        names
            .iter()
            .map(|name| {
                self.model.curriculum(name).ok_or_else(|| {
                    SyllabusError::model(format!("no curriculum named '{name}'"))
                })
            })
            .collect()
    }

    /// Run the command. Errors are reported in the output, never returned.
    pub async fn run(&self, options: &TrainOptions, reporter: Arc<dyn Reporter>) -> TrainOutput {
        let mut output = TrainOutput::new(self.model.name());

        let curricula = match self.select(&options.curricula) {
            Ok(curricula) => curricula,
            Err(err) => {
                output.error = Some(err.to_string());
                output.finished_at = Utc::now();
                return output;
            }
        };
        if curricula.is_empty() {
            warn!(model = self.model.name(), "Model declares no curricula");
        }

        ensure_dir(&self.brain_dir()).fail_open_default("creating brain directory");

        let pool = MindPool::from_model(&self.model);
        let context = PlanContext {
            finder: Arc::new(TreeFinder::new(Arc::clone(self.model.root()))),
            pool: pool.clone(),
            reporter,
            rng: shared_rng(self.config.runtime.seed),
            save_every: self.config.saving.every_iterations,
        };

        let mut all_converged = true;
        for curriculum in curricula {
            let started_at = Utc::now();
            let status = self.run_curriculum(&curriculum, &context).await;

            output.brains_saved += pool
                .save_all()
                .fail_open_default("saving brains after curriculum");

            match status {
                Ok(status) => {
                    all_converged &= status == RunStatus::Success;
                    output.curricula.push(CurriculumReport {
                        name: curriculum.name().to_string(),
                        status,
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
                Err(err) => {
                    error!(curriculum = %curriculum, "Training aborted: {}", err);
                    output.fatal = err.is_fatal();
                    output.error = Some(err.to_string());
                    all_converged = false;
                    break;
                }
            }
        }

        output.success = all_converged && output.error.is_none();
        output.finished_at = Utc::now();
        output
    }

    async fn run_curriculum(
        &self,
        curriculum: &Arc<ScenariosNode>,
        context: &PlanContext,
    ) -> Result<RunStatus> {
        info!(curriculum = %curriculum, "Starting curriculum");
        let plan = TrainingPlan::build_for(
            curriculum,
            self.config.training,
            context,
        )?;
        let status = plan.run().await?;
        info!(curriculum = %curriculum, status = %status, "Curriculum finished");
        Ok(status)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &TrainOutput, options: &TrainOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            format_human_readable(output)
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| SyllabusError::storage(dir, e))
}

fn format_human_readable(output: &TrainOutput) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== {} ===", output.model));

    for curriculum in &output.curricula {
        let mark = match curriculum.status {
            RunStatus::Success => "converged",
            RunStatus::Failure => "did not converge",
            RunStatus::NotRun => "not run",
        };
        lines.push(format!(
            "  {}: {} ({:.1}s)",
            curriculum.name,
            mark,
            curriculum.duration_ms() as f64 / 1000.0
        ));
    }

    if let Some(error) = &output.error {
        let label = if output.fatal { "Fatal" } else { "Error" };
        lines.push(format!("{label}: {error}"));
    }
    lines.push(format!("Brains saved: {}", output.brains_saved));
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::BehaviorError;
    use crate::core::runner::Console;
    use crate::mind::pool::tests::{CountingKind, CountingMind};
    use crate::model::{Capability, Curriculum};
    use crate::report::MemoryReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Echo {
        mind: CountingMind,
    }

    fn model(saves: Arc<AtomicUsize>) -> Model {
        Model::builder("echo-app")
            .mind(CountingKind {
                saves,
                ..Default::default()
            })
            .capability(
                Capability::new("Echo", |minds: &MindPool| {
                    Ok(Echo {
                        mind: minds.mind::<CountingKind>()?,
                    })
                })
                .behavior("repeats", |echo: Echo, _console: Console| async move {
                    echo.mind.think();
                })
                .behavior("stubborn", |_echo: Echo, _console: Console| async {
                    Err::<(), _>(BehaviorError::failed("wrong"))
                })
                .behavior("crashes", |_echo: Echo, _console: Console| async {
                    Err::<(), _>(BehaviorError::fatal("device lost"))
                }),
            )
            .curriculum(
                Curriculum::new("easy")
                    .standard(1.0, 3)
                    .include_behaviors("Echo", ["repeats"]),
            )
            .curriculum(
                Curriculum::new("hard")
                    .standard(1.0, 3)
                    .maximum_attempts(5)
                    .include_behaviors("Echo", ["stubborn"]),
            )
            .curriculum(Curriculum::new("broken").include_behaviors("Echo", ["crashes"]))
            .build()
            .unwrap()
    }

    fn command(model: Model) -> (TempDir, TrainCommand) {
        let dir = TempDir::new().unwrap();
        let command = TrainCommand::new(Config::default(), model).with_project_root(dir.path());
        (dir, command)
    }

    fn options(curricula: &[&str]) -> TrainOptions {
        TrainOptions {
            curricula: curricula.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_converging_curriculum() {
        let saves = Arc::new(AtomicUsize::new(0));
        let (_dir, command) = command(model(saves.clone()));

        let output = command
            .run(&options(&["easy"]), MemoryReporter::shared())
            .await;

        assert!(output.success);
        assert_eq!(output.exit_code(), exit_codes::CONVERGED);
        assert_eq!(output.curricula[0].status, RunStatus::Success);
        assert_eq!(output.brains_saved, 1);
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_curriculum_does_not_stop_later_ones() {
        let (_dir, command) = command(model(Arc::default()));
        let output = command
            .run(&options(&["hard", "easy"]), MemoryReporter::shared())
            .await;

        assert!(!output.success);
        assert_eq!(output.exit_code(), exit_codes::NOT_CONVERGED);
        let statuses: Vec<RunStatus> = output.curricula.iter().map(|c| c.status).collect();
        assert_eq!(statuses, vec![RunStatus::Failure, RunStatus::Success]);
    }

    #[tokio::test]
    async fn test_fatal_stops_the_run() {
        let (_dir, command) = command(model(Arc::default()));
        let output = command
            .run(&options(&["broken", "easy"]), MemoryReporter::shared())
            .await;

        assert!(output.fatal);
        assert_eq!(output.exit_code(), exit_codes::FATAL);
        assert!(output.curricula.is_empty());
        assert!(output.error.unwrap().contains("device lost"));
    }

    #[tokio::test]
    async fn test_unknown_curriculum_is_an_error() {
        let command = TrainCommand::new(Config::default(), model(Arc::default()));
        let output = command
            .run(&options(&["missing"]), MemoryReporter::shared())
            .await;

        assert!(!output.fatal);
        assert_eq!(output.exit_code(), exit_codes::FATAL);
        assert!(output.error.unwrap().contains("missing"));
    }

    #[test]
    fn test_select_all_curricula() {
        let command = TrainCommand::new(Config::default(), model(Arc::default()));
        let names: Vec<String> = command
            .select(&[])
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["easy", "hard", "broken"]);
    }

    #[tokio::test]
    async fn test_format_output_json() {
        let (_dir, command) = command(model(Arc::default()));
        let opts = TrainOptions {
            json: true,
            ..options(&["easy"])
        };
        let output = command.run(&opts, MemoryReporter::shared()).await;
        let text = command.format_output(&output, &opts);

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["curricula"][0]["status"], "success");
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_format_output_human_readable() {
        let mut output = TrainOutput::new("echo-app");
        output.curricula.push(CurriculumReport {
            name: "easy".to_string(),
            status: RunStatus::Failure,
            started_at: output.started_at,
            finished_at: output.started_at,
        });
        let command = TrainCommand::new(Config::default(), model(Arc::default()));
        let text = command.format_output(&output, &TrainOptions::default());

        assert!(text.contains("=== echo-app ==="));
        assert!(text.contains("easy: did not converge"));
        assert!(command
            .format_output(&output, &TrainOptions { quiet: true, ..Default::default() })
            .is_empty());
    }

    #[tokio::test]
    async fn test_brain_directory_is_created() {
        let (dir, command) = command(model(Arc::default()));
        let output = command
            .run(&options(&["easy"]), MemoryReporter::shared())
            .await;

        assert!(output.success);
        assert_eq!(command.brain_dir(), dir.path().join(".syllabus/brains"));
        assert!(command.brain_dir().is_dir());
    }
}

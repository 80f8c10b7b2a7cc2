//! Live console dashboard.
//!
//! Phase boundaries and failing output are printed as they happen. The
//! per-behavior convergence bars are redrawn by a separate progress task
//! that reads the watched trackers, so rendering never runs on the engine's
//! path.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::ReportConfig;
use crate::core::result::{RunResult, RunStatus};
use crate::core::tracker::ConvergenceTracker;
use crate::model::node::{NodeId, ScenariosNode};
use crate::report::Reporter;

/// Reporter that prints a per-behavior convergence dashboard.
#[derive(Clone)]
pub struct ConsoleReporter {
    state: Arc<ConsoleState>,
}

struct ConsoleState {
    settings: ReportConfig,
    out: Mutex<Box<dyn Write + Send>>,
    rows: Mutex<Vec<Row>>,
    /// Trackers each phase will use, swapped into the rows when it starts.
    phases: Mutex<HashMap<NodeId, Vec<(NodeId, ConvergenceTracker)>>>,
    depth: AtomicUsize,
    dirty: AtomicBool,
}

struct Row {
    node: NodeId,
    label: String,
    tracker: ConvergenceTracker,
    runs: u64,
    failures: u64,
    last_output: Option<String>,
}

impl ConsoleReporter {
    /// Reporter writing to stdout.
    pub fn new(settings: ReportConfig) -> Self {
        Self::with_writer(settings, Box::new(io::stdout()))
    }

    pub fn with_writer(settings: ReportConfig, out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(ConsoleState {
                settings,
                out: Mutex::new(out),
                rows: Mutex::new(Vec::new()),
                phases: Mutex::new(HashMap::new()),
                depth: AtomicUsize::new(0),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    /// Draw the dashboard now.
    pub fn render(&self) {
        self.state.render();
    }

    /// Start the periodic redraw task. Must be called inside a tokio runtime.
    pub fn spawn_progress(&self) -> ProgressHandle {
        let (cancel, mut cancelled) = watch::channel(false);
        let state = Arc::clone(&self.state);
        let period = Duration::from_millis(self.state.settings.interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if state.dirty.swap(false, Ordering::SeqCst) {
                            state.render();
                        }
                    }
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        ProgressHandle {
            cancel,
            task: Some(task),
        }
    }
}

impl ConsoleState {
    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!("Dashboard write failed: {}", err);
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth.load(Ordering::SeqCst))
    }

    /// Point each row at the tracker `phase` records into. A row whose
    /// tracker changes starts counting from zero.
    fn activate(&self, phase: NodeId) {
        let phases = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(watched) = phases.get(&phase) else {
            return;
        };
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        for (behavior, tracker) in watched {
            if let Some(row) = rows.iter_mut().find(|row| row.node == *behavior) {
                if !row.tracker.same_as(tracker) {
                    row.tracker = tracker.clone();
                    row.runs = 0;
                    row.failures = 0;
                    row.last_output = None;
                }
            }
        }
    }

    fn render(&self) {
        let lines: Vec<String> = {
            let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            let width = rows.iter().map(|row| row.label.len()).max().unwrap_or(0);
            rows.iter()
                .filter(|row| row.runs > 0)
                .map(|row| {
                    let convergence = row.tracker.measure_convergence();
                    format!(
                        "  {:<width$}  [{}] {:>5.1}%  runs {:>6}  failures {:>6}",
                        row.label,
                        bar(convergence, self.settings.bar_width),
                        convergence * 100.0,
                        row.runs,
                        row.failures,
                    )
                })
                .collect()
        };
        for line in lines {
            self.write_line(&line);
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report_run_result(&self, node: &Arc<ScenariosNode>, result: &RunResult) {
        let mut failure_output = None;
        {
            let mut rows = self.state.rows.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(row) = rows.iter_mut().find(|row| row.node == node.id()) {
                row.runs += 1;
                if result.status == RunStatus::Failure {
                    row.failures += 1;
                    // Repeated identical output is printed once.
                    if row.last_output.as_deref() != Some(result.output.as_str()) {
                        row.last_output = Some(result.output.clone());
                        failure_output = Some(result.output.clone());
                    }
                }
            }
        }
        self.state.dirty.store(true, Ordering::SeqCst);

        if !self.state.settings.show_output {
            return;
        }
        if let Some(output) = failure_output {
            let indent = self.state.indent();
            let reason = result.error.as_deref().unwrap_or("not all grades perfect");
            self.state.write_line(&format!("{indent}✗ {node}: {reason}"));
            for line in output.lines() {
                self.state.write_line(&format!("{indent}  | {line}"));
            }
        }
    }

    fn report_enter(&self, node: &Arc<ScenariosNode>) {
        self.state.activate(node.id());
        let indent = self.state.indent();
        self.state.write_line(&format!("{indent}▶ {node}"));
        self.state.depth.fetch_add(1, Ordering::SeqCst);
    }

    fn report_exit(&self, node: &Arc<ScenariosNode>) {
        let _ = self
            .state
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        let indent = self.state.indent();
        self.state.write_line(&format!("{indent}◀ {node}"));
        if self.state.depth.load(Ordering::SeqCst) == 0 {
            self.state.render();
        }
    }

    fn watch(
        &self,
        phase: &Arc<ScenariosNode>,
        behavior: &Arc<ScenariosNode>,
        tracker: &ConvergenceTracker,
    ) {
        self.state
            .phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(phase.id())
            .or_default()
            .push((behavior.id(), tracker.clone()));

        let mut rows = self.state.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if rows.iter().any(|row| row.node == behavior.id()) {
            return;
        }
        rows.push(Row {
            node: behavior.id(),
            label: behavior.to_string(),
            tracker: tracker.clone(),
            runs: 0,
            failures: 0,
            last_output: None,
        });
    }
}

/// Handle to the dashboard's progress task.
///
/// Dropping the handle signals the task to stop; `stop` also waits for it.
pub struct ProgressHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ProgressHandle {
    pub async fn stop(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Progress task ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

fn bar(convergence: f64, width: usize) -> String {
    let filled = ((convergence.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

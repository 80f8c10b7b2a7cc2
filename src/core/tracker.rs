//! Convergence tracking over a sliding window of recent scores.
//!
//! The window holds at most `sample_size` scores, oldest first. Measuring
//! pads the window with zeros up to `sample_size` before summarizing, so a
//! node with only a few runs cannot look converged.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::result::{RunResult, RunStatus, Transcript};
use crate::core::summarizer::Summarizer;

/// Shared handle to the convergence window of one node.
///
/// Clones share the same window. Each tracker has its own lock, so readers
/// such as the dashboard only ever contend with writers to the same node.
#[derive(Clone)]
pub struct ConvergenceTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    sample_size: usize,
    summarizer: Summarizer,
    window: Mutex<VecDeque<f64>>,
}

impl ConvergenceTracker {
    /// Create a tracker. A sample size of zero is treated as one.
    pub fn new(sample_size: usize, summarizer: Summarizer) -> Self {
        let sample_size = sample_size.max(1);
        Self {
            inner: Arc::new(TrackerInner {
                sample_size,
                summarizer,
                window: Mutex::new(VecDeque::with_capacity(sample_size)),
            }),
        }
    }

    pub fn sample_size(&self) -> usize {
        self.inner.sample_size
    }

    pub fn summarizer(&self) -> Summarizer {
        self.inner.summarizer
    }

    /// Append one score, evicting the oldest once the window is full.
    pub fn record_result(&self, score: f64) {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        let mut window = self.lock();
        window.push_back(score);
        while window.len() > self.inner.sample_size {
            window.pop_front();
        }
    }

    /// Append one score per grade.
    pub fn record_transcript(&self, transcript: &Transcript) {
        for grade in transcript.grades() {
            self.record_result(grade.score);
        }
    }

    /// Append the pass/fail outcome of a run. `NotRun` records nothing.
    pub fn record_run(&self, result: &RunResult) {
        match result.status {
            RunStatus::Success => self.record_result(1.0),
            RunStatus::Failure => self.record_result(0.0),
            RunStatus::NotRun => {}
        }
    }

    /// Summarize the window padded with zeros to `sample_size`.
    pub fn measure_convergence(&self) -> f64 {
        let mut values: Vec<f64> = self.lock().iter().copied().collect();
        values.resize(self.inner.sample_size, 0.0);
        self.inner.summarizer.summarize(&values)
    }

    /// Number of recorded scores currently in the window.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.lock().iter().copied().collect()
    }

    /// True when both handles share one window.
    pub fn same_as(&self, other: &ConvergenceTracker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.inner
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConvergenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvergenceTracker")
            .field("sample_size", &self.inner.sample_size)
            .field("summarizer", &self.inner.summarizer)
            .field("recorded", &self.len())
            .finish()
    }
}

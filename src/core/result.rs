//! Grades, transcripts and run results.
//!
//! A behavior produces an `Outcome`; the runner normalizes it into a
//! `RunResult`. A run is a success only when every grade in its transcript
//! is perfect, even though individual grades may be partial.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyllabusError;

/// One graded observation within a behavior run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grade {
    /// Score in 0..1.
    pub score: f64,
    /// Free-form notes attached by the behavior or the runner.
    pub annotations: Vec<String>,
}

impl Grade {
    /// Create a grade, clamping the score into 0..1. NaN becomes 0.
    pub fn new(score: f64) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            score,
            annotations: Vec::new(),
        }
    }

    pub fn perfect() -> Self {
        Self::new(1.0)
    }

    pub fn zero() -> Self {
        Self::new(0.0)
    }

    /// Perfect if `condition` holds, zero otherwise.
    pub fn check(condition: bool) -> Self {
        if condition {
            Self::perfect()
        } else {
            Self::zero()
        }
    }

    /// Attach an annotation.
    pub fn annotate(mut self, note: impl Into<String>) -> Self {
        self.annotations.push(note.into());
        self
    }

    pub fn is_perfect(&self) -> bool {
        self.score >= 1.0
    }
}

/// Ordered grades of one behavior run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript(pub Vec<Grade>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, grade: Grade) {
        self.0.push(grade);
    }

    pub fn grades(&self) -> &[Grade] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the transcript is non-empty and every grade is perfect.
    pub fn all_perfect(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(Grade::is_perfect)
    }

    /// Mean score, zero for an empty transcript.
    pub fn mean_score(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().map(|g| g.score).sum::<f64>() / self.0.len() as f64
    }
}

impl From<Vec<Grade>> for Transcript {
    fn from(grades: Vec<Grade>) -> Self {
        Self(grades)
    }
}

impl FromIterator<Grade> for Transcript {
    fn from_iter<I: IntoIterator<Item = Grade>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Status of a run (or of a plan-level unit).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    NotRun,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::NotRun => "not run",
        };
        f.write_str(name)
    }
}

/// Normalized result of one behavior invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub status: RunStatus,
    pub transcript: Transcript,
    /// Description of the error that ended the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Text the behavior wrote to its console.
    pub output: String,
}

impl RunResult {
    /// Result of a completed run. The status follows the transcript.
    pub fn from_transcript(transcript: Transcript, output: String) -> Self {
        let status = if transcript.all_perfect() {
            RunStatus::Success
        } else {
            RunStatus::Failure
        };
        Self {
            status,
            transcript,
            error: None,
            output,
        }
    }

    /// Failed run with a single zero grade annotated with `kind`.
    pub fn errored(kind: &str, error: impl Into<String>, output: String) -> Self {
        Self {
            status: RunStatus::Failure,
            transcript: Transcript(vec![Grade::zero().annotate(kind)]),
            error: Some(error.into()),
            output,
        }
    }

    /// Result of a control construct that is not itself graded.
    pub fn not_run() -> Self {
        Self {
            status: RunStatus::NotRun,
            transcript: Transcript::new(),
            error: None,
            output: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Error a behavior can return instead of a grade.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorError {
    /// An expected failure: recorded, training continues.
    Failed { grade: Grade, reason: String },
    /// An unrecoverable host failure: aborts the run.
    Fatal { cause: String },
}

impl BehaviorError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            grade: Grade::zero(),
            reason: reason.into(),
        }
    }

    /// Failure that keeps a partial grade for reporting.
    pub fn failed_with(grade: Grade, reason: impl Into<String>) -> Self {
        Self::Failed {
            grade,
            reason: reason.into(),
        }
    }

    pub fn fatal(cause: impl Into<String>) -> Self {
        Self::Fatal {
            cause: cause.into(),
        }
    }
}

impl fmt::Display for BehaviorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason, .. } => write!(f, "failed: {reason}"),
            Self::Fatal { cause } => write!(f, "fatal: {cause}"),
        }
    }
}

impl std::error::Error for BehaviorError {}

impl From<SyllabusError> for BehaviorError {
    fn from(err: SyllabusError) -> Self {
        match err {
            SyllabusError::Fatal { cause } => Self::Fatal { cause },
            other => Self::Failed {
                grade: Grade::zero().annotate(other.kind()),
                reason: other.to_string(),
            },
        }
    }
}

/// What a behavior invocation produced, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed(Transcript),
    Failed { transcript: Transcript, reason: String },
    Fatal(String),
}

/// Conversion from the shapes a behavior may return into an `Outcome`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Passed(Transcript(vec![Grade::perfect()]))
    }
}

impl IntoOutcome for Grade {
    fn into_outcome(self) -> Outcome {
        Outcome::Passed(Transcript(vec![self]))
    }
}

impl IntoOutcome for Transcript {
    fn into_outcome(self) -> Outcome {
        Outcome::Passed(self)
    }
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

impl<T: IntoOutcome> IntoOutcome for std::result::Result<T, BehaviorError> {
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(BehaviorError::Failed { grade, reason }) => Outcome::Failed {
                transcript: Transcript(vec![grade.annotate(reason.clone())]),
                reason,
            },
            Err(BehaviorError::Fatal { cause }) => Outcome::Fatal(cause),
        }
    }
}

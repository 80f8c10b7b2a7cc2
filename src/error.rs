//! Unified error types for Syllabus.
//!
//! Errors split into two families. Infrastructure errors (config, storage,
//! brain persistence) follow a fail-open policy where the caller can keep
//! training: log a warning and fall back. `Fatal` is the one kind that must
//! escape every boundary in the engine and end the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Syllabus operations.
#[derive(Error, Debug)]
pub enum SyllabusError {
    /// I/O errors from config or brain file operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Invalid curriculum tree (bad registration, mixed phase content).
    #[error("model error: {message}")]
    Model { message: String },

    /// Brain construction, loading or saving failed.
    #[error("brain error: {message}")]
    Brain { message: String },

    /// Building or launching a curriculum project failed.
    #[error("build error: {message}")]
    Build { message: String },

    /// Unrecoverable host failure. Aborts the whole training run.
    #[error("fatal: {cause}")]
    Fatal { cause: String },
}

/// A specialized Result type for Syllabus operations.
pub type Result<T> = std::result::Result<T, SyllabusError>;

impl SyllabusError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create a brain error.
    pub fn brain(message: impl Into<String>) -> Self {
        Self::Brain {
            message: message.into(),
        }
    }

    /// Create a build error.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a fatal error.
    pub fn fatal(cause: impl Into<String>) -> Self {
        Self::Fatal {
            cause: cause.into(),
        }
    }

    /// Check if this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Short name of the error kind, used to annotate failed grades.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage",
            Self::Serde { .. } => "serde",
            Self::Config { .. } => "config",
            Self::Model { .. } => "model",
            Self::Brain { .. } => "brain",
            Self::Build { .. } => "build",
            Self::Fatal { .. } => "fatal",
        }
    }
}

impl From<io::Error> for SyllabusError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SyllabusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SyllabusError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Checkpoint saves and config layers should never stop a training run.
/// Log the error and carry on with a safe value.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Syllabus CLI and curriculum host binaries.
pub mod exit_codes {
    /// Every selected curriculum converged.
    pub const CONVERGED: i32 = 0;

    /// At least one curriculum hit its attempt ceiling without converging.
    pub const NOT_CONVERGED: i32 = 1;

    /// A fatal error aborted the run.
    pub const FATAL: i32 = 2;
}

//! Error types for the batch module.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::RunnerError;
use crate::scheduler::SchedulerError;

/// Errors preparing or submitting a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The study root does not exist or is not a directory.
    #[error("Study root not found: {path}")]
    StudyRootNotFound { path: PathBuf },

    /// Discovery found nothing worth submitting.
    #[error("No non-empty input volumes match {pattern} under {root} ({empty} empty)")]
    NoInputs {
        root: PathBuf,
        pattern: String,
        empty: usize,
    },

    /// The discovery pattern is invalid.
    #[error("Invalid discovery pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// Two inputs derive the same run directory.
    #[error("Inputs {first} and {second} both map to {run_dir}")]
    RunDirCollision {
        run_dir: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// A run directory name could not be derived.
    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Submission failed.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O error writing job files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Whether the error stems from the study layout rather than from the
    /// cluster or the filesystem.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::StudyRootNotFound { .. } | Self::NoInputs { .. } => true,
            Self::Runner(e) => e.is_user_error(),
            _ => false,
        }
    }
}

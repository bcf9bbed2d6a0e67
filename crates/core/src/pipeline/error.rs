//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::summary::SummaryError;
use crate::toolkit::ToolkitError;

use super::types::StageId;

/// Errors that stop a pipeline run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The input volume is missing or empty.
    #[error("Invalid input {path}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// The series header carries an unusable repetition time.
    #[error("Invalid repetition time: {tr_secs}")]
    InvalidRepetitionTime { tr_secs: f64 },

    /// The run directory already belongs to a different input.
    #[error("Run directory {run_dir} belongs to {existing}, not {requested}")]
    RunDirCollision {
        run_dir: PathBuf,
        existing: PathBuf,
        requested: PathBuf,
    },

    /// A run directory name could not be derived from the input path.
    #[error("Cannot derive a run directory name from {path}")]
    InvalidName { path: PathBuf },

    /// A delegate call failed.
    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        stage: StageId,
        #[source]
        source: ToolkitError,
    },

    /// A delegate returned success without producing a non-empty artifact.
    #[error("Stage {stage} produced no output at {path}")]
    MissingArtifact { stage: StageId, path: PathBuf },

    /// The statistics table could not be turned into a summary row.
    #[error("Summary error: {0}")]
    Summary(#[from] SummaryError),

    /// The status record could not be read or written.
    #[error("Status record {path}: {reason}")]
    Status { path: PathBuf, reason: String },

    /// I/O error in the run directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Creates an invalid input error.
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stage failure.
    pub fn stage(stage: StageId, source: ToolkitError) -> Self {
        Self::StageFailed { stage, source }
    }

    /// Whether the error stems from what the user asked for rather than
    /// from a delegate.
    ///
    /// The CLI reports these and exits successfully.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::InvalidName { .. })
    }

    /// The stage the error is attributed to, if any.
    pub fn failed_stage(&self) -> Option<StageId> {
        match self {
            Self::StageFailed { stage, .. } | Self::MissingArtifact { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(RunnerError::invalid_input("/data/bold.nii.gz", "does not exist").is_user_error());
        assert!(!RunnerError::MissingArtifact {
            stage: StageId::Dvars,
            path: PathBuf::from("dvars.txt"),
        }
        .is_user_error());
    }

    #[test]
    fn test_failed_stage() {
        let err = RunnerError::stage(
            StageId::Segmentation,
            ToolkitError::command_failed("bet", Some(1), "Image exception"),
        );
        assert_eq!(err.failed_stage(), Some(StageId::Segmentation));
        assert!(err.to_string().contains("segmentation"));
        assert_eq!(
            RunnerError::InvalidRepetitionTime { tr_secs: 0.0 }.failed_stage(),
            None
        );
    }
}

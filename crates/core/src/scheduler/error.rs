//! Error types for the scheduler module.

use thiserror::Error;

use crate::toolkit::ToolkitError;

use super::types::DependencyPolicy;

/// Errors submitting jobs to a cluster scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The submission command could not be run or exited unsuccessfully.
    #[error("Submission failed: {0}")]
    Submission(#[from] ToolkitError),

    /// The submission command did not report a job id.
    #[error("No job id in {tool} response: {response:?}")]
    UnparseableResponse { tool: String, response: String },

    /// The backend cannot express the requested dependency policy.
    #[error("{backend} cannot express dependency policy {policy}")]
    UnsupportedPolicy {
        backend: String,
        policy: DependencyPolicy,
    },

    /// A job description is unusable.
    #[error("Invalid job {name}: {reason}")]
    InvalidJob { name: String, reason: String },

    /// I/O error writing submission scripts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    pub fn unparseable(tool: impl Into<String>, response: impl Into<String>) -> Self {
        Self::UnparseableResponse {
            tool: tool.into(),
            response: response.into(),
        }
    }
}

//! Error types for the summary module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading statistics tables or writing summary tables.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A line of the statistics table could not be parsed.
    #[error("Malformed statistics table {path} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A required metric row is absent.
    #[error("Statistics table {path} has no row for {metric}")]
    MissingMetric { path: PathBuf, metric: String },

    /// The summary glob pattern is invalid.
    #[error("Invalid summary pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SummaryError {
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

//! Error types for the toolkit module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a delegate invocation.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// The tool binary could not be started.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} failed with exit code {code:?}")]
    CommandFailed {
        tool: String,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// The tool exceeded the configured timeout.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// The tool's output could not be interpreted.
    #[error("Failed to parse {tool} output: {reason}")]
    ParseError { tool: String, reason: String },

    /// A required input image is missing.
    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The delegate was asked for something it cannot express.
    #[error("Unsupported operation: {reason}")]
    Unsupported { reason: String },

    /// I/O error around a delegate call.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolkitError {
    /// Creates a command failed error, dropping empty stderr.
    pub fn command_failed(tool: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Self::CommandFailed {
            tool: tool.into(),
            code,
            stderr: if stderr.is_empty() {
                None
            } else {
                Some(stderr.to_string())
            },
        }
    }

    /// Creates a parse error.
    pub fn parse(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

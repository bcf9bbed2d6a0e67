//! Types for the scheduler module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier a scheduler assigned to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job array: one task per line of a command file.
#[derive(Debug, Clone)]
pub struct ArrayJob {
    pub name: String,
    /// File with one shell command per line.
    pub command_file: PathBuf,
    /// Number of commands in the file.
    pub tasks: usize,
    /// Directory for scheduler log files.
    pub log_dir: PathBuf,
    /// Directory for generated submission scripts.
    pub script_dir: PathBuf,
}

/// A single job running one script.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub script: PathBuf,
    pub log_dir: PathBuf,
}

/// When a dependent job may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Every upstream task reached a terminal state, successful or not.
    #[default]
    AllTerminal,
    /// Every upstream task succeeded.
    AllSuccess,
}

impl fmt::Display for DependencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllTerminal => write!(f, "all_terminal"),
            Self::AllSuccess => write!(f, "all_success"),
        }
    }
}

/// A dependency on every task of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub on: JobId,
    pub policy: DependencyPolicy,
}

/// A node of a [`JobGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobNode {
    /// Task `index` (zero-based) of the array.
    ArrayTask(usize),
    /// The aggregation job.
    Aggregate,
}

/// Ids assigned when a [`JobGraph`] was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedGraph {
    pub array: JobId,
    pub aggregate: JobId,
}

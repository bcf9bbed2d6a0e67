//! Configuration for the scheduler module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which cluster scheduler submits jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerBackend {
    /// FSL's `fsl_sub` wrapper (SGE/Grid Engine clusters).
    #[default]
    FslSub,
    /// Slurm `sbatch`.
    Slurm,
}

impl fmt::Display for SchedulerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FslSub => write!(f, "fsl_sub"),
            Self::Slurm => write!(f, "slurm"),
        }
    }
}

/// Configuration for job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub backend: SchedulerBackend,

    /// Queue (fsl_sub) or partition (Slurm).
    #[serde(default)]
    pub queue: Option<String>,

    /// Memory request per task, e.g. "8G". Only Slurm uses it.
    #[serde(default)]
    pub memory: Option<String>,

    /// Path to the `fsl_sub` executable.
    #[serde(default = "default_fsl_sub")]
    pub fsl_sub_command: PathBuf,

    /// Path to the `sbatch` executable.
    #[serde(default = "default_sbatch")]
    pub sbatch_command: PathBuf,
}

fn default_fsl_sub() -> PathBuf {
    PathBuf::from("fsl_sub")
}

fn default_sbatch() -> PathBuf {
    PathBuf::from("sbatch")
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backend: SchedulerBackend::default(),
            queue: None,
            memory: None,
            fsl_sub_command: default_fsl_sub(),
            sbatch_command: default_sbatch(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_backend(mut self, backend: SchedulerBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

//! Configuration for the batch coordinator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scheduler::DependencyPolicy;

/// Configuration for fanning a study out over the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Glob, relative to the study root, matching every input volume.
    #[serde(default = "default_raw_pattern")]
    pub raw_pattern: String,

    /// QC output root relative to the study root.
    #[serde(default = "default_qc_subdir")]
    pub qc_subdir: PathBuf,

    /// Scheduler log directory relative to the QC root.
    #[serde(default = "default_logs_subdir")]
    pub logs_subdir: PathBuf,

    /// Directory for generated job files relative to the QC root.
    #[serde(default = "default_jobs_subdir")]
    pub jobs_subdir: PathBuf,

    /// Study summary table file name inside the QC root.
    #[serde(default = "default_summary_filename")]
    pub summary_filename: String,

    /// Command used by the jobs to invoke this program; defaults to the
    /// running executable.
    #[serde(default)]
    pub runner_command: Option<Vec<String>>,

    /// When the aggregation job may start.
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,

    /// Name given to the submitted jobs.
    #[serde(default = "default_job_name")]
    pub job_name: String,
}

fn default_raw_pattern() -> String {
    "rawdata/sub-*/ses-*/func/*_bold.nii*".to_string()
}

fn default_qc_subdir() -> PathBuf {
    PathBuf::from("derivatives/fmriqc")
}

fn default_logs_subdir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_jobs_subdir() -> PathBuf {
    PathBuf::from("jobs")
}

fn default_summary_filename() -> String {
    "qc_summary_all.csv".to_string()
}

fn default_job_name() -> String {
    "fmriqc".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            raw_pattern: default_raw_pattern(),
            qc_subdir: default_qc_subdir(),
            logs_subdir: default_logs_subdir(),
            jobs_subdir: default_jobs_subdir(),
            summary_filename: default_summary_filename(),
            runner_command: None,
            dependency_policy: DependencyPolicy::default(),
            job_name: default_job_name(),
        }
    }
}

impl BatchConfig {
    pub fn qc_root(&self, study_root: &Path) -> PathBuf {
        study_root.join(&self.qc_subdir)
    }

    pub fn log_dir(&self, study_root: &Path) -> PathBuf {
        self.qc_root(study_root).join(&self.logs_subdir)
    }

    pub fn jobs_dir(&self, study_root: &Path) -> PathBuf {
        self.qc_root(study_root).join(&self.jobs_subdir)
    }

    pub fn summary_path(&self, study_root: &Path) -> PathBuf {
        self.qc_root(study_root).join(&self.summary_filename)
    }

    /// The command jobs run, resolving the default to this executable.
    pub fn resolved_runner_command(&self) -> Vec<String> {
        match &self.runner_command {
            Some(command) if !command.is_empty() => command.clone(),
            _ => vec![std::env::current_exe()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| "fmriqc".to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_study_root() {
        let config = BatchConfig::default();
        let root = Path::new("/data/study");
        assert_eq!(
            config.qc_root(root),
            PathBuf::from("/data/study/derivatives/fmriqc")
        );
        assert_eq!(
            config.log_dir(root),
            PathBuf::from("/data/study/derivatives/fmriqc/logs")
        );
        assert_eq!(
            config.summary_path(root),
            PathBuf::from("/data/study/derivatives/fmriqc/qc_summary_all.csv")
        );
    }

    #[test]
    fn test_runner_command_override() {
        let mut config = BatchConfig::default();
        assert!(!config.resolved_runner_command().is_empty());

        config.runner_command = Some(vec!["/opt/fmriqc/bin/fmriqc".to_string()]);
        assert_eq!(
            config.resolved_runner_command(),
            vec!["/opt/fmriqc/bin/fmriqc"]
        );

        config.runner_command = Some(Vec::new());
        assert_eq!(config.resolved_runner_command().len(), 1);
    }
}

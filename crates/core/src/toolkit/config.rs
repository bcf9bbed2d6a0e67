//! Configuration for the toolkit delegates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FSL-backed toolkit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// FSL installation root; binaries are taken from `<fsl_dir>/bin`.
    /// When unset, tools are resolved through `PATH`.
    #[serde(default)]
    pub fsl_dir: Option<PathBuf>,

    /// Optional timeout for a single tool invocation in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolkitConfig {
    /// Sets the FSL installation root.
    pub fn with_fsl_dir(mut self, fsl_dir: PathBuf) -> Self {
        self.fsl_dir = Some(fsl_dir);
        self
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Resolves the path of a tool binary.
    pub fn tool_path(&self, tool: &str) -> PathBuf {
        match &self.fsl_dir {
            Some(dir) => dir.join("bin").join(tool),
            None => PathBuf::from(tool),
        }
    }
}

/// Configuration for the statistics and report scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Program and leading arguments of the statistics script. The run
    /// directory and output table path are appended.
    #[serde(default = "default_stats_command")]
    pub stats_command: Vec<String>,

    /// Program and leading arguments of the report renderer. The run
    /// directory is appended.
    #[serde(default = "default_report_command")]
    pub report_command: Vec<String>,
}

fn default_stats_command() -> Vec<String> {
    vec!["fmriqc_stats".to_string()]
}

fn default_report_command() -> Vec<String> {
    vec!["fmriqc_report".to_string()]
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            stats_command: default_stats_command(),
            report_command: default_report_command(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_path_without_fsl_dir() {
        let config = ToolkitConfig::default();
        assert_eq!(config.tool_path("fslmaths"), PathBuf::from("fslmaths"));
    }

    #[test]
    fn test_tool_path_with_fsl_dir() {
        let config = ToolkitConfig::default()
            .with_fsl_dir(PathBuf::from("/usr/local/fsl"))
            .with_timeout(600);
        assert_eq!(
            config.tool_path("mcflirt"),
            PathBuf::from("/usr/local/fsl/bin/mcflirt")
        );
        assert_eq!(config.timeout_secs, Some(600));
    }

    #[test]
    fn test_reporter_defaults() {
        let config: ReporterConfig = toml::from_str("").unwrap();
        assert_eq!(config.stats_command, vec!["fmriqc_stats"]);
        assert_eq!(config.report_command, vec!["fmriqc_report"]);
    }
}

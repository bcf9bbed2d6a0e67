//! Reporter that shells out to configured statistics and report scripts.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::command::{arg, run_command};
use super::config::ReporterConfig;
use super::error::ToolkitError;
use super::traits::Reporter;

/// Reporter running external scripts.
pub struct ScriptReporter {
    config: ReporterConfig,
}

impl ScriptReporter {
    /// Creates a new script reporter with the given configuration.
    pub fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    /// Splits a configured command into program and leading arguments.
    fn split(command: &[String]) -> Result<(PathBuf, Vec<String>), ToolkitError> {
        let (program, rest) = command.split_first().ok_or_else(|| ToolkitError::Unsupported {
            reason: "empty reporter command".to_string(),
        })?;
        Ok((PathBuf::from(program), rest.to_vec()))
    }

    async fn run(&self, command: &[String], extra: Vec<String>) -> Result<(), ToolkitError> {
        let (program, mut args) = Self::split(command)?;
        args.extend(extra);
        let tool = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| arg(&program));
        run_command(&tool, &program, &args, &[], None).await.map(|_| ())
    }
}

#[async_trait]
impl Reporter for ScriptReporter {
    fn name(&self) -> &str {
        "script"
    }

    async fn compute_statistics(&self, run_dir: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.run(&self.config.stats_command, vec![arg(run_dir), arg(output)])
            .await
    }

    async fn render_report(&self, run_dir: &Path) -> Result<(), ToolkitError> {
        self.run(&self.config.report_command, vec![arg(run_dir)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        let (program, args) =
            ScriptReporter::split(&["python3".to_string(), "/opt/qc/stats.py".to_string()])
                .unwrap();
        assert_eq!(program, PathBuf::from("python3"));
        assert_eq!(args, vec!["/opt/qc/stats.py"]);
    }

    #[test]
    fn test_split_empty_command_fails() {
        assert!(matches!(
            ScriptReporter::split(&[]),
            Err(ToolkitError::Unsupported { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compute_statistics_appends_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("qc_stats.csv");
        // `touch <run_dir> <output>` creates the table and leaves the dir alone
        let reporter = ScriptReporter::new(ReporterConfig {
            stats_command: vec!["touch".to_string()],
            report_command: vec!["true".to_string()],
        });
        reporter
            .compute_statistics(dir.path(), &output)
            .await
            .unwrap();
        assert!(output.exists());
        reporter.render_report(dir.path()).await.unwrap();
    }
}

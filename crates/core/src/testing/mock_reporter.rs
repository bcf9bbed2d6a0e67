//! Mock reporter for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::summary::{Metric, MetricStats, StatsTable};
use crate::toolkit::{Reporter, ToolkitError};

/// Name of the report the mock writes into the run directory.
pub const MOCK_REPORT: &str = "report.html";

/// Head radius in millimetres used to turn rotations into displacement.
const HEAD_RADIUS_MM: f64 = 50.0;

/// A recorded reporter call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterCall {
    /// `"compute_statistics"` or `"render_report"`.
    pub operation: String,
    pub run_dir: PathBuf,
}

/// Mock implementation of the Reporter trait.
///
/// Statistics are computed from the run directory's region timeseries,
/// DVARS and motion parameter files:
/// - label columns 1, 2 and 3 feed `outer`, `ghost` and `air`
/// - `fd` sums absolute translation and arc-length rotation changes
/// - the threshold is mean plus two standard deviations
#[derive(Debug, Clone, Default)]
pub struct MockReporter {
    calls: Arc<RwLock<Vec<ReporterCall>>>,
    fail_statistics: Arc<RwLock<bool>>,
    fail_report: Arc<RwLock<bool>>,
}

impl MockReporter {
    /// Create a new mock reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<ReporterCall> {
        self.calls.read().await.clone()
    }

    /// Number of calls to `operation`.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Make statistics computation fail.
    pub async fn set_fail_statistics(&self, fail: bool) {
        *self.fail_statistics.write().await = fail;
    }

    /// Make report rendering fail.
    pub async fn set_fail_report(&self, fail: bool) {
        *self.fail_report.write().await = fail;
    }

    async fn record(&self, operation: &str, run_dir: &Path) {
        self.calls.write().await.push(ReporterCall {
            operation: operation.to_string(),
            run_dir: run_dir.to_path_buf(),
        });
    }
}

fn read_columns(path: &Path) -> Result<Vec<Vec<f64>>, ToolkitError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolkitError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ToolkitError::Io(e)
        }
    })?;
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        for (i, field) in line.split_whitespace().enumerate() {
            let value = field.parse::<f64>().map_err(|_| {
                ToolkitError::parse("mock-reporter", format!("{}: '{}'", path.display(), field))
            })?;
            if columns.len() <= i {
                columns.push(Vec::new());
            }
            columns[i].push(value);
        }
    }
    Ok(columns)
}

fn summarize(values: &[f64]) -> MetricStats {
    if values.is_empty() {
        return MetricStats {
            threshold: 0.0,
            mean: 0.0,
            pct_outliers: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let threshold = mean + 2.0 * sd;
    let outliers = values.iter().filter(|&&v| v > threshold).count() as f64;
    MetricStats {
        threshold,
        mean,
        pct_outliers: 100.0 * outliers / n,
    }
}

/// Per-volume framewise displacement and rotation from `mcf.par` columns
/// (three rotations in radians, then three translations in millimetres).
fn framewise(par: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let n = par.first().map(Vec::len).unwrap_or(0);
    let mut fd = Vec::with_capacity(n);
    let mut fr = Vec::with_capacity(n);
    for t in 1..n {
        let delta = |c: usize| (par[c][t] - par[c][t - 1]).abs();
        let rotation: f64 = (0..3).map(delta).sum();
        let translation: f64 = (3..6.min(par.len())).map(delta).sum();
        fr.push(rotation);
        fd.push(translation + HEAD_RADIUS_MM * rotation);
    }
    (fd, fr)
}

#[async_trait]
impl Reporter for MockReporter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn compute_statistics(
        &self,
        run_dir: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("compute_statistics", run_dir).await;
        if *self.fail_statistics.read().await {
            return Err(ToolkitError::command_failed("mock-reporter", Some(1), "stats"));
        }

        let regions = read_columns(&run_dir.join("roi_timeseries.txt"))?;
        let dvars = read_columns(&run_dir.join("dvars.txt"))?;
        let par = read_columns(&run_dir.join("mcf.par"))?;
        if par.len() < 3 {
            return Err(ToolkitError::parse("mock-reporter", "motion table needs 6 columns"));
        }
        let (fd, fr) = framewise(&par);

        let empty = Vec::new();
        let mut table = StatsTable::default();
        for (metric, column) in [Metric::Outer, Metric::Ghost, Metric::Air]
            .into_iter()
            .zip(0..)
        {
            table.insert(metric, summarize(regions.get(column).unwrap_or(&empty)));
        }
        table.insert(
            Metric::Dvars,
            summarize(dvars.first().unwrap_or(&empty)),
        );
        table.insert(Metric::Fd, summarize(&fd));
        table.insert(Metric::Fr, summarize(&fr));

        std::fs::write(output, table.to_csv())?;
        Ok(())
    }

    async fn render_report(&self, run_dir: &Path) -> Result<(), ToolkitError> {
        self.record("render_report", run_dir).await;
        if *self.fail_report.read().await {
            return Err(ToolkitError::command_failed("mock-reporter", Some(1), "report"));
        }
        let mut images: Vec<String> = std::fs::read_dir(run_dir)?
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".png"))
            .collect();
        images.sort();
        let body: String = images
            .iter()
            .map(|name| format!("<img src=\"{}\">\n", name))
            .collect();
        std::fs::write(
            run_dir.join(MOCK_REPORT),
            format!("<html><body>\n{}</body></html>\n", body),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summarize_flags_spike() {
        let mut values = vec![1.0; 19];
        values.push(20.0);
        let stats = summarize(&values);
        assert!((stats.mean - 1.95).abs() < 1e-9);
        assert!(stats.threshold < 20.0);
        assert_eq!(stats.pct_outliers, 5.0);
    }

    #[test]
    fn test_framewise() {
        let par = vec![
            vec![0.0, 0.01],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 0.5],
            vec![0.0, -0.5],
            vec![0.0, 0.0],
        ];
        let (fd, fr) = framewise(&par);
        assert_eq!(fr, vec![0.01]);
        assert!((fd[0] - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_statistics_table_is_complete() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("roi_timeseries.txt"), "100 10 1\n102 11 1\n").unwrap();
        std::fs::write(dir.path().join("dvars.txt"), "0\n3.5\n").unwrap();
        std::fs::write(dir.path().join("mcf.par"), "0 0 0 0 0 0\n0 0 0 0 0 0\n").unwrap();
        let output = dir.path().join("qc_stats.csv");

        let reporter = MockReporter::new();
        reporter
            .compute_statistics(dir.path(), &output)
            .await
            .unwrap();

        let table = StatsTable::read(&output).unwrap();
        assert_eq!(table.get(Metric::Outer).unwrap().mean, 101.0);
        assert_eq!(table.get(Metric::Fd).unwrap().mean, 0.0);
        assert_eq!(reporter.call_count("compute_statistics").await, 1);
    }
}

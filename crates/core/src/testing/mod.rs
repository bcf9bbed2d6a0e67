//! Testing utilities and mock implementations for E2E tests.
//!
//! The mocks stand in for the image-processing toolkit, the reporting
//! scripts and the cluster queue, so the runner and the batch coordinator
//! can be exercised end to end on tiny volumes.
//!
//! # Example
//!
//! ```rust,ignore
//! use fmriqc_core::testing::{fixtures, MockReporter, MockToolkit};
//!
//! let toolkit = MockToolkit::new();
//! let reporter = MockReporter::new();
//! fixtures::phantom_series(&input)?;
//!
//! let runner = PipelineRunner::new(config, Arc::new(toolkit.clone()), Arc::new(reporter));
//! runner.run(&RunRequest::new(&input, &output_root)).await?;
//! ```

mod image;
mod mock_reporter;
mod mock_scheduler;
mod mock_toolkit;

pub use image::MockImage;
pub use mock_reporter::{MockReporter, ReporterCall, MOCK_REPORT};
pub use mock_scheduler::MockScheduler;
pub use mock_toolkit::{percentile, MockToolkit, ToolkitCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use super::MockImage;
    use crate::summary::{Metric, MetricStats, StatsTable, SummaryRow};
    use crate::toolkit::ToolkitError;

    /// Dimensions of [`phantom_series`].
    pub const PHANTOM_DIMS: [usize; 4] = [8, 8, 4, 6];

    /// Repetition time of [`phantom_series`].
    pub const PHANTOM_TR_SECS: f64 = 2.0;

    /// A small phantom acquisition: a bright block off-centre along y on a
    /// dim, slightly textured background, with a little signal drift.
    pub fn phantom_image() -> MockImage {
        MockImage::from_fn(PHANTOM_DIMS, PHANTOM_TR_SECS, |x, y, _z, t| {
            let object = (1..4).contains(&y) && (2..6).contains(&x);
            if object {
                1000.0 + 2.0 * t as f64 + ((x + t) % 3) as f64
            } else {
                10.0 + ((x + y + t) % 3) as f64
            }
        })
    }

    /// Writes [`phantom_image`] to `path`, creating parent directories.
    pub fn phantom_series(path: &Path) -> Result<PathBuf, ToolkitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        phantom_image().write(path)?;
        Ok(path.to_path_buf())
    }

    /// Writes a phantom series at the conventional raw location for
    /// `subject` and `session` under `study_root`.
    pub fn raw_scan(study_root: &Path, subject: &str, session: &str) -> Result<PathBuf, ToolkitError> {
        let path = study_root
            .join("rawdata")
            .join(format!("sub-{}", subject))
            .join(format!("ses-{}", session))
            .join("func")
            .join(format!("sub-{}_ses-{}_bold.nii.gz", subject, session));
        phantom_series(&path)
    }

    /// A complete statistics table with distinct values per metric.
    pub fn stats_table() -> StatsTable {
        let mut table = StatsTable::default();
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            let base = (i + 1) as f64;
            table.insert(
                metric,
                MetricStats {
                    threshold: base * 10.0,
                    mean: base,
                    pct_outliers: base / 2.0,
                },
            );
        }
        table
    }

    /// A summary row for a run directory named `filename`.
    pub fn summary_row(filename: &str) -> SummaryRow {
        SummaryRow {
            filename: filename.to_string(),
            tr_secs: PHANTOM_TR_SECS,
            n_volumes: PHANTOM_DIMS[3],
            tsfnr: 42.5,
            stats: stats_table(),
        }
    }
}

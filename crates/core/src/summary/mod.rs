//! Summary module: per-run summary rows and the study-level table.
//!
//! The statistics delegate writes `qc_stats.csv` with one row per metric.
//! The runner combines it with the series timing and the tSFNR summary
//! into a single [`SummaryRow`]; [`aggregate_summaries`] concatenates the
//! rows of every run under a QC root behind one fixed header.

mod aggregate;
mod error;
mod types;

pub use aggregate::{aggregate_summaries, find_summaries, SUMMARY_GLOB};
pub use error::SummaryError;
pub use types::{
    study_header, Metric, MetricStats, StatsTable, SummaryRow, STATS_HEADER, SUMMARY_COLUMNS,
};

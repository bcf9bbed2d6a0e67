//! Concatenation of per-run summary rows into the study table.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::error::SummaryError;
use super::types::{study_header, SUMMARY_COLUMNS};

/// Glob, relative to the QC root, matching every run's summary row file.
pub const SUMMARY_GLOB: &str = "**/qc_summary.csv";

/// Summary row files under `qc_root`, in sorted path order.
pub fn find_summaries(qc_root: &Path, pattern: &str) -> Result<Vec<PathBuf>, SummaryError> {
    let full = qc_root.join(pattern);
    let full = full.to_string_lossy();
    let paths = glob::glob(&full).map_err(|e| SummaryError::Pattern {
        pattern: full.to_string(),
        reason: e.to_string(),
    })?;
    let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    found.sort();
    Ok(found)
}

/// Writes the study header followed by every run's summary row.
///
/// Empty summary files are skipped; rows with an unexpected column count
/// are kept but reported. Returns the number of rows written.
pub fn aggregate_summaries(
    qc_root: &Path,
    pattern: &str,
    output: &Path,
) -> Result<usize, SummaryError> {
    let mut table = study_header();
    table.push('\n');

    let mut rows = 0;
    for path in find_summaries(qc_root, pattern)? {
        if path == output {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let mut found = false;
        for line in content.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            let columns = line.split(',').count();
            if columns != SUMMARY_COLUMNS {
                warn!(
                    "Summary row in {} has {} columns, expected {}",
                    path.display(),
                    columns,
                    SUMMARY_COLUMNS
                );
            }
            table.push_str(line);
            table.push('\n');
            rows += 1;
            found = true;
        }
        if !found {
            warn!("Skipping empty summary {}", path.display());
        }
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = output.with_extension("csv.tmp");
    std::fs::write(&tmp, table)?;
    std::fs::rename(&tmp, output)?;

    info!(rows, output = %output.display(), "Wrote study summary");
    Ok(rows)
}

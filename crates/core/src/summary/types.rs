//! Statistics table and summary row.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::error::SummaryError;

/// Header of the statistics table written by the statistics delegate.
pub const STATS_HEADER: &str = "metric,threshold,mean,pct_outliers";

/// A metric summarised by the statistics delegate, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// Signal outside the foreground.
    Outer,
    Ghost,
    Air,
    Dvars,
    /// Framewise displacement.
    Fd,
    /// Framewise rotation.
    Fr,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Self::Outer,
        Self::Ghost,
        Self::Air,
        Self::Dvars,
        Self::Fd,
        Self::Fr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outer => "outer",
            Self::Ghost => "ghost",
            Self::Air => "air",
            Self::Dvars => "dvars",
            Self::Fd => "fd",
            Self::Fr => "fr",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// Outlier threshold, mean and percentage of outlying time points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub threshold: f64,
    pub mean: f64,
    pub pct_outliers: f64,
}

/// Parsed `qc_stats.csv`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsTable {
    rows: BTreeMap<Metric, MetricStats>,
}

impl StatsTable {
    /// Parses the table; every metric must appear exactly once.
    pub fn parse(content: &str, path: &Path) -> Result<Self, SummaryError> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        match lines.next() {
            Some((_, header)) if normalize(header) == STATS_HEADER => {}
            Some((n, header)) => {
                return Err(SummaryError::malformed(
                    path,
                    n,
                    format!("unexpected header '{}'", header),
                ))
            }
            None => return Err(SummaryError::malformed(path, 1, "empty table")),
        }

        let mut rows = BTreeMap::new();
        for (n, line) in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 4 {
                return Err(SummaryError::malformed(
                    path,
                    n,
                    format!("expected 4 fields, found {}", fields.len()),
                ));
            }
            let metric: Metric = fields[0]
                .parse()
                .map_err(|reason: String| SummaryError::malformed(path, n, reason))?;
            let number = |i: usize| {
                fields[i].parse::<f64>().map_err(|_| {
                    SummaryError::malformed(path, n, format!("'{}' is not a number", fields[i]))
                })
            };
            let stats = MetricStats {
                threshold: number(1)?,
                mean: number(2)?,
                pct_outliers: number(3)?,
            };
            if rows.insert(metric, stats).is_some() {
                return Err(SummaryError::malformed(
                    path,
                    n,
                    format!("duplicate metric '{}'", metric),
                ));
            }
        }

        for metric in Metric::ALL {
            if !rows.contains_key(&metric) {
                return Err(SummaryError::MissingMetric {
                    path: path.to_path_buf(),
                    metric: metric.to_string(),
                });
            }
        }

        Ok(Self { rows })
    }

    /// Reads and parses the table at `path`.
    pub fn read(path: &Path) -> Result<Self, SummaryError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricStats> {
        self.rows.get(&metric)
    }

    /// Renders the table in the delegate's format.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(STATS_HEADER);
        out.push('\n');
        for (metric, stats) in &self.rows {
            out.push_str(&format!(
                "{},{},{},{}\n",
                metric, stats.threshold, stats.mean, stats.pct_outliers
            ));
        }
        out
    }

    pub fn insert(&mut self, metric: Metric, stats: MetricStats) {
        self.rows.insert(metric, stats);
    }
}

fn normalize(header: &str) -> String {
    header
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase()
}

/// Header of the study summary table.
pub fn study_header() -> String {
    let mut columns = vec![
        "filename".to_string(),
        "tr_secs".to_string(),
        "n_vols".to_string(),
        "tsfnr".to_string(),
    ];
    for metric in Metric::ALL {
        columns.push(format!("{}_thresh", metric));
        columns.push(format!("{}_mean", metric));
        columns.push(format!("{}_pct_outliers", metric));
    }
    columns.join(",")
}

/// Number of columns in a summary row.
pub const SUMMARY_COLUMNS: usize = 4 + 3 * Metric::ALL.len();

/// One line of scalar QC metrics for a run directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Run directory name.
    pub filename: String,
    pub tr_secs: f64,
    pub n_volumes: usize,
    pub tsfnr: f64,
    pub stats: StatsTable,
}

impl SummaryRow {
    /// Renders the row without a trailing newline.
    pub fn render(&self) -> String {
        let mut fields = vec![
            csv_field(&self.filename),
            self.tr_secs.to_string(),
            self.n_volumes.to_string(),
            self.tsfnr.to_string(),
        ];
        for metric in Metric::ALL {
            match self.stats.get(metric) {
                Some(stats) => {
                    fields.push(stats.threshold.to_string());
                    fields.push(stats.mean.to_string());
                    fields.push(stats.pct_outliers.to_string());
                }
                None => fields.extend(std::iter::repeat(String::new()).take(3)),
            }
        }
        fields.join(",")
    }

    /// Writes the row followed by a newline, replacing any previous row.
    pub fn write(&self, path: &Path) -> Result<(), SummaryError> {
        std::fs::write(path, format!("{}\n", self.render()))?;
        Ok(())
    }
}

/// Quotes a field holding a separator or a quote.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::summary::SummaryRow;
use crate::toolkit::ImageStat;

/// Kind of object in the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    /// A living subject; the foreground comes from skull stripping.
    #[default]
    InVivo,
    /// A phantom; the foreground comes from an intensity threshold.
    Phantom,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InVivo => "invivo",
            Self::Phantom => "phantom",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown sample type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sample type '{0}' (expected 'invivo' or 'phantom')")]
pub struct ParseSampleTypeError(pub String);

impl FromStr for SampleType {
    type Err = ParseSampleTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "invivo" | "in-vivo" | "in_vivo" | "vivo" => Ok(Self::InVivo),
            "phantom" => Ok(Self::Phantom),
            _ => Err(ParseSampleTypeError(s.to_string())),
        }
    }
}

/// Which series the temporal moment images are computed from.
///
/// Numbers from the two variants are not comparable. The variant is stored
/// in every run's status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Mean and SD from the high-pass filtered series; tSFNR summarised
    /// by its median.
    #[default]
    Filtered,
    /// Mean and SD from the motion-corrected series; tSFNR summarised by
    /// its mean.
    Unfiltered,
}

impl Variant {
    /// Whether moment images read the filtered series.
    pub fn uses_filtered_series(&self) -> bool {
        matches!(self, Self::Filtered)
    }

    /// Statistic used for the scalar tSFNR summary.
    pub fn summary_stat(&self) -> ImageStat {
        match self {
            Self::Filtered => ImageStat::Median,
            Self::Unfiltered => ImageStat::Mean,
        }
    }

    /// Tag appended to the names of the moment images.
    pub fn artifact_tag(&self) -> &'static str {
        match self {
            Self::Filtered => "_hpf",
            Self::Unfiltered => "",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered => write!(f, "filtered"),
            Self::Unfiltered => write!(f, "unfiltered"),
        }
    }
}

/// A stage of the per-volume pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    MotionCorrection,
    HighpassFilter,
    TemporalMean,
    TemporalSd,
    Tsfnr,
    Segmentation,
    Render,
    TsfnrSummary,
    Dvars,
    RegionTimeseries,
    Statistics,
    SummaryRow,
    Report,
}

impl StageId {
    /// Every stage in execution order.
    pub const ALL: [StageId; 13] = [
        Self::MotionCorrection,
        Self::HighpassFilter,
        Self::TemporalMean,
        Self::TemporalSd,
        Self::Tsfnr,
        Self::Segmentation,
        Self::Render,
        Self::TsfnrSummary,
        Self::Dvars,
        Self::RegionTimeseries,
        Self::Statistics,
        Self::SummaryRow,
        Self::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MotionCorrection => "motion_correction",
            Self::HighpassFilter => "highpass_filter",
            Self::TemporalMean => "temporal_mean",
            Self::TemporalSd => "temporal_sd",
            Self::Tsfnr => "tsfnr",
            Self::Segmentation => "segmentation",
            Self::Render => "render",
            Self::TsfnrSummary => "tsfnr_summary",
            Self::Dvars => "dvars",
            Self::RegionTimeseries => "region_timeseries",
            Self::Statistics => "statistics",
            Self::SummaryRow => "summary_row",
            Self::Report => "report",
        }
    }

    /// Whether the stage is skipped when its artifacts already exist.
    ///
    /// Ungated stages run on every invocation.
    pub fn is_gated(&self) -> bool {
        !matches!(
            self,
            Self::Render | Self::TsfnrSummary | Self::SummaryRow | Self::Report
        )
    }

    /// Whether a failure of this stage stops the run.
    pub fn is_side_effect_only(&self) -> bool {
        matches!(self, Self::Render | Self::Report)
    }

    /// Gated stages whose output this stage reads.
    pub fn dependencies(&self, variant: Variant) -> &'static [StageId] {
        match self {
            Self::MotionCorrection => &[],
            Self::HighpassFilter => &[Self::MotionCorrection],
            Self::TemporalMean | Self::TemporalSd => {
                if variant.uses_filtered_series() {
                    &[Self::HighpassFilter]
                } else {
                    &[Self::MotionCorrection]
                }
            }
            Self::Tsfnr => &[Self::TemporalMean, Self::TemporalSd],
            Self::Segmentation => &[Self::TemporalMean],
            Self::Dvars | Self::RegionTimeseries => &[Self::MotionCorrection, Self::Segmentation],
            Self::Statistics => &[
                Self::MotionCorrection,
                Self::Tsfnr,
                Self::Segmentation,
                Self::Dvars,
                Self::RegionTimeseries,
            ],
            Self::Render | Self::TsfnrSummary | Self::SummaryRow | Self::Report => &[],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded state of a stage in a run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Done { at: DateTime<Utc> },
    Failed { at: DateTime<Utc>, reason: String },
}

impl StageState {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// A request to process one input volume.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The 4D input series.
    pub input: PathBuf,
    /// Directory under which the run directory is created.
    pub output_root: PathBuf,
    /// Kind of object scanned.
    pub sample_type: SampleType,
}

impl RunRequest {
    pub fn new(input: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_root: output_root.into(),
            sample_type: SampleType::default(),
        }
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The run directory that was written.
    pub run_dir: PathBuf,
    /// Gated stages that were executed.
    pub executed: Vec<StageId>,
    /// Gated stages that were skipped.
    pub skipped: Vec<StageId>,
    /// Scalar tSFNR summary within the foreground.
    pub tsfnr: f64,
    /// The summary row written for this run.
    pub summary: SummaryRow,
}

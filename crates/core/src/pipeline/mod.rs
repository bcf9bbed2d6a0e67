//! Pipeline module: the per-volume QC runner.
//!
//! A run takes one 4D input series and fills a run directory with the
//! artifacts of thirteen ordered stages: motion correction, high-pass
//! filtering, temporal moments, tSFNR, region segmentation, renders, the
//! tSFNR summary, DVARS, per-region timecourses, the statistics table, the
//! summary row and the report.
//!
//! Runs are resumable. Completion is recorded in `qc_status.json` and
//! reconciled against the files on disk at the start of every run.
//!
//! # Example
//!
//! ```ignore
//! use fmriqc_core::pipeline::{PipelineConfig, PipelineRunner, RunRequest, SampleType};
//!
//! let runner = PipelineRunner::new(PipelineConfig::default(), toolkit, reporter);
//! let request = RunRequest::new("/study/rawdata/sub-01/ses-1/func/sub-01_bold.nii.gz", "/qc/sub-01/ses-1")
//!     .with_sample_type(SampleType::Phantom);
//!
//! let outcome = runner.run(&request).await?;
//! println!("{} stages run, tSFNR {}", outcome.executed.len(), outcome.tsfnr);
//! ```

mod config;
mod error;
mod layout;
mod runner;
mod segmentation;
mod status;
mod types;

pub use config::{highpass_sigma_volumes, intensity_threshold, PipelineConfig, RenderConfig};
pub use error::RunnerError;
pub use layout::{is_present, RunIdentifier, RunLayout, SuffixIdentifier};
pub use runner::PipelineRunner;
pub use segmentation::{
    segment, Segmentation, SegmentationParams, AIR_LABEL, FOREGROUND_LABEL, GHOST_LABEL,
};
pub use status::{RunStatus, StageRecord};
pub use types::{
    ParseSampleTypeError, RunOutcome, RunRequest, SampleType, StageId, StageState, Variant,
};

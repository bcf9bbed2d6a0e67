//! Toolkit module: the external tools the QC pipeline delegates to.
//!
//! The pipeline never implements registration, filtering or segmentation
//! itself. It drives a [`Toolkit`] for image operations and a [`Reporter`]
//! for the statistics table and report, both of which are opaque
//! collaborators behind async traits.
//!
//! # Example
//!
//! ```ignore
//! use fmriqc_core::toolkit::{FslToolkit, Toolkit, ToolkitConfig, ImageStat};
//!
//! let toolkit = FslToolkit::new(ToolkitConfig::default());
//! let info = toolkit.series_info(Path::new("bold.nii.gz")).await?;
//! println!("TR {} s, {} volumes", info.tr_secs, info.n_volumes());
//!
//! let p99 = toolkit
//!     .image_stat(Path::new("tmean.nii.gz"), ImageStat::Percentile(99.0), None)
//!     .await?;
//! ```

pub(crate) mod command;
mod config;
mod error;
mod fsl;
mod script;
mod traits;
mod types;

pub use config::{ReporterConfig, ToolkitConfig};
pub use error::ToolkitError;
pub use fsl::FslToolkit;
pub use script::ScriptReporter;
pub use traits::{Reporter, Toolkit};
pub use types::{
    strip_image_extension, Axis, DisplayRange, ImageExpr, ImageStat, MorphOp, Orientation,
    SeriesInfo, IMAGE_EXTENSIONS,
};

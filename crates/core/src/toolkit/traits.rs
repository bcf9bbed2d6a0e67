//! Trait definitions for the toolkit module.

use async_trait::async_trait;
use std::path::Path;

use super::error::ToolkitError;
use super::types::{
    Axis, DisplayRange, ImageExpr, ImageStat, MorphOp, Orientation, SeriesInfo,
};

/// The image-processing operations the QC pipeline delegates.
///
/// Every method writes its result to the given output path; the caller
/// decides whether the output counts as a completed artifact.
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Returns the name of this toolkit implementation.
    fn name(&self) -> &str;

    /// Reads geometry and repetition time of an image.
    async fn series_info(&self, image: &Path) -> Result<SeriesInfo, ToolkitError>;

    /// Registers every volume of `input` to volume `reference_volume`,
    /// writing the registered series and a per-volume motion parameter table.
    async fn motion_correct(
        &self,
        input: &Path,
        reference_volume: usize,
        output: &Path,
        parameters: &Path,
    ) -> Result<(), ToolkitError>;

    /// High-pass temporal filter with the given sigma in volumes.
    ///
    /// Intermediate images go to `scratch_dir`, which is created if needed.
    async fn highpass_filter(
        &self,
        input: &Path,
        sigma_volumes: f64,
        scratch_dir: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Voxelwise mean across time.
    async fn temporal_mean(&self, input: &Path, output: &Path) -> Result<(), ToolkitError>;

    /// Voxelwise standard deviation across time.
    async fn temporal_sd(&self, input: &Path, output: &Path) -> Result<(), ToolkitError>;

    /// Evaluates a voxelwise expression.
    async fn maths(&self, expr: &ImageExpr, output: &Path) -> Result<(), ToolkitError>;

    /// Computes a statistic over the voxels of `image`, restricted to the
    /// non-zero voxels of `mask` when given.
    async fn image_stat(
        &self,
        image: &Path,
        stat: ImageStat,
        mask: Option<&Path>,
    ) -> Result<f64, ToolkitError>;

    /// Writes a binary brain mask of `input`.
    async fn skull_strip(&self, input: &Path, output_mask: &Path) -> Result<(), ToolkitError>;

    /// Applies `ops` in order with a spherical kernel of `radius_mm`.
    async fn morphology(
        &self,
        input: &Path,
        ops: &[MorphOp],
        radius_mm: f64,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Copies `len` slices starting at `start` along `axis`.
    async fn extract_range(
        &self,
        input: &Path,
        axis: Axis,
        start: usize,
        len: usize,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Concatenates `inputs` along `axis`; the result carries the header of
    /// the first input.
    async fn concatenate(
        &self,
        inputs: &[&Path],
        axis: Axis,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Reads the voxel-to-world transforms of an image.
    async fn orientation(&self, image: &Path) -> Result<Orientation, ToolkitError>;

    /// Overwrites the voxel-to-world transforms of an image in place.
    async fn set_orientation(
        &self,
        image: &Path,
        orientation: &Orientation,
    ) -> Result<(), ToolkitError>;

    /// Writes the DVARS timecourse of `series` computed within `mask`.
    async fn dvars(&self, series: &Path, mask: &Path, output: &Path) -> Result<(), ToolkitError>;

    /// Writes the mean signal per time point for every label of `labels`.
    async fn labeled_timeseries(
        &self,
        series: &Path,
        labels: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError>;

    /// Renders orthogonal slices of `image` with a fixed intensity window.
    async fn render_slices(
        &self,
        image: &Path,
        range: DisplayRange,
        output: &Path,
    ) -> Result<(), ToolkitError>;
}

/// Summary statistics and report rendering over a finished run directory.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Returns the name of this reporter implementation.
    fn name(&self) -> &str;

    /// Writes the fixed-schema statistics table for `run_dir`.
    async fn compute_statistics(&self, run_dir: &Path, output: &Path)
        -> Result<(), ToolkitError>;

    /// Renders the human-readable report for `run_dir`.
    async fn render_report(&self, run_dir: &Path) -> Result<(), ToolkitError>;
}

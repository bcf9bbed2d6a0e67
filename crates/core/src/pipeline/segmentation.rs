//! Three-way region segmentation: foreground, Nyquist ghost and air.
//!
//! The label image is composed entirely from toolkit calls:
//!
//! 1. threshold = fraction x percentile of the temporal mean
//! 2. foreground mask from skull stripping (in-vivo) or binarizing at the
//!    threshold (phantom)
//! 3. open the mask: erode once, dilate twice
//! 4. swap the two halves of the dilated mask along the phase-encode axis
//!    to get its phase-wrapped copy, then restore the original offset
//! 5. ghost = wrapped AND NOT dilated; air = NOT dilated AND NOT ghost
//! 6. labels = dilated + 2 * ghost + 3 * air
//!
//! Every voxel therefore carries exactly one of the labels 1, 2 or 3.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::toolkit::{Axis, ImageExpr, ImageStat, MorphOp, Toolkit, ToolkitError};

use super::config::intensity_threshold;
use super::types::SampleType;

/// Label value of the foreground region.
pub const FOREGROUND_LABEL: u8 = 1;
/// Label value of the Nyquist ghost region.
pub const GHOST_LABEL: u8 = 2;
/// Label value of the air region.
pub const AIR_LABEL: u8 = 3;

/// Parameters of one segmentation.
#[derive(Debug, Clone)]
pub struct SegmentationParams {
    pub sample_type: SampleType,
    pub threshold_percentile: f64,
    pub threshold_fraction: f64,
    pub kernel_radius_mm: f64,
    pub phase_encode_axis: Axis,
}

/// Values computed along the way, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segmentation {
    pub percentile_value: f64,
    pub threshold: f64,
}

/// Intermediate images inside the scratch directory.
struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn image(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.nii.gz", name))
    }
}

/// Writes the label image for `mean_image` to `output`.
///
/// `scratch_dir` is created for the intermediates and removed afterwards
/// whether or not the segmentation succeeded.
pub async fn segment(
    toolkit: &dyn Toolkit,
    mean_image: &Path,
    params: &SegmentationParams,
    scratch_dir: &Path,
    output: &Path,
) -> Result<Segmentation, ToolkitError> {
    std::fs::create_dir_all(scratch_dir)?;
    let scratch = Scratch {
        dir: scratch_dir.to_path_buf(),
    };

    let result = compose_labels(toolkit, mean_image, params, &scratch, output).await;

    if let Err(e) = std::fs::remove_dir_all(scratch_dir) {
        warn!("Failed to remove scratch directory {}: {}", scratch_dir.display(), e);
    }

    result
}

async fn compose_labels(
    toolkit: &dyn Toolkit,
    mean_image: &Path,
    params: &SegmentationParams,
    scratch: &Scratch,
    output: &Path,
) -> Result<Segmentation, ToolkitError> {
    let percentile_value = toolkit
        .image_stat(
            mean_image,
            ImageStat::Percentile(params.threshold_percentile),
            None,
        )
        .await?;
    let threshold = intensity_threshold(percentile_value, params.threshold_fraction);
    debug!(percentile_value, threshold, "segmentation threshold");

    let foreground = scratch.image("foreground");
    match params.sample_type {
        SampleType::InVivo => toolkit.skull_strip(mean_image, &foreground).await?,
        SampleType::Phantom => {
            toolkit
                .maths(
                    &ImageExpr::Binarize {
                        input: mean_image.to_path_buf(),
                        threshold,
                    },
                    &foreground,
                )
                .await?
        }
    }

    let dilated = scratch.image("foreground_dil");
    toolkit
        .morphology(
            &foreground,
            &[MorphOp::Erode, MorphOp::Dilate, MorphOp::Dilate],
            params.kernel_radius_mm,
            &dilated,
        )
        .await?;

    let wrapped = phase_wrap(toolkit, &dilated, params.phase_encode_axis, scratch).await?;

    let ghost = scratch.image("ghost");
    toolkit
        .maths(
            &ImageExpr::AndNot {
                input: wrapped,
                exclude: dilated.clone(),
            },
            &ghost,
        )
        .await?;

    let outside = scratch.image("outside");
    toolkit
        .maths(
            &ImageExpr::Invert {
                input: dilated.clone(),
            },
            &outside,
        )
        .await?;

    let air = scratch.image("air");
    toolkit
        .maths(
            &ImageExpr::AndNot {
                input: outside,
                exclude: ghost.clone(),
            },
            &air,
        )
        .await?;

    let mut weighted = Vec::with_capacity(3);
    for (mask, label) in [
        (dilated, FOREGROUND_LABEL),
        (ghost, GHOST_LABEL),
        (air, AIR_LABEL),
    ] {
        let scaled = scratch.image(&format!("label{}", label));
        toolkit
            .maths(
                &ImageExpr::Scale {
                    input: mask,
                    factor: f64::from(label),
                },
                &scaled,
            )
            .await?;
        weighted.push(scaled);
    }

    toolkit
        .maths(&ImageExpr::Sum { inputs: weighted }, output)
        .await?;

    Ok(Segmentation {
        percentile_value,
        threshold,
    })
}

/// Swaps the halves of `mask` along `axis` and repairs the translation.
async fn phase_wrap(
    toolkit: &dyn Toolkit,
    mask: &Path,
    axis: Axis,
    scratch: &Scratch,
) -> Result<PathBuf, ToolkitError> {
    let extent = toolkit.series_info(mask).await?.extent(axis);
    if extent < 2 {
        return Err(ToolkitError::Unsupported {
            reason: format!("cannot split {} slices along {}", extent, axis),
        });
    }
    let half = extent / 2;

    let lower = scratch.image("half_lower");
    let upper = scratch.image("half_upper");
    toolkit.extract_range(mask, axis, 0, half, &lower).await?;
    toolkit
        .extract_range(mask, axis, half, extent - half, &upper)
        .await?;

    let wrapped = scratch.image("wrapped");
    toolkit
        .concatenate(&[upper.as_path(), lower.as_path()], axis, &wrapped)
        .await?;

    let original = toolkit.orientation(mask).await?;
    let shifted = toolkit.orientation(&wrapped).await?;
    toolkit
        .set_orientation(&wrapped, &shifted.with_offset_of(&original))
        .await?;

    Ok(wrapped)
}

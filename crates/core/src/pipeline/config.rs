//! Configuration for the pipeline runner.

use serde::{Deserialize, Serialize};

use crate::toolkit::{Axis, DisplayRange};

use super::error::RunnerError;
use super::types::Variant;

/// Configuration for the per-volume QC pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which series the moment images are computed from.
    #[serde(default)]
    pub variant: Variant,

    /// High-pass filter cutoff in seconds, converted to volumes with the TR.
    #[serde(default = "default_highpass_cutoff")]
    pub highpass_cutoff_secs: f64,

    /// Volume that motion correction registers to.
    #[serde(default)]
    pub reference_volume: usize,

    /// Percentile of the mean image the segmentation threshold derives from.
    #[serde(default = "default_threshold_percentile")]
    pub threshold_percentile: f64,

    /// Fraction of that percentile used as the foreground threshold.
    #[serde(default = "default_threshold_fraction")]
    pub threshold_fraction: f64,

    /// Radius of the spherical morphology kernel in millimetres.
    #[serde(default = "default_kernel_radius")]
    pub kernel_radius_mm: f64,

    /// Axis along which Nyquist ghosts wrap.
    #[serde(default = "default_phase_encode_axis")]
    pub phase_encode_axis: Axis,

    /// Suffix appended to the input stem to name the run directory.
    #[serde(default = "default_run_dir_suffix")]
    pub run_dir_suffix: String,

    /// Fixed display windows for the slice renders.
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_highpass_cutoff() -> f64 {
    50.0
}

fn default_threshold_percentile() -> f64 {
    99.0
}

fn default_threshold_fraction() -> f64 {
    0.1
}

fn default_kernel_radius() -> f64 {
    5.0
}

fn default_phase_encode_axis() -> Axis {
    Axis::Y
}

fn default_run_dir_suffix() -> String {
    "_qc".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            highpass_cutoff_secs: default_highpass_cutoff(),
            reference_volume: 0,
            threshold_percentile: default_threshold_percentile(),
            threshold_fraction: default_threshold_fraction(),
            kernel_radius_mm: default_kernel_radius(),
            phase_encode_axis: default_phase_encode_axis(),
            run_dir_suffix: default_run_dir_suffix(),
            render: RenderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets the pipeline variant.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Filter sigma in volumes for a series with the given TR.
    pub fn highpass_sigma_volumes(&self, tr_secs: f64) -> Result<f64, RunnerError> {
        highpass_sigma_volumes(self.highpass_cutoff_secs, tr_secs)
    }

    /// Foreground threshold for a mean image whose configured percentile
    /// is `percentile_value`.
    pub fn intensity_threshold(&self, percentile_value: f64) -> f64 {
        intensity_threshold(percentile_value, self.threshold_fraction)
    }
}

/// Converts a filter cutoff in seconds to a sigma in volumes.
pub fn highpass_sigma_volumes(cutoff_secs: f64, tr_secs: f64) -> Result<f64, RunnerError> {
    if !(tr_secs.is_finite() && tr_secs > 0.0) {
        return Err(RunnerError::InvalidRepetitionTime { tr_secs });
    }
    Ok(cutoff_secs / tr_secs)
}

/// Foreground threshold as a fraction of a robust maximum intensity.
pub fn intensity_threshold(percentile_value: f64, fraction: f64) -> f64 {
    fraction * percentile_value
}

/// Display windows for the orthogonal slice renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_tmean_range")]
    pub tmean: DisplayRange,
    #[serde(default = "default_tsd_range")]
    pub tsd: DisplayRange,
    #[serde(default = "default_tsfnr_range")]
    pub tsfnr: DisplayRange,
    #[serde(default = "default_labels_range")]
    pub labels: DisplayRange,
}

fn default_tmean_range() -> DisplayRange {
    DisplayRange::new(0.0, 2000.0)
}

fn default_tsd_range() -> DisplayRange {
    DisplayRange::new(0.0, 50.0)
}

fn default_tsfnr_range() -> DisplayRange {
    DisplayRange::new(0.0, 100.0)
}

fn default_labels_range() -> DisplayRange {
    DisplayRange::new(0.0, 3.0)
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tmean: default_tmean_range(),
            tsd: default_tsd_range(),
            tsfnr: default_tsfnr_range(),
            labels: default_labels_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.variant, Variant::Filtered);
        assert_eq!(config.highpass_cutoff_secs, 50.0);
        assert_eq!(config.threshold_percentile, 99.0);
        assert_eq!(config.kernel_radius_mm, 5.0);
        assert_eq!(config.phase_encode_axis, Axis::Y);
        assert_eq!(config.run_dir_suffix, "_qc");
    }

    #[test]
    fn test_sigma_conversion() {
        let sigma = highpass_sigma_volumes(50.0, 2.0).unwrap();
        assert!((sigma - 25.0).abs() < 1e-12);

        let sigma = highpass_sigma_volumes(50.0, 0.8).unwrap();
        assert!((sigma - 62.5).abs() < 1e-9);

        let sigma = PipelineConfig::default().highpass_sigma_volumes(3.0).unwrap();
        assert!((sigma - 50.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sigma_rejects_non_positive_tr() {
        assert!(matches!(
            highpass_sigma_volumes(50.0, 0.0),
            Err(RunnerError::InvalidRepetitionTime { .. })
        ));
        assert!(highpass_sigma_volumes(50.0, -2.0).is_err());
        assert!(highpass_sigma_volumes(50.0, f64::NAN).is_err());
    }

    #[test]
    fn test_threshold_is_tenth_of_percentile() {
        let config = PipelineConfig::default();
        assert_eq!(config.intensity_threshold(1000.0), 100.0);
        assert!((config.intensity_threshold(873.0) - 87.3).abs() < 1e-9);
    }

    #[test]
    fn test_partial_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
variant = "unfiltered"
kernel_radius_mm = 3.0

[render.tsfnr]
min = 0.0
max = 250.0
"#,
        )
        .unwrap();
        assert_eq!(config.variant, Variant::Unfiltered);
        assert_eq!(config.kernel_radius_mm, 3.0);
        assert_eq!(config.render.tsfnr.max, 250.0);
        assert_eq!(config.render.labels.max, 3.0);
        assert_eq!(config.highpass_cutoff_secs, 50.0);
    }
}

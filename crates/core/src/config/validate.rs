use crate::scheduler::{DependencyPolicy, SchedulerBackend};

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Pipeline parameters are in range
/// - Run directory suffix is not empty
/// - The scheduler backend can express the dependency policy
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;

    if !(pipeline.highpass_cutoff_secs > 0.0) {
        return Err(ConfigError::ValidationError(
            "pipeline.highpass_cutoff_secs must be positive".to_string(),
        ));
    }

    if !(pipeline.threshold_fraction > 0.0 && pipeline.threshold_fraction <= 1.0) {
        return Err(ConfigError::ValidationError(
            "pipeline.threshold_fraction must be in (0, 1]".to_string(),
        ));
    }

    if !(pipeline.threshold_percentile > 0.0 && pipeline.threshold_percentile <= 100.0) {
        return Err(ConfigError::ValidationError(
            "pipeline.threshold_percentile must be in (0, 100]".to_string(),
        ));
    }

    if !(pipeline.kernel_radius_mm > 0.0) {
        return Err(ConfigError::ValidationError(
            "pipeline.kernel_radius_mm must be positive".to_string(),
        ));
    }

    if pipeline.run_dir_suffix.is_empty() || pipeline.run_dir_suffix.contains('/') {
        return Err(ConfigError::ValidationError(
            "pipeline.run_dir_suffix must be a non-empty file name suffix".to_string(),
        ));
    }

    if config.scheduler.backend == SchedulerBackend::FslSub
        && config.batch.dependency_policy == DependencyPolicy::AllSuccess
    {
        return Err(ConfigError::ValidationError(
            "batch.dependency_policy = \"all_success\" requires scheduler.backend = \"slurm\""
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_pipeline_ranges() {
        let mut config = Config::default();
        config.pipeline.threshold_fraction = 0.0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.pipeline.threshold_percentile = 101.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pipeline.highpass_cutoff_secs = f64::NAN;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pipeline.run_dir_suffix = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_policy_against_backend() {
        let mut config = Config::default();
        config.batch.dependency_policy = DependencyPolicy::AllSuccess;
        assert!(validate_config(&config).is_err());

        config.scheduler.backend = SchedulerBackend::Slurm;
        assert!(validate_config(&config).is_ok());
    }
}

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FMRIQC_CONFIG";

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fmriqc.toml";

fn env_provider() -> Env {
    Env::prefixed("FMRIQC_").split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// The configuration file to use, if any: `$FMRIQC_CONFIG`, else
/// `fmriqc.toml` when it exists in the working directory.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

/// Load the configuration selected by [`default_config_path`], falling back
/// to built-in defaults with environment overrides.
pub fn load_default_config() -> Result<Config, ConfigError> {
    match default_config_path() {
        Some(path) => load_config(&path),
        None => Figment::from(Serialized::defaults(Config::default()))
            .merge(env_provider())
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string())),
    }
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Variant;
    use crate::scheduler::{DependencyPolicy, SchedulerBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_empty_is_default() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.pipeline.highpass_cutoff_secs, 50.0);
        assert_eq!(config.batch.summary_filename, "qc_summary_all.csv");
        assert_eq!(config.scheduler.backend, SchedulerBackend::FslSub);
    }

    #[test]
    fn test_load_config_from_str_sections() {
        let toml = r#"
[pipeline]
variant = "unfiltered"

[toolkit]
fsl_dir = "/usr/local/fsl"

[batch]
dependency_policy = "all_success"

[scheduler]
backend = "slurm"
queue = "short"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.pipeline.variant, Variant::Unfiltered);
        assert_eq!(
            config.toolkit.tool_path("bet"),
            PathBuf::from("/usr/local/fsl/bin/bet")
        );
        assert_eq!(config.batch.dependency_policy, DependencyPolicy::AllSuccess);
        assert_eq!(config.scheduler.backend, SchedulerBackend::Slurm);
    }

    #[test]
    fn test_load_config_from_str_bad_value() {
        let result = load_config_from_str("[pipeline]\nvariant = \"smoothed\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/fmriqc.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[pipeline]
kernel_radius_mm = 4.0
phase_encode_axis = "x"

[reporter]
stats_command = ["python3", "/opt/qc/stats.py"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.kernel_radius_mm, 4.0);
        assert_eq!(config.pipeline.threshold_fraction, 0.1);
        assert_eq!(config.reporter.stats_command.len(), 2);
    }
}

//! Run directory naming and the fixed artifact file names inside it.

use std::path::{Path, PathBuf};

use crate::toolkit::strip_image_extension;

use super::error::RunnerError;
use super::types::{StageId, Variant};

/// Derives the run directory name for an input volume.
pub trait RunIdentifier: Send + Sync {
    /// Returns the directory name (not a path) for `input`.
    fn run_dir_name(&self, input: &Path) -> Result<String, RunnerError>;
}

/// Strips the image extension from the file name and appends a suffix.
#[derive(Debug, Clone)]
pub struct SuffixIdentifier {
    suffix: String,
}

impl SuffixIdentifier {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for SuffixIdentifier {
    fn default() -> Self {
        Self::new("_qc")
    }
}

impl RunIdentifier for SuffixIdentifier {
    fn run_dir_name(&self, input: &Path) -> Result<String, RunnerError> {
        let file_name = input
            .file_name()
            .ok_or_else(|| RunnerError::InvalidName {
                path: input.to_path_buf(),
            })?;
        let stem = strip_image_extension(Path::new(file_name));
        let stem = stem.to_string_lossy();
        // the name is the first field of the summary row
        if stem.is_empty()
            || stem.starts_with('.')
            || stem.contains(|c: char| c == ',' || c == '"' || c.is_control())
        {
            return Err(RunnerError::InvalidName {
                path: input.to_path_buf(),
            });
        }
        Ok(format!("{}{}", stem, self.suffix))
    }
}

/// File names of every artifact in one run directory.
#[derive(Debug, Clone)]
pub struct RunLayout {
    dir: PathBuf,
    variant: Variant,
}

impl RunLayout {
    pub fn new(dir: impl Into<PathBuf>, variant: Variant) -> Self {
        Self {
            dir: dir.into(),
            variant,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn tagged(&self, base: &str) -> PathBuf {
        self.file(&format!("{}{}.nii.gz", base, self.variant.artifact_tag()))
    }

    pub fn motion_corrected(&self) -> PathBuf {
        self.file("mcf.nii.gz")
    }

    pub fn motion_parameters(&self) -> PathBuf {
        self.file("mcf.par")
    }

    pub fn filtered(&self) -> PathBuf {
        self.file("mcf_hpf.nii.gz")
    }

    /// The series the moment images are computed from.
    pub fn moment_source(&self) -> PathBuf {
        if self.variant.uses_filtered_series() {
            self.filtered()
        } else {
            self.motion_corrected()
        }
    }

    pub fn temporal_mean(&self) -> PathBuf {
        self.tagged("tmean")
    }

    pub fn temporal_sd(&self) -> PathBuf {
        self.tagged("tsd")
    }

    pub fn tsfnr(&self) -> PathBuf {
        self.tagged("tsfnr")
    }

    pub fn labels(&self) -> PathBuf {
        self.file("labels.nii.gz")
    }

    pub fn dvars(&self) -> PathBuf {
        self.file("dvars.txt")
    }

    pub fn region_timeseries(&self) -> PathBuf {
        self.file("roi_timeseries.txt")
    }

    pub fn statistics(&self) -> PathBuf {
        self.file("qc_stats.csv")
    }

    pub fn summary(&self) -> PathBuf {
        self.file("qc_summary.csv")
    }

    pub fn status(&self) -> PathBuf {
        self.file("qc_status.json")
    }

    pub fn metrics(&self) -> PathBuf {
        self.file("metrics.prom")
    }

    /// Scratch directory for intermediate images.
    pub fn scratch(&self) -> PathBuf {
        self.file(".scratch")
    }

    /// Slice render of `image`, named after the image.
    pub fn render_of(&self, image: &Path) -> PathBuf {
        let stem = strip_image_extension(image);
        let name = stem
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.file(&format!("{}_ortho.png", name))
    }

    /// Images rendered on every run.
    pub fn rendered_images(&self) -> [PathBuf; 4] {
        [
            self.temporal_mean(),
            self.temporal_sd(),
            self.tsfnr(),
            self.labels(),
        ]
    }

    /// Artifacts that mark a gated stage complete.
    pub fn artifacts(&self, stage: StageId) -> Vec<PathBuf> {
        match stage {
            StageId::MotionCorrection => vec![self.motion_corrected(), self.motion_parameters()],
            StageId::HighpassFilter => vec![self.filtered()],
            StageId::TemporalMean => vec![self.temporal_mean()],
            StageId::TemporalSd => vec![self.temporal_sd()],
            StageId::Tsfnr => vec![self.tsfnr()],
            StageId::Segmentation => vec![self.labels()],
            StageId::Dvars => vec![self.dvars()],
            StageId::RegionTimeseries => vec![self.region_timeseries()],
            StageId::Statistics => vec![self.statistics()],
            StageId::SummaryRow => vec![self.summary()],
            StageId::Render => self
                .rendered_images()
                .iter()
                .map(|image| self.render_of(image))
                .collect(),
            StageId::TsfnrSummary | StageId::Report => Vec::new(),
        }
    }
}

/// Whether `path` is a non-empty regular file.
pub fn is_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_suffix_identifier() {
        let id = SuffixIdentifier::default();
        assert_eq!(
            id.run_dir_name(Path::new("/study/rawdata/sub-01/ses-1/func/sub-01_bold.nii.gz"))
                .unwrap(),
            "sub-01_bold_qc"
        );
        assert_eq!(id.run_dir_name(Path::new("scan.nii")).unwrap(), "scan_qc");
        assert_eq!(
            SuffixIdentifier::new(".qc")
                .run_dir_name(Path::new("a/b.nii.gz"))
                .unwrap(),
            "b.qc"
        );
    }

    #[test]
    fn test_suffix_identifier_rejects_bare_extension() {
        let id = SuffixIdentifier::default();
        assert!(matches!(
            id.run_dir_name(Path::new("/data/.nii.gz")),
            Err(RunnerError::InvalidName { .. })
        ));
        assert!(id.run_dir_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_suffix_identifier_rejects_csv_delimiters() {
        let id = SuffixIdentifier::default();
        for name in ["sub-01,run-2_bold.nii.gz", "sub-01\"bold.nii", "sub-01\nbold.nii.gz"] {
            let err = id.run_dir_name(Path::new(name)).unwrap_err();
            assert!(matches!(err, RunnerError::InvalidName { .. }), "{}", name);
            assert!(err.is_user_error());
        }
    }

    #[test]
    fn test_variant_tags_moment_images() {
        let filtered = RunLayout::new("/out/run_qc", Variant::Filtered);
        assert_eq!(
            filtered.temporal_mean(),
            PathBuf::from("/out/run_qc/tmean_hpf.nii.gz")
        );
        assert_eq!(filtered.moment_source(), filtered.filtered());

        let unfiltered = RunLayout::new("/out/run_qc", Variant::Unfiltered);
        assert_eq!(
            unfiltered.tsfnr(),
            PathBuf::from("/out/run_qc/tsfnr.nii.gz")
        );
        assert_eq!(unfiltered.moment_source(), unfiltered.motion_corrected());
    }

    #[test]
    fn test_render_names() {
        let layout = RunLayout::new("/out/run_qc", Variant::Filtered);
        assert_eq!(
            layout.render_of(&layout.tsfnr()),
            PathBuf::from("/out/run_qc/tsfnr_hpf_ortho.png")
        );
        assert_eq!(layout.artifacts(StageId::Render).len(), 4);
    }

    #[test]
    fn test_every_gated_stage_has_artifacts() {
        let layout = RunLayout::new("/out/run_qc", Variant::Filtered);
        for stage in StageId::ALL {
            if stage.is_gated() {
                assert!(!layout.artifacts(stage).is_empty(), "{stage}");
            }
        }
    }

    #[test]
    fn test_is_present() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.txt");
        let full = dir.path().join("full.txt");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"1.0\n").unwrap();

        assert!(!is_present(&empty));
        assert!(is_present(&full));
        assert!(!is_present(&dir.path().join("missing.txt")));
        assert!(!is_present(dir.path()));
    }
}

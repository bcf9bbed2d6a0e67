//! Discovery of input volumes under a study root.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::metrics;

use super::error::BatchError;

/// Result of scanning a study root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Non-empty candidates in sorted order.
    pub valid: Vec<PathBuf>,
    /// Zero-byte candidates, excluded from the batch.
    pub empty: Vec<PathBuf>,
}

/// Finds every file matching `pattern` under `study_root`.
///
/// Zero-byte matches are reported and excluded. Fails when no non-empty
/// match remains.
pub fn discover_inputs(study_root: &Path, pattern: &str) -> Result<Discovery, BatchError> {
    if !study_root.is_dir() {
        return Err(BatchError::StudyRootNotFound {
            path: study_root.to_path_buf(),
        });
    }

    let full = study_root.join(pattern);
    let full = full.to_string_lossy();
    let matches = glob::glob(&full).map_err(|e| BatchError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut candidates: Vec<PathBuf> = matches
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();

    let mut discovery = Discovery::default();
    for path in candidates {
        let len = std::fs::metadata(&path)?.len();
        if len == 0 {
            warn!("Skipping empty input volume {}", path.display());
            metrics::SCANS_DISCOVERED.with_label_values(&["empty"]).inc();
            discovery.empty.push(path);
        } else {
            debug!("Discovered {}", path.display());
            metrics::SCANS_DISCOVERED.with_label_values(&["valid"]).inc();
            discovery.valid.push(path);
        }
    }

    if discovery.valid.is_empty() {
        return Err(BatchError::NoInputs {
            root: study_root.to_path_buf(),
            pattern: pattern.to_string(),
            empty: discovery.empty.len(),
        });
    }

    Ok(discovery)
}

fn is_literal(component: &str) -> bool {
    !component.contains(['*', '?', '['])
}

/// Directory, relative to the QC root, that mirrors where `input` sits in
/// the raw tree.
///
/// The literal leading directories of `pattern` (such as `rawdata`) and its
/// literal trailing directories (such as `func`) are dropped, so an input
/// at `rawdata/sub-01/ses-1/func/x_bold.nii.gz` maps to `sub-01/ses-1`.
pub fn output_subdir(study_root: &Path, pattern: &str, input: &Path) -> PathBuf {
    let pattern_dirs: Vec<&str> = {
        let mut parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
        parts.pop();
        parts
    };
    let leading = pattern_dirs.iter().take_while(|c| is_literal(c)).count();
    let trailing = if leading == pattern_dirs.len() {
        0
    } else {
        pattern_dirs.iter().rev().take_while(|c| is_literal(c)).count()
    };

    let parent = input.parent().unwrap_or(input);
    let relative = parent.strip_prefix(study_root).unwrap_or(parent);
    let parts: Vec<&std::ffi::OsStr> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    if parts.len() < leading + trailing {
        return PathBuf::new();
    }
    parts[leading..parts.len() - trailing].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PATTERN: &str = "rawdata/sub-*/ses-*/func/*_bold.nii*";

    fn touch(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discovery_excludes_empty_files() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "rawdata/sub-02/ses-1/func/sub-02_ses-1_bold.nii.gz", b"nifti");
        touch(root.path(), "rawdata/sub-01/ses-1/func/sub-01_ses-1_bold.nii.gz", b"nifti");
        touch(root.path(), "rawdata/sub-01/ses-2/func/sub-01_ses-2_bold.nii", b"nifti");
        touch(root.path(), "rawdata/sub-03/ses-1/func/sub-03_ses-1_bold.nii.gz", b"");
        touch(root.path(), "rawdata/sub-01/ses-1/anat/sub-01_ses-1_T1w.nii.gz", b"nifti");

        let discovery = discover_inputs(root.path(), PATTERN).unwrap();
        assert_eq!(discovery.valid.len(), 3);
        assert_eq!(discovery.empty.len(), 1);
        assert!(discovery.valid[0].ends_with("sub-01_ses-1_bold.nii.gz"));
        assert!(discovery.empty[0].ends_with("sub-03_ses-1_bold.nii.gz"));
    }

    #[test]
    fn test_discovery_with_only_empty_files_fails() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "rawdata/sub-01/ses-1/func/sub-01_bold.nii.gz", b"");

        match discover_inputs(root.path(), PATTERN) {
            Err(BatchError::NoInputs { empty, .. }) => assert_eq!(empty, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_study_root() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nope");
        assert!(matches!(
            discover_inputs(&missing, PATTERN),
            Err(BatchError::StudyRootNotFound { .. })
        ));
    }

    #[test]
    fn test_output_subdir_mirrors_subject_session() {
        let root = Path::new("/data/study");
        let input = root.join("rawdata/sub-01/ses-2/func/sub-01_ses-2_bold.nii.gz");
        assert_eq!(
            output_subdir(root, PATTERN, &input),
            PathBuf::from("sub-01/ses-2")
        );
        assert_eq!(
            output_subdir(root, "*.nii.gz", &root.join("scan.nii.gz")),
            PathBuf::new()
        );
        assert_eq!(
            output_subdir(root, "scans/*/*.nii", &root.join("scans/a/x.nii")),
            PathBuf::from("a")
        );
    }
}

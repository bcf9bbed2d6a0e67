//! Types shared by the toolkit delegates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions recognised as image files, longest first.
pub const IMAGE_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// Returns `path` with a trailing image extension removed.
pub fn strip_image_extension(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    for ext in IMAGE_EXTENSIONS {
        if let Some(stem) = text.strip_suffix(ext) {
            return PathBuf::from(stem);
        }
    }
    path.to_path_buf()
}

/// A spatial axis of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Zero-based index into a dimension array.
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Flag used by `fslmerge` to concatenate along this axis.
    pub fn merge_flag(self) -> &'static str {
        match self {
            Self::X => "-x",
            Self::Y => "-y",
            Self::Z => "-z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Z => write!(f, "z"),
        }
    }
}

/// Geometry and timing of an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Voxel counts along x, y, z and the number of volumes.
    pub dims: [usize; 4],
    /// Repetition time in seconds.
    pub tr_secs: f64,
}

impl SeriesInfo {
    /// Number of volumes (time points).
    pub fn n_volumes(&self) -> usize {
        self.dims[3].max(1)
    }

    /// Voxel count along a spatial axis.
    pub fn extent(&self, axis: Axis) -> usize {
        self.dims[axis.index()]
    }
}

/// Voxelwise arithmetic evaluated by the toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageExpr {
    /// `numerator / denominator`, zero where the denominator is zero.
    Divide {
        numerator: PathBuf,
        denominator: PathBuf,
    },
    /// 1 where `input >= threshold`, else 0.
    Binarize { input: PathBuf, threshold: f64 },
    /// 1 where `input == label`, else 0.
    SelectLabel { input: PathBuf, label: u8 },
    /// 1 where `input == 0`, else 0.
    Invert { input: PathBuf },
    /// 1 where `input != 0` and `exclude == 0`.
    AndNot { input: PathBuf, exclude: PathBuf },
    /// `input * factor`.
    Scale { input: PathBuf, factor: f64 },
    /// Voxelwise sum of all inputs.
    Sum { inputs: Vec<PathBuf> },
}

/// A scalar statistic over voxel intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageStat {
    /// Percentile in `(0, 100]`.
    Percentile(f64),
    Mean,
    Median,
}

/// Morphological operation with a spherical kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erode,
    Dilate,
}

/// Voxel-to-world transforms of an image, row-major 4x4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub sform: [f64; 16],
    pub qform: [f64; 16],
}

/// Indices of the translation column in a row-major 4x4 matrix.
const TRANSLATION: [usize; 3] = [3, 7, 11];

impl Orientation {
    /// Identity transforms.
    pub fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self { sform: m, qform: m }
    }

    /// Translation part of the sform.
    pub fn offset(&self) -> [f64; 3] {
        TRANSLATION.map(|i| self.sform[i])
    }

    /// Keeps this orientation's scale and rotation but takes the translation
    /// of `reference`.
    pub fn with_offset_of(&self, reference: &Orientation) -> Self {
        let mut repaired = *self;
        for i in TRANSLATION {
            repaired.sform[i] = reference.sform[i];
            repaired.qform[i] = reference.qform[i];
        }
        repaired
    }
}

/// Fixed intensity window for slice renders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_image_extension() {
        assert_eq!(
            strip_image_extension(Path::new("/data/sub-01_bold.nii.gz")),
            PathBuf::from("/data/sub-01_bold")
        );
        assert_eq!(
            strip_image_extension(Path::new("run.nii")),
            PathBuf::from("run")
        );
        assert_eq!(
            strip_image_extension(Path::new("motion.par")),
            PathBuf::from("motion.par")
        );
    }

    #[test]
    fn test_axis_index() {
        assert_eq!(Axis::X.index(), 0);
        assert_eq!(Axis::Y.index(), 1);
        assert_eq!(Axis::Z.index(), 2);
        assert_eq!(Axis::Y.merge_flag(), "-y");
    }

    #[test]
    fn test_n_volumes_of_3d_image() {
        let info = SeriesInfo {
            dims: [64, 64, 30, 0],
            tr_secs: 0.0,
        };
        assert_eq!(info.n_volumes(), 1);
        assert_eq!(info.extent(Axis::Y), 64);
    }

    #[test]
    fn test_with_offset_of_only_touches_translation() {
        let mut wrapped = Orientation::identity();
        wrapped.sform[0] = -2.0;
        wrapped.sform[5] = 2.5;
        wrapped.sform[7] = 40.0;
        wrapped.qform[7] = 40.0;

        let mut original = Orientation::identity();
        original.sform[3] = 90.0;
        original.sform[7] = -126.0;
        original.sform[11] = -72.0;
        original.qform[7] = -126.0;

        let repaired = wrapped.with_offset_of(&original);
        assert_eq!(repaired.offset(), [90.0, -126.0, -72.0]);
        assert_eq!(repaired.qform[7], -126.0);
        assert_eq!(repaired.sform[0], -2.0);
        assert_eq!(repaired.sform[5], 2.5);
    }
}

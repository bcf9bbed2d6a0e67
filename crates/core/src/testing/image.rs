//! Small in-memory volumes stored as JSON, used by [`MockToolkit`].
//!
//! [`MockToolkit`]: super::MockToolkit

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::toolkit::{Axis, Orientation, ToolkitError};

/// A 4D volume with its header.
///
/// Voxels are stored x-fastest: index `((t * nz + z) * ny + y) * nx + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockImage {
    pub dims: [usize; 4],
    pub tr_secs: f64,
    /// Isotropic voxel size in millimetres.
    pub voxel_mm: f64,
    pub orientation: Orientation,
    pub data: Vec<f64>,
}

impl MockImage {
    /// A zero-filled volume.
    pub fn zeros(dims: [usize; 4], tr_secs: f64) -> Self {
        let dims = [dims[0], dims[1], dims[2], dims[3].max(1)];
        let mut orientation = Orientation::identity();
        for diagonal in [0, 5, 10] {
            orientation.sform[diagonal] = 3.0;
            orientation.qform[diagonal] = 3.0;
        }
        Self {
            dims,
            tr_secs,
            voxel_mm: 3.0,
            orientation,
            data: vec![0.0; dims.iter().product()],
        }
    }

    /// A volume filled from `f(x, y, z, t)`.
    pub fn from_fn(
        dims: [usize; 4],
        tr_secs: f64,
        f: impl Fn(usize, usize, usize, usize) -> f64,
    ) -> Self {
        let mut image = Self::zeros(dims, tr_secs);
        let [nx, ny, nz, nt] = image.dims;
        for t in 0..nt {
            for z in 0..nz {
                for y in 0..ny {
                    for x in 0..nx {
                        let i = image.index(x, y, z, t);
                        image.data[i] = f(x, y, z, t);
                    }
                }
            }
        }
        image
    }

    /// A 3D volume with the same spatial header as `self`.
    pub fn spatial_like(&self) -> Self {
        let mut image = self.clone();
        image.dims[3] = 1;
        image.data = vec![0.0; self.spatial_len()];
        image
    }

    pub fn read(path: &Path) -> Result<Self, ToolkitError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolkitError::InputNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ToolkitError::Io(e)
            }
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ToolkitError::parse("mock", format!("{}: {}", path.display(), e)))
    }

    pub fn write(&self, path: &Path) -> Result<(), ToolkitError> {
        let json = serde_json::to_string(self)
            .map_err(|e| ToolkitError::parse("mock", e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn n_volumes(&self) -> usize {
        self.dims[3]
    }

    pub fn spatial_len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn index(&self, x: usize, y: usize, z: usize, t: usize) -> usize {
        ((t * self.dims[2] + z) * self.dims[1] + y) * self.dims[0] + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize, t: usize) -> f64 {
        self.data[self.index(x, y, z, t)]
    }

    /// Voxels of volume `t`.
    pub fn volume(&self, t: usize) -> &[f64] {
        let n = self.spatial_len();
        &self.data[t * n..(t + 1) * n]
    }

    /// Time course of spatial voxel `v`.
    pub fn timecourse(&self, v: usize) -> Vec<f64> {
        let n = self.spatial_len();
        (0..self.n_volumes()).map(|t| self.data[t * n + v]).collect()
    }

    /// Spatial coordinates of voxel index `v` within one volume.
    pub fn coords(&self, v: usize) -> [usize; 3] {
        let nx = self.dims[0];
        let ny = self.dims[1];
        [v % nx, (v / nx) % ny, v / (nx * ny)]
    }

    pub fn same_shape(&self, other: &MockImage) -> bool {
        self.dims[..3] == other.dims[..3]
    }

    /// Count of voxels in volume 0 holding `value`.
    pub fn count_value(&self, value: f64) -> usize {
        self.volume(0).iter().filter(|&&v| v == value).count()
    }

    /// Slab `start..start + len` along `axis`, with the offset moved so the
    /// slab keeps its world position.
    pub fn slab(&self, axis: Axis, start: usize, len: usize) -> Result<Self, ToolkitError> {
        let extent = self.dims[axis.index()];
        if len == 0 || start + len > extent {
            return Err(ToolkitError::Unsupported {
                reason: format!("slab {}+{} outside {} slices along {}", start, len, extent, axis),
            });
        }
        let mut dims = self.dims;
        dims[axis.index()] = len;
        let mut out = Self::from_fn(dims, self.tr_secs, |x, y, z, t| {
            let mut c = [x, y, z];
            c[axis.index()] += start;
            self.get(c[0], c[1], c[2], t)
        });
        out.voxel_mm = self.voxel_mm;
        out.orientation = self.orientation;
        let row = [3, 7, 11][axis.index()];
        let shift = start as f64 * self.voxel_mm;
        out.orientation.sform[row] += shift;
        out.orientation.qform[row] += shift;
        Ok(out)
    }

    /// Concatenation along `axis`; the header comes from the first part.
    pub fn concat(parts: &[MockImage], axis: Axis) -> Result<Self, ToolkitError> {
        let first = parts.first().ok_or_else(|| ToolkitError::Unsupported {
            reason: "nothing to concatenate".to_string(),
        })?;
        for part in parts {
            for a in [Axis::X, Axis::Y, Axis::Z] {
                if a != axis && part.dims[a.index()] != first.dims[a.index()] {
                    return Err(ToolkitError::Unsupported {
                        reason: format!("extent mismatch along {}", a),
                    });
                }
            }
            if part.dims[3] != first.dims[3] {
                return Err(ToolkitError::Unsupported {
                    reason: "volume count mismatch".to_string(),
                });
            }
        }

        let mut dims = first.dims;
        dims[axis.index()] = parts.iter().map(|p| p.dims[axis.index()]).sum();
        let mut out = Self::from_fn(dims, first.tr_secs, |x, y, z, t| {
            let mut c = [x, y, z];
            let mut k = c[axis.index()];
            for part in parts {
                let n = part.dims[axis.index()];
                if k < n {
                    c[axis.index()] = k;
                    return part.get(c[0], c[1], c[2], t);
                }
                k -= n;
            }
            0.0
        });
        out.voxel_mm = first.voxel_mm;
        out.orientation = first.orientation;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_index_layout() {
        let image = MockImage::from_fn([4, 3, 2, 2], 2.0, |x, y, z, t| {
            (x + 10 * y + 100 * z + 1000 * t) as f64
        });
        assert_eq!(image.get(3, 2, 1, 1), 1123.0);
        assert_eq!(image.volume(1)[0], 1000.0);
        assert_eq!(image.coords(image.index(3, 2, 1, 0)), [3, 2, 1]);
        assert_eq!(image.timecourse(image.index(1, 1, 0, 0)), vec![11.0, 1011.0]);
    }

    #[test]
    fn test_slab_and_concat_restore_data() {
        let image = MockImage::from_fn([2, 6, 1, 1], 1.0, |_, y, _, _| y as f64);
        let lower = image.slab(Axis::Y, 0, 3).unwrap();
        let upper = image.slab(Axis::Y, 3, 3).unwrap();
        assert_eq!(upper.orientation.offset()[1], 9.0);

        let swapped = MockImage::concat(&[upper.clone(), lower.clone()], Axis::Y).unwrap();
        assert_eq!(swapped.get(0, 0, 0, 0), 3.0);
        assert_eq!(swapped.get(0, 5, 0, 0), 2.0);
        assert_eq!(swapped.orientation, upper.orientation);

        let restored = MockImage::concat(&[lower, upper], Axis::Y).unwrap();
        assert_eq!(restored.data, image.data);
        assert!(image.slab(Axis::Y, 4, 3).is_err());
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img.nii.gz");
        let image = MockImage::from_fn([2, 2, 2, 3], 0.8, |x, _, _, t| (x * t) as f64);
        image.write(&path).unwrap();
        assert_eq!(MockImage::read(&path).unwrap(), image);
        assert!(matches!(
            MockImage::read(&dir.path().join("missing.nii.gz")),
            Err(ToolkitError::InputNotFound { .. })
        ));
    }
}

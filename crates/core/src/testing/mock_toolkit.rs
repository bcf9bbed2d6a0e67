//! Mock toolkit for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::toolkit::{
    Axis, DisplayRange, ImageExpr, ImageStat, MorphOp, Orientation, SeriesInfo, Toolkit,
    ToolkitError,
};

use super::image::MockImage;

/// A recorded toolkit call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolkitCall {
    /// Trait method name, e.g. `"motion_correct"`.
    pub operation: String,
    /// Path the call wrote.
    pub output: PathBuf,
}

/// Mock implementation of the Toolkit trait.
///
/// Images are [`MockImage`] JSON files, so every operation does real
/// (if simplified) voxel arithmetic and tests can inspect the results:
/// - motion correction is the identity with zero motion parameters
/// - the high-pass filter removes each voxel's linear trend and keeps its mean
/// - skull stripping keeps voxels at or above 10% of the maximum
/// - statistics ignore zero voxels, as `fslstats -P`/`-M` do
///
/// # Example
///
/// ```rust,ignore
/// use fmriqc_core::testing::{fixtures, MockToolkit};
///
/// let toolkit = MockToolkit::new();
/// fixtures::phantom_series(&input)?;
///
/// runner.run(&request).await?;
/// assert_eq!(toolkit.call_count("motion_correct").await, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockToolkit {
    calls: Arc<RwLock<Vec<ToolkitCall>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockToolkit {
    /// Create a new mock toolkit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<ToolkitCall> {
        self.calls.read().await.clone()
    }

    /// Number of calls to `operation`.
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Make every call to `operation` fail with a command failure.
    pub async fn fail_on(&self, operation: &str) {
        self.failing.write().await.insert(operation.to_string());
    }

    /// Stop failing `operation`.
    pub async fn clear_failure(&self, operation: &str) {
        self.failing.write().await.remove(operation);
    }

    async fn record(&self, operation: &str, output: &Path) -> Result<(), ToolkitError> {
        self.calls.write().await.push(ToolkitCall {
            operation: operation.to_string(),
            output: output.to_path_buf(),
        });
        if self.failing.read().await.contains(operation) {
            return Err(ToolkitError::command_failed(
                operation,
                Some(1),
                "mock failure",
            ));
        }
        Ok(())
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), ToolkitError> {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}

/// Values the statistics are taken over: non-zero voxels, restricted to
/// non-zero mask voxels when a mask is given.
fn sample(image: &MockImage, mask: Option<&MockImage>) -> Result<Vec<f64>, ToolkitError> {
    if let Some(mask) = mask {
        if !mask.same_shape(image) {
            return Err(ToolkitError::Unsupported {
                reason: "mask shape differs from image".to_string(),
            });
        }
    }
    let n = image.spatial_len();
    let mut values = Vec::new();
    for t in 0..image.n_volumes() {
        for v in 0..n {
            let inside = mask.map(|m| m.volume(0)[v] != 0.0).unwrap_or(true);
            let value = image.data[t * n + v];
            if inside && value != 0.0 {
                values.push(value);
            }
        }
    }
    Ok(values)
}

/// Nearest-rank percentile.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn binary(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Offsets inside a sphere of `radius_mm` on a grid of `voxel_mm` spacing.
fn sphere(radius_mm: f64, voxel_mm: f64) -> Vec<[isize; 3]> {
    let r = (radius_mm / voxel_mm).floor() as isize;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = ((dx * dx + dy * dy + dz * dz) as f64) * voxel_mm * voxel_mm;
                if d2 <= radius_mm * radius_mm {
                    offsets.push([dx, dy, dz]);
                }
            }
        }
    }
    offsets
}

fn morph(image: &MockImage, op: MorphOp, kernel: &[[isize; 3]]) -> MockImage {
    let mut out = image.spatial_like();
    let [nx, ny, nz, _] = image.dims;
    for v in 0..image.spatial_len() {
        let [x, y, z] = image.coords(v);
        let mut neighbours = kernel.iter().filter_map(|[dx, dy, dz]| {
            let (xi, yi, zi) = (x as isize + dx, y as isize + dy, z as isize + dz);
            let inside = (0..nx as isize).contains(&xi)
                && (0..ny as isize).contains(&yi)
                && (0..nz as isize).contains(&zi);
            inside.then(|| image.get(xi as usize, yi as usize, zi as usize, 0) != 0.0)
        });
        let set = match op {
            MorphOp::Erode => neighbours.all(|on| on),
            MorphOp::Dilate => neighbours.any(|on| on),
        };
        out.data[v] = binary(set);
    }
    out
}

fn pairwise(a: &Path, b: &Path, f: impl Fn(f64, f64) -> f64) -> Result<MockImage, ToolkitError> {
    let a = MockImage::read(a)?;
    let b = MockImage::read(b)?;
    if !a.same_shape(&b) {
        return Err(ToolkitError::Unsupported {
            reason: "operand shapes differ".to_string(),
        });
    }
    let n = a.spatial_len();
    let mut out = a;
    for (i, value) in out.data.iter_mut().enumerate() {
        let other = b.data[if b.n_volumes() == 1 { i % n } else { i }];
        *value = f(*value, other);
    }
    Ok(out)
}

fn unary(input: &Path, f: impl Fn(f64) -> f64) -> Result<MockImage, ToolkitError> {
    let mut image = MockImage::read(input)?;
    for value in image.data.iter_mut() {
        *value = f(*value);
    }
    Ok(image)
}

fn evaluate(expr: &ImageExpr) -> Result<MockImage, ToolkitError> {
    match expr {
        ImageExpr::Divide {
            numerator,
            denominator,
        } => pairwise(numerator, denominator, |a, b| if b == 0.0 { 0.0 } else { a / b }),
        ImageExpr::Binarize { input, threshold } => {
            let threshold = *threshold;
            unary(input, |v| binary(v != 0.0 && v >= threshold))
        }
        ImageExpr::SelectLabel { input, label } => {
            let label = f64::from(*label);
            unary(input, |v| binary(v == label))
        }
        ImageExpr::Invert { input } => unary(input, |v| binary(v == 0.0)),
        ImageExpr::AndNot { input, exclude } => {
            pairwise(input, exclude, |a, b| binary(a != 0.0 && b == 0.0))
        }
        ImageExpr::Scale { input, factor } => {
            let factor = *factor;
            unary(input, |v| v * factor)
        }
        ImageExpr::Sum { inputs } => {
            let (first, rest) = inputs.split_first().ok_or_else(|| ToolkitError::Unsupported {
                reason: "empty sum".to_string(),
            })?;
            let mut total = MockImage::read(first)?;
            for path in rest {
                let next = MockImage::read(path)?;
                if next.dims != total.dims {
                    return Err(ToolkitError::Unsupported {
                        reason: "operand shapes differ".to_string(),
                    });
                }
                for (a, b) in total.data.iter_mut().zip(next.data) {
                    *a += b;
                }
            }
            Ok(total)
        }
    }
}

#[async_trait]
impl Toolkit for MockToolkit {
    fn name(&self) -> &str {
        "mock"
    }

    async fn series_info(&self, image: &Path) -> Result<SeriesInfo, ToolkitError> {
        let image = MockImage::read(image)?;
        Ok(SeriesInfo {
            dims: image.dims,
            tr_secs: image.tr_secs,
        })
    }

    async fn motion_correct(
        &self,
        input: &Path,
        reference_volume: usize,
        output: &Path,
        parameters: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("motion_correct", output).await?;
        let image = MockImage::read(input)?;
        if reference_volume >= image.n_volumes() {
            return Err(ToolkitError::Unsupported {
                reason: format!(
                    "reference volume {} of {}",
                    reference_volume,
                    image.n_volumes()
                ),
            });
        }
        image.write(output)?;
        let rows: Vec<String> = (0..image.n_volumes())
            .map(|_| "0 0 0 0 0 0".to_string())
            .collect();
        write_lines(parameters, &rows)
    }

    async fn highpass_filter(
        &self,
        input: &Path,
        sigma_volumes: f64,
        _scratch_dir: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("highpass_filter", output).await?;
        if !(sigma_volumes > 0.0) {
            return Err(ToolkitError::Unsupported {
                reason: format!("sigma {}", sigma_volumes),
            });
        }
        let mut image = MockImage::read(input)?;
        let nt = image.n_volumes();
        let n = image.spatial_len();
        let t_mean = (nt as f64 - 1.0) / 2.0;
        let t_var: f64 = (0..nt).map(|t| (t as f64 - t_mean).powi(2)).sum();
        for v in 0..n {
            let course = image.timecourse(v);
            let m = mean(&course);
            let slope = if t_var > 0.0 {
                course
                    .iter()
                    .enumerate()
                    .map(|(t, x)| (t as f64 - t_mean) * (x - m))
                    .sum::<f64>()
                    / t_var
            } else {
                0.0
            };
            for (t, x) in course.iter().enumerate() {
                image.data[t * n + v] = x - slope * (t as f64 - t_mean);
            }
        }
        image.write(output)
    }

    async fn temporal_mean(&self, input: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.record("temporal_mean", output).await?;
        let image = MockImage::read(input)?;
        let mut out = image.spatial_like();
        for v in 0..image.spatial_len() {
            out.data[v] = mean(&image.timecourse(v));
        }
        out.write(output)
    }

    async fn temporal_sd(&self, input: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.record("temporal_sd", output).await?;
        let image = MockImage::read(input)?;
        let mut out = image.spatial_like();
        let nt = image.n_volumes();
        for v in 0..image.spatial_len() {
            let course = image.timecourse(v);
            let m = mean(&course);
            out.data[v] = if nt > 1 {
                (course.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (nt as f64 - 1.0)).sqrt()
            } else {
                0.0
            };
        }
        out.write(output)
    }

    async fn maths(&self, expr: &ImageExpr, output: &Path) -> Result<(), ToolkitError> {
        self.record("maths", output).await?;
        evaluate(expr)?.write(output)
    }

    async fn image_stat(
        &self,
        image: &Path,
        stat: ImageStat,
        mask: Option<&Path>,
    ) -> Result<f64, ToolkitError> {
        self.record("image_stat", image).await?;
        let image = MockImage::read(image)?;
        let mask = mask.map(MockImage::read).transpose()?;
        let values = sample(&image, mask.as_ref())?;
        Ok(match stat {
            ImageStat::Percentile(p) => percentile(&values, p),
            ImageStat::Mean => mean(&values),
            ImageStat::Median => percentile(&values, 50.0),
        })
    }

    async fn skull_strip(&self, input: &Path, output_mask: &Path) -> Result<(), ToolkitError> {
        self.record("skull_strip", output_mask).await?;
        let image = MockImage::read(input)?;
        let max = image.volume(0).iter().cloned().fold(0.0, f64::max);
        let mut mask = image.spatial_like();
        for v in 0..image.spatial_len() {
            mask.data[v] = binary(max > 0.0 && image.volume(0)[v] >= 0.1 * max);
        }
        mask.write(output_mask)
    }

    async fn morphology(
        &self,
        input: &Path,
        ops: &[MorphOp],
        radius_mm: f64,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("morphology", output).await?;
        let mut image = MockImage::read(input)?;
        let kernel = sphere(radius_mm, image.voxel_mm);
        for op in ops {
            image = morph(&image, *op, &kernel);
        }
        image.write(output)
    }

    async fn extract_range(
        &self,
        input: &Path,
        axis: Axis,
        start: usize,
        len: usize,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("extract_range", output).await?;
        MockImage::read(input)?.slab(axis, start, len)?.write(output)
    }

    async fn concatenate(
        &self,
        inputs: &[&Path],
        axis: Axis,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("concatenate", output).await?;
        let parts = inputs
            .iter()
            .map(|p| MockImage::read(p))
            .collect::<Result<Vec<_>, _>>()?;
        MockImage::concat(&parts, axis)?.write(output)
    }

    async fn orientation(&self, image: &Path) -> Result<Orientation, ToolkitError> {
        Ok(MockImage::read(image)?.orientation)
    }

    async fn set_orientation(
        &self,
        image: &Path,
        orientation: &Orientation,
    ) -> Result<(), ToolkitError> {
        self.record("set_orientation", image).await?;
        let mut img = MockImage::read(image)?;
        img.orientation = *orientation;
        img.write(image)
    }

    async fn dvars(&self, series: &Path, mask: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.record("dvars", output).await?;
        let image = MockImage::read(series)?;
        let mask = MockImage::read(mask)?;
        let inside: Vec<usize> = (0..mask.spatial_len())
            .filter(|&v| mask.volume(0)[v] != 0.0)
            .collect();
        let mut rows = vec![format_value(0.0)];
        for t in 1..image.n_volumes() {
            let diffs: Vec<f64> = inside
                .iter()
                .map(|&v| (image.volume(t)[v] - image.volume(t - 1)[v]).powi(2))
                .collect();
            rows.push(format_value(mean(&diffs).sqrt()));
        }
        write_lines(output, &rows)
    }

    async fn labeled_timeseries(
        &self,
        series: &Path,
        labels: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("labeled_timeseries", output).await?;
        let image = MockImage::read(series)?;
        let labels = MockImage::read(labels)?;
        let max_label = labels.volume(0).iter().cloned().fold(0.0, f64::max) as usize;
        let rows: Vec<String> = (0..image.n_volumes())
            .map(|t| {
                (1..=max_label)
                    .map(|label| {
                        let values: Vec<f64> = (0..labels.spatial_len())
                            .filter(|&v| labels.volume(0)[v] == label as f64)
                            .map(|v| image.volume(t)[v])
                            .collect();
                        format_value(mean(&values))
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        write_lines(output, &rows)
    }

    async fn render_slices(
        &self,
        image: &Path,
        range: DisplayRange,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.record("render_slices", output).await?;
        let img = MockImage::read(image)?;
        let content = format!(
            "MOCKPNG {}x{}x{} [{}, {}]\n",
            img.dims[0], img.dims[1], img.dims[2], range.min, range.max
        );
        std::fs::write(output, content)?;
        Ok(())
    }
}

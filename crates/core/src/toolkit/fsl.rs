//! FSL command-line toolkit implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::command::{arg, run_command};
use super::config::ToolkitConfig;
use super::error::ToolkitError;
use super::traits::Toolkit;
use super::types::{
    strip_image_extension, Axis, DisplayRange, ImageExpr, ImageStat, MorphOp, Orientation,
    SeriesInfo,
};

/// Output type forced on every FSL invocation so file names are predictable.
const OUTPUT_TYPE: (&str, &str) = ("FSLOUTPUTTYPE", "NIFTI_GZ");

/// Toolkit backed by the FSL command-line tools.
pub struct FslToolkit {
    config: ToolkitConfig,
}

impl FslToolkit {
    /// Creates a new FSL toolkit with the given configuration.
    pub fn new(config: ToolkitConfig) -> Self {
        Self { config }
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<String, ToolkitError> {
        let program = self.config.tool_path(tool);
        run_command(tool, &program, args, &[OUTPUT_TYPE], self.config.timeout_secs).await
    }

    /// Builds `fslmaths` arguments for an expression.
    fn maths_args(expr: &ImageExpr, output: &Path) -> Vec<String> {
        let mut args = match expr {
            ImageExpr::Divide {
                numerator,
                denominator,
            } => vec![arg(numerator), "-div".to_string(), arg(denominator)],
            ImageExpr::Binarize { input, threshold } => vec![
                arg(input),
                "-thr".to_string(),
                threshold.to_string(),
                "-bin".to_string(),
            ],
            ImageExpr::SelectLabel { input, label } => vec![
                arg(input),
                "-thr".to_string(),
                label.to_string(),
                "-uthr".to_string(),
                label.to_string(),
                "-bin".to_string(),
            ],
            ImageExpr::Invert { input } => vec![arg(input), "-binv".to_string()],
            ImageExpr::AndNot { input, exclude } => vec![
                arg(exclude),
                "-binv".to_string(),
                "-mul".to_string(),
                arg(input),
                "-bin".to_string(),
            ],
            ImageExpr::Scale { input, factor } => {
                vec![arg(input), "-mul".to_string(), factor.to_string()]
            }
            ImageExpr::Sum { inputs } => {
                let mut args = Vec::with_capacity(inputs.len() * 2);
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        args.push("-add".to_string());
                    }
                    args.push(arg(input));
                }
                args
            }
        };
        args.push(arg(output));
        args
    }

    /// Builds `fslstats` arguments for a statistic.
    fn stat_args(image: &Path, stat: ImageStat, mask: Option<&Path>) -> Vec<String> {
        let mut args = vec![arg(image)];
        if let Some(mask) = mask {
            args.extend(["-k".to_string(), arg(mask)]);
        }
        match stat {
            ImageStat::Percentile(p) => args.extend(["-P".to_string(), p.to_string()]),
            ImageStat::Mean => args.push("-M".to_string()),
            ImageStat::Median => args.extend(["-P".to_string(), "50".to_string()]),
        }
        args
    }

    /// Builds `fslroi` arguments extracting a slab along one axis.
    fn roi_args(input: &Path, axis: Axis, start: usize, len: usize, output: &Path) -> Vec<String> {
        let mut args = vec![arg(input), arg(output)];
        for a in [Axis::X, Axis::Y, Axis::Z] {
            if a == axis {
                args.extend([start.to_string(), len.to_string()]);
            } else {
                args.extend(["0".to_string(), "-1".to_string()]);
            }
        }
        args
    }

    /// Parses `fslinfo` output.
    fn parse_info(output: &str) -> Result<SeriesInfo, ToolkitError> {
        let mut dims: [Option<usize>; 4] = [None; 4];
        let mut tr_secs = 0.0;

        for line in output.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            match key {
                "dim1" | "dim2" | "dim3" | "dim4" => {
                    let idx = key[3..].parse::<usize>().unwrap_or(1) - 1;
                    let n = value
                        .parse::<usize>()
                        .map_err(|e| ToolkitError::parse("fslinfo", format!("{key}: {e}")))?;
                    dims[idx] = Some(n);
                }
                "pixdim4" => {
                    tr_secs = value
                        .parse::<f64>()
                        .map_err(|e| ToolkitError::parse("fslinfo", format!("{key}: {e}")))?;
                }
                _ => {}
            }
        }

        let mut resolved = [1usize; 4];
        for (i, d) in dims.iter().enumerate() {
            match d {
                Some(n) => resolved[i] = *n,
                None if i == 3 => resolved[i] = 1,
                None => {
                    return Err(ToolkitError::parse(
                        "fslinfo",
                        format!("missing dim{}", i + 1),
                    ))
                }
            }
        }

        Ok(SeriesInfo {
            dims: resolved,
            tr_secs,
        })
    }

    /// Parses the first number printed by a tool.
    fn parse_scalar(tool: &str, output: &str) -> Result<f64, ToolkitError> {
        output
            .split_whitespace()
            .next()
            .ok_or_else(|| ToolkitError::parse(tool, "empty output"))?
            .parse::<f64>()
            .map_err(|e| ToolkitError::parse(tool, e.to_string()))
    }

    /// Parses a 4x4 matrix printed by `fslorient`.
    fn parse_matrix(output: &str) -> Result<[f64; 16], ToolkitError> {
        let values = output
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolkitError::parse("fslorient", e.to_string()))?;
        values.try_into().map_err(|v: Vec<f64>| {
            ToolkitError::parse("fslorient", format!("expected 16 values, got {}", v.len()))
        })
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut stem = strip_image_extension(path).into_os_string();
        stem.push(suffix);
        PathBuf::from(stem)
    }
}

#[async_trait]
impl Toolkit for FslToolkit {
    fn name(&self) -> &str {
        "fsl"
    }

    async fn series_info(&self, image: &Path) -> Result<SeriesInfo, ToolkitError> {
        if !image.exists() {
            return Err(ToolkitError::InputNotFound {
                path: image.to_path_buf(),
            });
        }
        let out = self.run("fslinfo", &[arg(image)]).await?;
        Self::parse_info(&out)
    }

    async fn motion_correct(
        &self,
        input: &Path,
        reference_volume: usize,
        output: &Path,
        parameters: &Path,
    ) -> Result<(), ToolkitError> {
        let base = strip_image_extension(output);
        self.run(
            "mcflirt",
            &[
                "-in".to_string(),
                arg(input),
                "-out".to_string(),
                arg(&base),
                "-refvol".to_string(),
                reference_volume.to_string(),
                "-plots".to_string(),
            ],
        )
        .await?;

        let plots = Self::sibling(&base, ".par");
        if plots != parameters && plots.exists() {
            tokio::fs::rename(&plots, parameters).await?;
        }
        Ok(())
    }

    async fn highpass_filter(
        &self,
        input: &Path,
        sigma_volumes: f64,
        scratch_dir: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        // bptf removes the voxel mean; add it back so moment images stay meaningful
        tokio::fs::create_dir_all(scratch_dir).await?;
        let mean = scratch_dir.join("hpf_tmean.nii.gz");
        self.run("fslmaths", &[arg(input), "-Tmean".to_string(), arg(&mean)])
            .await?;
        let result = self
            .run(
                "fslmaths",
                &[
                    arg(input),
                    "-bptf".to_string(),
                    sigma_volumes.to_string(),
                    "-1".to_string(),
                    "-add".to_string(),
                    arg(&mean),
                    arg(output),
                ],
            )
            .await;
        let _ = tokio::fs::remove_file(&mean).await;
        result.map(|_| ())
    }

    async fn temporal_mean(&self, input: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.run("fslmaths", &[arg(input), "-Tmean".to_string(), arg(output)])
            .await
            .map(|_| ())
    }

    async fn temporal_sd(&self, input: &Path, output: &Path) -> Result<(), ToolkitError> {
        self.run("fslmaths", &[arg(input), "-Tstd".to_string(), arg(output)])
            .await
            .map(|_| ())
    }

    async fn maths(&self, expr: &ImageExpr, output: &Path) -> Result<(), ToolkitError> {
        if let ImageExpr::Sum { inputs } = expr {
            if inputs.is_empty() {
                return Err(ToolkitError::Unsupported {
                    reason: "sum of zero images".to_string(),
                });
            }
        }
        self.run("fslmaths", &Self::maths_args(expr, output))
            .await
            .map(|_| ())
    }

    async fn image_stat(
        &self,
        image: &Path,
        stat: ImageStat,
        mask: Option<&Path>,
    ) -> Result<f64, ToolkitError> {
        let out = self
            .run("fslstats", &Self::stat_args(image, stat, mask))
            .await?;
        Self::parse_scalar("fslstats", &out)
    }

    async fn skull_strip(&self, input: &Path, output_mask: &Path) -> Result<(), ToolkitError> {
        let base = Self::sibling(output_mask, "_bet");
        self.run(
            "bet",
            &[arg(input), arg(&base), "-m".to_string(), "-n".to_string()],
        )
        .await?;
        let mask = Self::sibling(&base, "_mask.nii.gz");
        tokio::fs::rename(&mask, output_mask).await?;
        Ok(())
    }

    async fn morphology(
        &self,
        input: &Path,
        ops: &[MorphOp],
        radius_mm: f64,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        let mut args = vec![
            arg(input),
            "-kernel".to_string(),
            "sphere".to_string(),
            radius_mm.to_string(),
        ];
        for op in ops {
            args.push(
                match op {
                    MorphOp::Erode => "-ero",
                    MorphOp::Dilate => "-dilF",
                }
                .to_string(),
            );
        }
        args.push(arg(output));
        self.run("fslmaths", &args).await.map(|_| ())
    }

    async fn extract_range(
        &self,
        input: &Path,
        axis: Axis,
        start: usize,
        len: usize,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.run("fslroi", &Self::roi_args(input, axis, start, len, output))
            .await
            .map(|_| ())
    }

    async fn concatenate(
        &self,
        inputs: &[&Path],
        axis: Axis,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        let mut args = vec![axis.merge_flag().to_string(), arg(output)];
        args.extend(inputs.iter().map(|p| arg(p)));
        self.run("fslmerge", &args).await.map(|_| ())
    }

    async fn orientation(&self, image: &Path) -> Result<Orientation, ToolkitError> {
        let sform = self
            .run("fslorient", &["-getsform".to_string(), arg(image)])
            .await?;
        let qform = self
            .run("fslorient", &["-getqform".to_string(), arg(image)])
            .await?;
        Ok(Orientation {
            sform: Self::parse_matrix(&sform)?,
            qform: Self::parse_matrix(&qform)?,
        })
    }

    async fn set_orientation(
        &self,
        image: &Path,
        orientation: &Orientation,
    ) -> Result<(), ToolkitError> {
        for (flag, matrix) in [
            ("-setsform", &orientation.sform),
            ("-setqform", &orientation.qform),
        ] {
            let mut args = vec![flag.to_string()];
            args.extend(matrix.iter().map(|v| v.to_string()));
            args.push(arg(image));
            self.run("fslorient", &args).await?;
        }
        Ok(())
    }

    async fn dvars(&self, series: &Path, mask: &Path, output: &Path) -> Result<(), ToolkitError> {
        let confounds = output.with_extension("confounds");
        let result = self
            .run(
                "fsl_motion_outliers",
                &[
                    "-i".to_string(),
                    arg(series),
                    "-o".to_string(),
                    arg(&confounds),
                    "-s".to_string(),
                    arg(output),
                    "-m".to_string(),
                    arg(mask),
                    "--dvars".to_string(),
                    "--nomoco".to_string(),
                ],
            )
            .await;
        let _ = tokio::fs::remove_file(&confounds).await;
        result.map(|_| ())
    }

    async fn labeled_timeseries(
        &self,
        series: &Path,
        labels: &Path,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.run(
            "fslmeants",
            &[
                "-i".to_string(),
                arg(series),
                format!("--label={}", arg(labels)),
                "-o".to_string(),
                arg(output),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn render_slices(
        &self,
        image: &Path,
        range: DisplayRange,
        output: &Path,
    ) -> Result<(), ToolkitError> {
        self.run(
            "slicer",
            &[
                arg(image),
                "-i".to_string(),
                range.min.to_string(),
                range.max.to_string(),
                "-a".to_string(),
                arg(output),
            ],
        )
        .await
        .map(|_| ())
    }
}

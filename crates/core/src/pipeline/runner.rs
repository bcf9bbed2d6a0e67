//! Pipeline runner implementation.
//!
//! Walks the stages in order for one input volume. A gated stage is
//! skipped when its artifacts are present and non-empty and none of the
//! stages it reads from ran during this invocation; deleting an artifact
//! therefore re-runs its producer and everything downstream of it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::metrics;
use crate::summary::{StatsTable, SummaryRow};
use crate::toolkit::{ImageExpr, Reporter, SeriesInfo, Toolkit, ToolkitError};

use super::config::PipelineConfig;
use super::error::RunnerError;
use super::layout::{is_present, RunIdentifier, RunLayout, SuffixIdentifier};
use super::segmentation::{segment, SegmentationParams, FOREGROUND_LABEL};
use super::status::RunStatus;
use super::types::{RunOutcome, RunRequest, SampleType, StageId};

/// State carried across the stages of one invocation.
struct RunContext {
    input: PathBuf,
    sample_type: SampleType,
    layout: RunLayout,
    status: RunStatus,
    info: SeriesInfo,
    sigma_volumes: f64,
    executed: Vec<StageId>,
    skipped: Vec<StageId>,
    tsfnr: Option<f64>,
    summary: Option<SummaryRow>,
}

impl RunContext {
    fn save_status(&self) -> Result<(), RunnerError> {
        self.status.save(&self.layout.status())
    }
}

/// Runs the QC pipeline for single input volumes.
pub struct PipelineRunner {
    config: PipelineConfig,
    toolkit: Arc<dyn Toolkit>,
    reporter: Arc<dyn Reporter>,
    identifier: Arc<dyn RunIdentifier>,
}

impl PipelineRunner {
    /// Create a new runner naming run directories with the configured suffix.
    pub fn new(
        config: PipelineConfig,
        toolkit: Arc<dyn Toolkit>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let identifier = Arc::new(SuffixIdentifier::new(config.run_dir_suffix.clone()));
        Self {
            config,
            toolkit,
            reporter,
            identifier,
        }
    }

    /// Replace the run directory naming scheme.
    pub fn with_identifier(mut self, identifier: Arc<dyn RunIdentifier>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn identifier(&self) -> &Arc<dyn RunIdentifier> {
        &self.identifier
    }

    /// The run directory `input` would be processed into.
    pub fn run_dir_for(&self, input: &Path, output_root: &Path) -> Result<PathBuf, RunnerError> {
        Ok(output_root.join(self.identifier.run_dir_name(input)?))
    }

    /// Process one input volume, resuming from whatever already exists.
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome, RunnerError> {
        let started = Instant::now();
        let input = validate_input(&request.input)?;
        let run_dir = self.run_dir_for(&input, &request.output_root)?;
        std::fs::create_dir_all(&run_dir)?;
        let layout = RunLayout::new(&run_dir, self.config.variant);

        info!(
            input = %input.display(),
            run_dir = %run_dir.display(),
            sample_type = %request.sample_type,
            variant = %self.config.variant,
            "Starting QC run"
        );

        clear_scratch(&layout);
        let result = self.run_in(input, request.sample_type, layout.clone()).await;

        let label = if result.is_ok() { "success" } else { "failed" };
        metrics::RUN_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        write_metrics(&layout.metrics());

        clear_scratch(&layout);

        result
    }

    async fn run_in(
        &self,
        input: PathBuf,
        sample_type: SampleType,
        layout: RunLayout,
    ) -> Result<RunOutcome, RunnerError> {
        let mut status = match RunStatus::load(&layout.status())? {
            Some(existing) if existing.input != input => {
                return Err(RunnerError::RunDirCollision {
                    run_dir: layout.dir().to_path_buf(),
                    existing: existing.input,
                    requested: input,
                });
            }
            Some(mut existing) => {
                existing.sample_type = sample_type;
                existing.variant = self.config.variant;
                existing
            }
            None => RunStatus::new(&input, sample_type, self.config.variant),
        };

        let changed = status.reconcile(&layout);
        if !changed.is_empty() {
            debug!(?changed, "Reconciled status record with run directory");
        }

        let info = self
            .toolkit
            .series_info(&input)
            .await
            .map_err(|e| RunnerError::stage(StageId::MotionCorrection, e))?;
        let sigma_volumes = self.config.highpass_sigma_volumes(info.tr_secs)?;
        status.tr_secs = Some(info.tr_secs);
        status.n_volumes = Some(info.n_volumes());

        let mut ctx = RunContext {
            input,
            sample_type,
            layout,
            status,
            info,
            sigma_volumes,
            executed: Vec::new(),
            skipped: Vec::new(),
            tsfnr: None,
            summary: None,
        };
        ctx.save_status()?;

        for stage in StageId::ALL {
            if stage.is_gated() {
                self.run_gated(stage, &mut ctx).await?;
            } else {
                self.run_ungated(stage, &mut ctx).await?;
            }
        }

        let tsfnr = ctx.tsfnr.unwrap_or(f64::NAN);
        let summary = match ctx.summary.take() {
            Some(summary) => summary,
            None => {
                return Err(RunnerError::MissingArtifact {
                    stage: StageId::SummaryRow,
                    path: ctx.layout.summary(),
                })
            }
        };

        info!(
            executed = ctx.executed.len(),
            skipped = ctx.skipped.len(),
            tsfnr,
            "QC run complete"
        );

        Ok(RunOutcome {
            run_dir: ctx.layout.dir().to_path_buf(),
            executed: ctx.executed,
            skipped: ctx.skipped,
            tsfnr,
            summary,
        })
    }

    /// Whether a gated stage can be skipped in this invocation.
    fn can_skip(&self, stage: StageId, ctx: &RunContext) -> bool {
        let present = ctx.layout.artifacts(stage).iter().all(|p| is_present(p));
        let upstream_ran = stage
            .dependencies(self.config.variant)
            .iter()
            .any(|dep| ctx.executed.contains(dep));
        present && !upstream_ran
    }

    async fn run_gated(&self, stage: StageId, ctx: &mut RunContext) -> Result<(), RunnerError> {
        if self.can_skip(stage, ctx) {
            debug!(%stage, "Artifacts present, skipping stage");
            metrics::STAGES_SKIPPED.with_label_values(&[stage.as_str()]).inc();
            if !ctx.status.state(stage).is_done() {
                ctx.status.mark_done(stage);
            }
            ctx.skipped.push(stage);
            return Ok(());
        }

        info!(%stage, "Running stage");
        let outcome = match self.execute(stage, ctx).await {
            Ok(()) => self.verify_artifacts(stage, ctx),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                metrics::STAGES_EXECUTED.with_label_values(&[stage.as_str()]).inc();
                ctx.status.mark_done(stage);
                ctx.executed.push(stage);
                ctx.save_status()
            }
            Err(e) => {
                self.record_failure(stage, &e, ctx);
                Err(e)
            }
        }
    }

    async fn run_ungated(&self, stage: StageId, ctx: &mut RunContext) -> Result<(), RunnerError> {
        match self.execute(stage, ctx).await {
            Ok(()) => {
                metrics::STAGES_EXECUTED.with_label_values(&[stage.as_str()]).inc();
                ctx.status.mark_done(stage);
                ctx.save_status()
            }
            Err(e) if stage.is_side_effect_only() => {
                warn!(%stage, "Stage failed, continuing: {}", e);
                self.record_failure(stage, &e, ctx);
                Ok(())
            }
            Err(e) => {
                self.record_failure(stage, &e, ctx);
                Err(e)
            }
        }
    }

    fn record_failure(&self, stage: StageId, error: &RunnerError, ctx: &mut RunContext) {
        metrics::STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
        ctx.status.mark_failed(stage, error.to_string());
        if let Err(e) = ctx.save_status() {
            warn!("Failed to record failure of {}: {}", stage, e);
        }
    }

    fn verify_artifacts(&self, stage: StageId, ctx: &RunContext) -> Result<(), RunnerError> {
        for path in ctx.layout.artifacts(stage) {
            if !is_present(&path) {
                return Err(RunnerError::MissingArtifact { stage, path });
            }
        }
        Ok(())
    }

    async fn execute(&self, stage: StageId, ctx: &mut RunContext) -> Result<(), RunnerError> {
        let layout = &ctx.layout;
        let wrap = |e: ToolkitError| RunnerError::stage(stage, e);

        match stage {
            StageId::MotionCorrection => self
                .toolkit
                .motion_correct(
                    &ctx.input,
                    self.config.reference_volume,
                    &layout.motion_corrected(),
                    &layout.motion_parameters(),
                )
                .await
                .map_err(wrap),
            StageId::HighpassFilter => self
                .toolkit
                .highpass_filter(
                    &layout.motion_corrected(),
                    ctx.sigma_volumes,
                    &layout.scratch(),
                    &layout.filtered(),
                )
                .await
                .map_err(wrap),
            StageId::TemporalMean => self
                .toolkit
                .temporal_mean(&layout.moment_source(), &layout.temporal_mean())
                .await
                .map_err(wrap),
            StageId::TemporalSd => self
                .toolkit
                .temporal_sd(&layout.moment_source(), &layout.temporal_sd())
                .await
                .map_err(wrap),
            StageId::Tsfnr => self
                .toolkit
                .maths(
                    &ImageExpr::Divide {
                        numerator: layout.temporal_mean(),
                        denominator: layout.temporal_sd(),
                    },
                    &layout.tsfnr(),
                )
                .await
                .map_err(wrap),
            StageId::Segmentation => {
                let params = SegmentationParams {
                    sample_type: ctx.sample_type,
                    threshold_percentile: self.config.threshold_percentile,
                    threshold_fraction: self.config.threshold_fraction,
                    kernel_radius_mm: self.config.kernel_radius_mm,
                    phase_encode_axis: self.config.phase_encode_axis,
                };
                let result = segment(
                    self.toolkit.as_ref(),
                    &layout.temporal_mean(),
                    &params,
                    &layout.scratch().join("segmentation"),
                    &layout.labels(),
                )
                .await
                .map_err(wrap)?;
                debug!(
                    percentile = result.percentile_value,
                    threshold = result.threshold,
                    "Segmented regions"
                );
                Ok(())
            }
            StageId::Render => self.render(ctx).await,
            StageId::TsfnrSummary => {
                let mask = self.foreground_mask(layout).await.map_err(wrap)?;
                let value = self
                    .toolkit
                    .image_stat(
                        &layout.tsfnr(),
                        self.config.variant.summary_stat(),
                        Some(&mask),
                    )
                    .await
                    .map_err(wrap)?;
                info!(tsfnr = value, "tSFNR summary");
                ctx.tsfnr = Some(value);
                ctx.status.tsfnr = Some(value);
                Ok(())
            }
            StageId::Dvars => {
                let mask = self.foreground_mask(layout).await.map_err(wrap)?;
                self.toolkit
                    .dvars(&layout.motion_corrected(), &mask, &layout.dvars())
                    .await
                    .map_err(wrap)
            }
            StageId::RegionTimeseries => self
                .toolkit
                .labeled_timeseries(
                    &layout.motion_corrected(),
                    &layout.labels(),
                    &layout.region_timeseries(),
                )
                .await
                .map_err(wrap),
            StageId::Statistics => self
                .reporter
                .compute_statistics(layout.dir(), &layout.statistics())
                .await
                .map_err(wrap),
            StageId::SummaryRow => {
                let stats = StatsTable::read(&layout.statistics())?;
                let filename = layout
                    .dir()
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let row = SummaryRow {
                    filename,
                    tr_secs: ctx.info.tr_secs,
                    n_volumes: ctx.info.n_volumes(),
                    tsfnr: ctx.tsfnr.unwrap_or(f64::NAN),
                    stats,
                };
                row.write(&layout.summary())?;
                ctx.summary = Some(row);
                Ok(())
            }
            StageId::Report => self
                .reporter
                .render_report(layout.dir())
                .await
                .map_err(wrap),
        }
    }

    /// Renders every image with its fixed window; a failed render is
    /// reported and the others still run.
    async fn render(&self, ctx: &RunContext) -> Result<(), RunnerError> {
        let layout = &ctx.layout;
        let ranges = &self.config.render;
        let images = [
            (layout.temporal_mean(), ranges.tmean),
            (layout.temporal_sd(), ranges.tsd),
            (layout.tsfnr(), ranges.tsfnr),
            (layout.labels(), ranges.labels),
        ];

        let mut first_error = None;
        for (image, range) in images {
            let output = layout.render_of(&image);
            if let Err(e) = self.toolkit.render_slices(&image, range, &output).await {
                warn!("Failed to render {}: {}", image.display(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(RunnerError::stage(StageId::Render, e)),
            None => Ok(()),
        }
    }

    /// Binary mask of the foreground label, written to the scratch directory.
    async fn foreground_mask(&self, layout: &RunLayout) -> Result<PathBuf, ToolkitError> {
        let mask = layout.scratch().join("foreground_label.nii.gz");
        if is_present(&mask) {
            return Ok(mask);
        }
        std::fs::create_dir_all(layout.scratch())?;
        self.toolkit
            .maths(
                &ImageExpr::SelectLabel {
                    input: layout.labels(),
                    label: FOREGROUND_LABEL,
                },
                &mask,
            )
            .await?;
        Ok(mask)
    }
}

/// Removes the scratch directory, including one left by an interrupted run.
fn clear_scratch(layout: &RunLayout) {
    if layout.scratch().exists() {
        if let Err(e) = std::fs::remove_dir_all(layout.scratch()) {
            warn!("Failed to remove {}: {}", layout.scratch().display(), e);
        }
    }
}

/// Canonical path of an existing, non-empty input volume.
fn validate_input(input: &Path) -> Result<PathBuf, RunnerError> {
    let meta = std::fs::metadata(input)
        .map_err(|_| RunnerError::invalid_input(input, "does not exist"))?;
    if !meta.is_file() {
        return Err(RunnerError::invalid_input(input, "is not a file"));
    }
    if meta.len() == 0 {
        return Err(RunnerError::invalid_input(input, "is empty"));
    }
    Ok(std::fs::canonicalize(input)?)
}

fn write_metrics(path: &Path) {
    match metrics::encode_metrics() {
        Ok(text) => {
            if let Err(e) = std::fs::write(path, text) {
                warn!("Failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }
}

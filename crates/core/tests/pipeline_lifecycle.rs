//! Pipeline lifecycle integration tests.
//!
//! These tests drive the runner end to end with the mock toolkit and
//! reporter:
//! - A fresh run produces every artifact and a summary row
//! - Re-running a complete directory does no work
//! - Deleting an artifact re-runs its producer and everything downstream
//! - Failures are recorded and side-effect-only stages never stop a run

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use fmriqc_core::{
    pipeline::{
        PipelineConfig, PipelineRunner, RunLayout, RunRequest, RunStatus, RunnerError,
        SampleType, StageId, StageState, Variant,
    },
    summary::{StatsTable, SUMMARY_COLUMNS},
    testing::{fixtures, MockImage, MockReporter, MockToolkit, MOCK_REPORT},
};

const GATED: [StageId; 9] = [
    StageId::MotionCorrection,
    StageId::HighpassFilter,
    StageId::TemporalMean,
    StageId::TemporalSd,
    StageId::Tsfnr,
    StageId::Segmentation,
    StageId::Dvars,
    StageId::RegionTimeseries,
    StageId::Statistics,
];

/// Test helper wiring a runner to mocks inside a temp directory.
struct TestHarness {
    runner: PipelineRunner,
    toolkit: MockToolkit,
    reporter: MockReporter,
    input: PathBuf,
    output_root: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    fn with_config(config: PipelineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = fixtures::phantom_series(
            &temp_dir
                .path()
                .join("rawdata/sub-01/ses-1/func/sub-01_ses-1_bold.nii.gz"),
        )
        .expect("Failed to write input series");
        let output_root = temp_dir.path().join("derivatives/fmriqc/sub-01/ses-1");

        let toolkit = MockToolkit::new();
        let reporter = MockReporter::new();
        let runner = PipelineRunner::new(
            config,
            Arc::new(toolkit.clone()),
            Arc::new(reporter.clone()),
        );

        Self {
            runner,
            toolkit,
            reporter,
            input,
            output_root,
            _temp_dir: temp_dir,
        }
    }

    fn request(&self) -> RunRequest {
        RunRequest::new(&self.input, &self.output_root).with_sample_type(SampleType::Phantom)
    }

    fn layout(&self) -> RunLayout {
        RunLayout::new(
            self.output_root.join("sub-01_ses-1_bold_qc"),
            self.runner.config().variant,
        )
    }

    fn status(&self) -> RunStatus {
        RunStatus::load(&self.layout().status())
            .expect("Failed to read status")
            .expect("Status record missing")
    }
}

fn artifact_bytes(layout: &RunLayout) -> Vec<(PathBuf, Vec<u8>)> {
    let mut paths: Vec<PathBuf> = GATED
        .iter()
        .flat_map(|stage| layout.artifacts(*stage))
        .collect();
    paths.push(layout.summary());
    paths
        .into_iter()
        .map(|p| {
            let bytes = std::fs::read(&p).unwrap_or_else(|e| panic!("{}: {}", p.display(), e));
            (p, bytes)
        })
        .collect()
}

fn remove(path: &Path) {
    std::fs::remove_file(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
}

#[tokio::test]
async fn test_fresh_run_produces_every_artifact() {
    let harness = TestHarness::new();

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert_eq!(outcome.executed, GATED.to_vec());
    assert!(outcome.skipped.is_empty());
    assert!(outcome.tsfnr.is_finite() && outcome.tsfnr > 0.0);

    let layout = harness.layout();
    assert_eq!(outcome.run_dir, layout.dir());
    for stage in GATED.iter().chain([StageId::Render].iter()) {
        for path in layout.artifacts(*stage) {
            assert!(path.is_file(), "missing {}", path.display());
        }
    }
    assert!(layout.dir().join(MOCK_REPORT).is_file());
    assert!(layout.metrics().is_file());
    assert!(!layout.scratch().exists());

    let summary = std::fs::read_to_string(layout.summary()).unwrap();
    assert_eq!(summary.lines().count(), 1);
    let fields: Vec<&str> = summary.trim_end().split(',').collect();
    assert_eq!(fields.len(), SUMMARY_COLUMNS);
    assert_eq!(fields[0], "sub-01_ses-1_bold_qc");
    assert_eq!(fields[1], "2");
    assert_eq!(fields[2], "6");

    StatsTable::read(&layout.statistics()).unwrap();

    let status = harness.status();
    assert_eq!(status.input, harness.input.canonicalize().unwrap());
    assert_eq!(status.variant, Variant::Filtered);
    assert_eq!(status.n_volumes, Some(6));
    for stage in StageId::ALL {
        assert!(status.state(stage).is_done(), "{} not done", stage);
    }
}

#[tokio::test]
async fn test_second_run_does_no_work() {
    let harness = TestHarness::new();
    harness.runner.run(&harness.request()).await.unwrap();
    let before = artifact_bytes(&harness.layout());
    harness.toolkit.clear_calls().await;

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert!(outcome.executed.is_empty());
    assert_eq!(outcome.skipped, GATED.to_vec());
    assert_eq!(harness.toolkit.call_count("motion_correct").await, 0);
    assert_eq!(harness.toolkit.call_count("highpass_filter").await, 0);
    assert_eq!(harness.toolkit.call_count("morphology").await, 0);
    assert_eq!(harness.reporter.call_count("compute_statistics").await, 1);
    assert_eq!(artifact_bytes(&harness.layout()), before);
}

#[tokio::test]
async fn test_deleted_labels_rerun_downstream_only() {
    let harness = TestHarness::new();
    harness.runner.run(&harness.request()).await.unwrap();
    harness.toolkit.clear_calls().await;
    remove(&harness.layout().labels());

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert_eq!(
        outcome.executed,
        vec![
            StageId::Segmentation,
            StageId::Dvars,
            StageId::RegionTimeseries,
            StageId::Statistics,
        ]
    );
    assert_eq!(harness.toolkit.call_count("motion_correct").await, 0);
    assert_eq!(harness.toolkit.call_count("temporal_mean").await, 0);
    assert!(harness.layout().labels().is_file());
}

#[tokio::test]
async fn test_deleted_filtered_series_reruns_moments() {
    let harness = TestHarness::new();
    harness.runner.run(&harness.request()).await.unwrap();
    remove(&harness.layout().filtered());

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert_eq!(outcome.executed.len(), GATED.len() - 1);
    assert!(!outcome.executed.contains(&StageId::MotionCorrection));
    assert_eq!(outcome.skipped, vec![StageId::MotionCorrection]);
}

#[tokio::test]
async fn test_empty_artifact_counts_as_missing() {
    let harness = TestHarness::new();
    harness.runner.run(&harness.request()).await.unwrap();
    std::fs::write(harness.layout().dvars(), b"").unwrap();

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert_eq!(outcome.executed, vec![StageId::Dvars, StageId::Statistics]);
}

#[tokio::test]
async fn test_stage_failure_is_recorded_and_resumable() {
    let harness = TestHarness::new();
    harness.toolkit.fail_on("dvars").await;

    let err = harness.runner.run(&harness.request()).await.unwrap_err();
    assert_eq!(err.failed_stage(), Some(StageId::Dvars));
    assert!(!err.is_user_error());

    let status = harness.status();
    assert!(matches!(
        status.state(StageId::Dvars),
        StageState::Failed { .. }
    ));
    assert!(status.state(StageId::Segmentation).is_done());
    assert!(!harness.layout().summary().exists());

    harness.toolkit.clear_failure("dvars").await;
    let outcome = harness.runner.run(&harness.request()).await.unwrap();
    assert_eq!(
        outcome.executed,
        vec![
            StageId::Dvars,
            StageId::RegionTimeseries,
            StageId::Statistics,
        ]
    );
}

#[tokio::test]
async fn test_render_failure_does_not_stop_run() {
    let harness = TestHarness::new();
    harness.toolkit.fail_on("render_slices").await;
    harness.reporter.set_fail_report(true).await;

    let outcome = harness.runner.run(&harness.request()).await.unwrap();

    assert_eq!(outcome.executed, GATED.to_vec());
    assert!(harness.layout().summary().is_file());
    assert_eq!(harness.toolkit.call_count("render_slices").await, 4);

    let status = harness.status();
    assert!(matches!(
        status.state(StageId::Render),
        StageState::Failed { .. }
    ));
    assert!(matches!(
        status.state(StageId::Report),
        StageState::Failed { .. }
    ));
    assert!(status.state(StageId::SummaryRow).is_done());
}

#[tokio::test]
async fn test_statistics_failure_stops_run() {
    let harness = TestHarness::new();
    harness.reporter.set_fail_statistics(true).await;

    let err = harness.runner.run(&harness.request()).await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(StageId::Statistics));
    assert!(!harness.layout().summary().exists());
    assert_eq!(harness.reporter.call_count("render_report").await, 0);
}

#[tokio::test]
async fn test_other_input_in_same_run_dir_is_rejected() {
    let harness = TestHarness::new();
    harness.runner.run(&harness.request()).await.unwrap();

    let other_dir = TempDir::new().unwrap();
    let other = fixtures::phantom_series(&other_dir.path().join("sub-01_ses-1_bold.nii")).unwrap();
    let request = RunRequest::new(&other, &harness.output_root);

    let err = harness.runner.run(&request).await.unwrap_err();

    assert!(matches!(err, RunnerError::RunDirCollision { .. }));
    assert_eq!(harness.status().input, harness.input.canonicalize().unwrap());
}

#[tokio::test]
async fn test_invalid_inputs() {
    let harness = TestHarness::new();
    let dir = harness.input.parent().unwrap();

    let empty = dir.join("empty_bold.nii.gz");
    std::fs::write(&empty, b"").unwrap();
    let err = harness
        .runner
        .run(&RunRequest::new(&empty, &harness.output_root))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidInput { .. }));
    assert!(err.is_user_error());

    let missing = dir.join("missing_bold.nii.gz");
    let err = harness
        .runner
        .run(&RunRequest::new(&missing, &harness.output_root))
        .await
        .unwrap_err();
    assert!(err.is_user_error());
    assert!(!harness.output_root.exists());
}

#[tokio::test]
async fn test_zero_repetition_time_is_rejected() {
    let harness = TestHarness::new();
    let mut image = MockImage::read(&harness.input).unwrap();
    image.tr_secs = 0.0;
    image.write(&harness.input).unwrap();

    let err = harness.runner.run(&harness.request()).await.unwrap_err();

    assert!(matches!(err, RunnerError::InvalidRepetitionTime { .. }));
    assert_eq!(harness.toolkit.call_count("motion_correct").await, 0);
}

#[tokio::test]
async fn test_unfiltered_variant_names_moments_without_tag() {
    let harness = TestHarness::with_config(PipelineConfig::default().with_variant(Variant::Unfiltered));

    harness.runner.run(&harness.request()).await.unwrap();

    let layout = harness.layout();
    assert!(layout.dir().join("tmean.nii.gz").is_file());
    assert!(layout.dir().join("tsfnr.nii.gz").is_file());
    assert!(!layout.dir().join("tmean_hpf.nii.gz").exists());
    assert_eq!(harness.status().variant, Variant::Unfiltered);
}

#[tokio::test]
async fn test_leftover_scratch_is_not_reused() {
    let harness = TestHarness::new();
    let first = harness.runner.run(&harness.request()).await.unwrap();
    let layout = harness.layout();
    let dvars_before = std::fs::read(layout.dvars()).unwrap();

    // an interrupted run leaves a mask that no longer matches the labels
    std::fs::create_dir_all(layout.scratch()).unwrap();
    std::fs::copy(
        layout.labels(),
        layout.scratch().join("foreground_label.nii.gz"),
    )
    .unwrap();
    remove(&layout.labels());

    let second = harness.runner.run(&harness.request()).await.unwrap();

    assert!(second.executed.contains(&StageId::Segmentation));
    assert_eq!(second.tsfnr, first.tsfnr);
    assert_eq!(std::fs::read(layout.dvars()).unwrap(), dvars_before);
    assert!(!layout.scratch().exists());
}

#[tokio::test]
async fn test_input_name_with_comma_is_rejected() {
    let harness = TestHarness::new();
    let dir = harness.input.parent().unwrap();
    let input = fixtures::phantom_series(&dir.join("sub-01,ses-1_bold.nii.gz")).unwrap();

    let err = harness
        .runner
        .run(&RunRequest::new(&input, &harness.output_root))
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::InvalidName { .. }));
    assert!(err.is_user_error());
    assert!(!harness.output_root.exists());
}

//! Batch lifecycle integration tests.
//!
//! These tests verify the batch coordinator with a mock scheduler, then
//! play the array tasks locally with the mock toolkit and finish with the
//! aggregation job:
//! - Discovery, job files and dependent submission
//! - Study table with one row per completed run

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use fmriqc_core::{
    batch::{aggregate_study, BatchConfig, BatchCoordinator, BatchError, BatchRequest},
    pipeline::{PipelineConfig, PipelineRunner, RunRequest, SampleType, SuffixIdentifier},
    scheduler::DependencyPolicy,
    summary::study_header,
    testing::{fixtures, MockReporter, MockScheduler, MockToolkit},
};

fn config() -> BatchConfig {
    BatchConfig {
        runner_command: Some(vec!["fmriqc".to_string()]),
        ..BatchConfig::default()
    }
}

fn coordinator(config: BatchConfig, scheduler: Arc<MockScheduler>) -> BatchCoordinator {
    BatchCoordinator::new(config, scheduler, Arc::new(SuffixIdentifier::default()))
}

/// Three scans plus one zero-byte file.
fn study() -> TempDir {
    let root = TempDir::new().expect("Failed to create study root");
    fixtures::raw_scan(root.path(), "01", "1").unwrap();
    fixtures::raw_scan(root.path(), "01", "2").unwrap();
    fixtures::raw_scan(root.path(), "02", "1").unwrap();
    let empty = root
        .path()
        .join("rawdata/sub-03/ses-1/func/sub-03_ses-1_bold.nii.gz");
    std::fs::create_dir_all(empty.parent().unwrap()).unwrap();
    std::fs::write(&empty, b"").unwrap();
    root
}

async fn run_tasks(runs: &[(PathBuf, PathBuf)]) {
    let runner = PipelineRunner::new(
        PipelineConfig::default(),
        Arc::new(MockToolkit::new()),
        Arc::new(MockReporter::new()),
    );
    for (input, output_root) in runs {
        let request =
            RunRequest::new(input, output_root).with_sample_type(SampleType::Phantom);
        runner.run(&request).await.unwrap();
    }
}

#[tokio::test]
async fn test_batch_submits_one_task_per_valid_scan() {
    let root = study();
    let scheduler = Arc::new(MockScheduler::new());

    let outcome = coordinator(config(), scheduler.clone())
        .run(&BatchRequest::new(root.path()).with_sample_type(SampleType::Phantom))
        .await
        .unwrap();

    assert_eq!(outcome.plan.runs.len(), 3);
    assert_eq!(outcome.plan.empty.len(), 1);

    let commands = std::fs::read_to_string(&outcome.plan.command_file).unwrap();
    let lines: Vec<&str> = commands.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.starts_with("fmriqc run ") && l.ends_with(" phantom")));
    assert!(lines[0].contains("sub-01_ses-1_bold.nii.gz"));
    assert!(!commands.contains("sub-03"));

    let arrays = scheduler.arrays().await;
    assert_eq!(arrays.len(), 1);
    assert_eq!(arrays[0].tasks, 3);
    assert_eq!(arrays[0].command_file, outcome.plan.command_file);

    let submitted = outcome.submitted.unwrap();
    let jobs = scheduler.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].0.script, outcome.plan.aggregate_script);
    let dependency = jobs[0].1.clone().unwrap();
    assert_eq!(dependency.on, submitted.array);
    assert_eq!(dependency.policy, DependencyPolicy::AllTerminal);
}

#[tokio::test]
async fn test_unsupported_policy_is_refused_before_submission() {
    let root = study();
    let scheduler =
        Arc::new(MockScheduler::new().with_policies(&[DependencyPolicy::AllTerminal]));
    let config = BatchConfig {
        dependency_policy: DependencyPolicy::AllSuccess,
        ..config()
    };

    let err = coordinator(config, scheduler.clone())
        .run(&BatchRequest::new(root.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::Scheduler(_)));
    assert!(!err.is_user_error());
    assert!(scheduler.arrays().await.is_empty());
}

#[tokio::test]
async fn test_study_without_scans_is_a_user_error() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("rawdata")).unwrap();

    let err = coordinator(config(), Arc::new(MockScheduler::new()))
        .run(&BatchRequest::new(root.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::NoInputs { .. }));
    assert!(err.is_user_error());
}

#[tokio::test]
async fn test_tasks_then_aggregation_build_study_table() {
    let root = study();
    let outcome = coordinator(config(), Arc::new(MockScheduler::new()))
        .run(&BatchRequest::new(root.path()).with_sample_type(SampleType::Phantom))
        .await
        .unwrap();

    let runs: Vec<_> = outcome
        .plan
        .runs
        .iter()
        .map(|r| (r.input.clone(), r.output_root.clone()))
        .collect();
    run_tasks(&runs).await;
    for run in &outcome.plan.runs {
        assert!(run.run_dir.join("qc_summary.csv").is_file());
    }

    let rows = aggregate_study(&config(), root.path()).unwrap();
    assert_eq!(rows, 3);

    let table = std::fs::read_to_string(&outcome.plan.summary_path).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], study_header());
    assert!(lines[1].starts_with("sub-01_ses-1_bold_qc,"));
    assert!(lines[2].starts_with("sub-01_ses-2_bold_qc,"));
    assert!(lines[3].starts_with("sub-02_ses-1_bold_qc,"));
}

#[tokio::test]
async fn test_aggregation_skips_failed_runs() {
    let root = study();
    let plan = coordinator(config(), Arc::new(MockScheduler::new()))
        .plan(&BatchRequest::new(root.path()).with_sample_type(SampleType::Phantom))
        .unwrap();

    let first = &plan.runs[0];
    run_tasks(&[(first.input.clone(), first.output_root.clone())]).await;

    assert_eq!(aggregate_study(&config(), root.path()).unwrap(), 1);
    // rerunning aggregation replaces the table
    assert_eq!(aggregate_study(&config(), root.path()).unwrap(), 1);
    let table = std::fs::read_to_string(config().summary_path(root.path())).unwrap();
    assert_eq!(table.lines().count(), 2);
}

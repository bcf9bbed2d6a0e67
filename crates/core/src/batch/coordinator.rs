//! Batch coordinator implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::pipeline::{RunIdentifier, SampleType};
use crate::scheduler::{
    shell_join, write_script, ArrayJob, Job, JobGraph, Scheduler, SubmittedGraph,
};
use crate::summary::{aggregate_summaries, SummaryError, SUMMARY_GLOB};

use super::config::BatchConfig;
use super::discovery::{discover_inputs, output_subdir};
use super::error::BatchError;

/// A request to process a whole study.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub study_root: PathBuf,
    pub sample_type: SampleType,
    /// Write the job files without submitting them.
    pub dry_run: bool,
}

impl BatchRequest {
    pub fn new(study_root: impl Into<PathBuf>) -> Self {
        Self {
            study_root: study_root.into(),
            sample_type: SampleType::default(),
            dry_run: false,
        }
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One planned pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun {
    pub input: PathBuf,
    pub output_root: PathBuf,
    pub run_dir: PathBuf,
    /// Shell command line the array task runs.
    pub command: String,
}

/// Everything written for a batch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub study_root: PathBuf,
    pub runs: Vec<PlannedRun>,
    /// Zero-byte inputs that were left out.
    pub empty: Vec<PathBuf>,
    pub qc_root: PathBuf,
    pub log_dir: PathBuf,
    pub command_file: PathBuf,
    pub aggregate_script: PathBuf,
    pub summary_path: PathBuf,
}

/// What a batch invocation did.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub plan: BatchPlan,
    /// Job ids, absent for a dry run.
    pub submitted: Option<SubmittedGraph>,
}

/// Fans a study out as one array job plus a dependent aggregation job.
pub struct BatchCoordinator {
    config: BatchConfig,
    scheduler: Arc<dyn Scheduler>,
    identifier: Arc<dyn RunIdentifier>,
}

impl BatchCoordinator {
    /// Create a new coordinator.
    ///
    /// `identifier` must be the naming scheme the runner uses so collisions
    /// are caught before submission.
    pub fn new(
        config: BatchConfig,
        scheduler: Arc<dyn Scheduler>,
        identifier: Arc<dyn RunIdentifier>,
    ) -> Self {
        Self {
            config,
            scheduler,
            identifier,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover, write job files and submit.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchOutcome, BatchError> {
        let plan = self.plan(request)?;
        self.write_jobs(&plan, request.dry_run)?;

        if request.dry_run {
            info!(
                runs = plan.runs.len(),
                command_file = %plan.command_file.display(),
                "Dry run, nothing submitted"
            );
            return Ok(BatchOutcome {
                plan,
                submitted: None,
            });
        }

        let graph = JobGraph::new(
            ArrayJob {
                name: self.config.job_name.clone(),
                command_file: plan.command_file.clone(),
                tasks: plan.runs.len(),
                log_dir: plan.log_dir.clone(),
                script_dir: plan
                    .command_file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| plan.qc_root.clone()),
            },
            Job {
                name: format!("{}_aggregate", self.config.job_name),
                script: plan.aggregate_script.clone(),
                log_dir: plan.log_dir.clone(),
            },
            self.config.dependency_policy,
        );
        let submitted = graph.submit(self.scheduler.as_ref()).await?;

        info!(
            runs = plan.runs.len(),
            array = %submitted.array,
            aggregate = %submitted.aggregate,
            "Batch submitted"
        );

        Ok(BatchOutcome {
            plan,
            submitted: Some(submitted),
        })
    }

    /// Works out every invocation without touching the filesystem.
    pub fn plan(&self, request: &BatchRequest) -> Result<BatchPlan, BatchError> {
        let study_root = &std::fs::canonicalize(&request.study_root).map_err(|_| {
            BatchError::StudyRootNotFound {
                path: request.study_root.clone(),
            }
        })?;
        let discovery = discover_inputs(study_root, &self.config.raw_pattern)?;
        for path in &discovery.empty {
            warn!("Invalid input (empty file): {}", path.display());
        }

        let qc_root = self.config.qc_root(study_root);
        let runner = self.config.resolved_runner_command();
        let mut seen: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut runs = Vec::with_capacity(discovery.valid.len());

        for input in discovery.valid {
            let output_root = qc_root.join(output_subdir(
                study_root,
                &self.config.raw_pattern,
                &input,
            ));
            let run_dir = output_root.join(self.identifier.run_dir_name(&input)?);
            if let Some(first) = seen.get(&run_dir) {
                return Err(BatchError::RunDirCollision {
                    run_dir,
                    first: first.clone(),
                    second: input,
                });
            }
            seen.insert(run_dir.clone(), input.clone());

            let mut words = runner.clone();
            words.push("run".to_string());
            words.push(input.to_string_lossy().to_string());
            words.push(output_root.to_string_lossy().to_string());
            words.push(request.sample_type.to_string());

            runs.push(PlannedRun {
                input,
                output_root,
                run_dir,
                command: shell_join(&words),
            });
        }

        let jobs_dir = self.config.jobs_dir(study_root);
        Ok(BatchPlan {
            study_root: study_root.clone(),
            runs,
            empty: discovery.empty,
            log_dir: self.config.log_dir(study_root),
            command_file: jobs_dir.join("commands.txt"),
            aggregate_script: jobs_dir.join("aggregate.sh"),
            summary_path: self.config.summary_path(study_root),
            qc_root,
        })
    }

    /// The command the aggregation job runs.
    fn aggregate_command(&self, study_root: &Path) -> String {
        let mut words = self.config.resolved_runner_command();
        words.push("aggregate".to_string());
        words.push(study_root.to_string_lossy().to_string());
        shell_join(&words)
    }

    fn write_jobs(&self, plan: &BatchPlan, dry_run: bool) -> Result<(), BatchError> {
        std::fs::create_dir_all(&plan.qc_root)?;
        if !dry_run {
            if plan.log_dir.exists() {
                std::fs::remove_dir_all(&plan.log_dir)?;
            }
            std::fs::create_dir_all(&plan.log_dir)?;
        }
        if let Some(jobs_dir) = plan.command_file.parent() {
            std::fs::create_dir_all(jobs_dir)?;
        }

        let mut commands = plan
            .runs
            .iter()
            .map(|r| r.command.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        commands.push('\n');
        std::fs::write(&plan.command_file, commands)?;

        let script = format!(
            "#!/usr/bin/env bash\nset -euo pipefail\n{}\n",
            self.aggregate_command(&plan.study_root)
        );
        write_script(&plan.aggregate_script, &script)?;
        Ok(())
    }
}

/// Writes the study summary table from every run under the study's QC root.
pub fn aggregate_study(config: &BatchConfig, study_root: &Path) -> Result<usize, SummaryError> {
    aggregate_summaries(
        &config.qc_root(study_root),
        SUMMARY_GLOB,
        &config.summary_path(study_root),
    )
}

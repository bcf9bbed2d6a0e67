//! Submission through Slurm `sbatch`.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

use crate::toolkit::command::{arg, run_command};

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::shell::{shell_quote, write_script};
use super::traits::Scheduler;
use super::types::{ArrayJob, Dependency, DependencyPolicy, Job, JobId};

/// `#SBATCH` options of a submission.
#[derive(Debug, Clone)]
pub struct SBatchOpts {
    pub job_name: String,
    pub output: String,
    pub partition: Option<String>,
    pub memory: Option<String>,
    pub array: Option<String>,
    pub dependency: Option<String>,
    pub no_requeue: bool,
}

impl SBatchOpts {
    pub fn new(job_name: &str, output: String) -> Self {
        Self {
            job_name: job_name.to_string(),
            output,
            partition: None,
            memory: None,
            array: None,
            dependency: None,
            no_requeue: true,
        }
    }

    /// Option flags without the `#SBATCH` prefix.
    pub fn flags(&self) -> Vec<String> {
        let mut opts = vec![format!("--job-name={}", self.job_name)];
        if let Some(array) = &self.array {
            opts.push(format!("--array={}", array));
        }
        opts.push(format!("--output={}", self.output));
        if let Some(partition) = &self.partition {
            opts.push(format!("--partition={}", partition));
        }
        if let Some(memory) = &self.memory {
            opts.push(format!("--mem={}", memory));
        }
        if let Some(dependency) = &self.dependency {
            opts.push(format!("--dependency={}", dependency));
        }
        if self.no_requeue {
            opts.push("--no-requeue".to_string());
        }
        opts
    }

    pub fn print(&self) -> String {
        self.flags()
            .iter()
            .map(|flag| format!("#SBATCH {}", flag))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Scheduler backed by `sbatch`.
pub struct SlurmScheduler {
    config: SchedulerConfig,
}

impl SlurmScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    fn opts(&self, name: &str, output: String) -> SBatchOpts {
        let mut opts = SBatchOpts::new(name, output);
        opts.partition = self.config.queue.clone();
        opts.memory = self.config.memory.clone();
        opts
    }

    /// Script running line `$SLURM_ARRAY_TASK_ID` of the command file.
    fn array_script(&self, job: &ArrayJob) -> String {
        let mut opts = self.opts(
            &job.name,
            arg(&job.log_dir.join(format!("{}_%A_%a.out", job.name))),
        );
        opts.array = Some(format!("1-{}", job.tasks));
        format!(
            "#!/usr/bin/env bash\n{}\nset -euo pipefail\ncmd=$(sed -n \"${{SLURM_ARRAY_TASK_ID}}p\" {})\neval \"$cmd\"\n",
            opts.print(),
            shell_quote(&arg(&job.command_file)),
        )
    }

    fn array_script_path(job: &ArrayJob) -> PathBuf {
        job.script_dir.join(format!("{}.sbatch", job.name))
    }

    fn job_args(&self, job: &Job, dependency: Option<&Dependency>) -> Vec<String> {
        let mut opts = self.opts(
            &job.name,
            arg(&job.log_dir.join(format!("{}_%j.out", job.name))),
        );
        opts.dependency = dependency.map(dependency_flag);
        let mut args = opts.flags();
        args.push(arg(&job.script));
        args
    }

    async fn sbatch(&self, args: &[String]) -> Result<JobId, SchedulerError> {
        let response = run_command("sbatch", &self.config.sbatch_command, args, &[], None).await?;
        response_to_job_id(&response).ok_or_else(|| SchedulerError::unparseable("sbatch", response))
    }
}

fn dependency_flag(dependency: &Dependency) -> String {
    let kind = match dependency.policy {
        DependencyPolicy::AllTerminal => "afterany",
        DependencyPolicy::AllSuccess => "afterok",
    };
    format!("{}:{}", kind, dependency.on)
}

fn response_to_job_id(response: &str) -> Option<JobId> {
    let re = Regex::new(r"Submitted batch job (\d+)").ok()?;
    let caps = re.captures(response)?;
    Some(JobId::new(caps.get(1)?.as_str()))
}

fn write_array_script(path: &Path, content: &str) -> Result<(), SchedulerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_script(path, content)?;
    Ok(())
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    fn name(&self) -> &str {
        "slurm"
    }

    fn supports(&self, _policy: DependencyPolicy) -> bool {
        true
    }

    async fn submit_array(&self, job: &ArrayJob) -> Result<JobId, SchedulerError> {
        if job.tasks == 0 {
            return Err(SchedulerError::InvalidJob {
                name: job.name.clone(),
                reason: "array has no tasks".to_string(),
            });
        }
        let path = Self::array_script_path(job);
        write_array_script(&path, &self.array_script(job))?;
        self.sbatch(&[arg(&path)]).await
    }

    async fn submit(
        &self,
        job: &Job,
        dependency: Option<&Dependency>,
    ) -> Result<JobId, SchedulerError> {
        self.sbatch(&self.job_args(job, dependency)).await
    }
}

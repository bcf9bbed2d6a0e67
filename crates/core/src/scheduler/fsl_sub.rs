//! Submission through FSL's `fsl_sub`.

use async_trait::async_trait;
use regex_lite::Regex;

use crate::toolkit::command::{arg, run_command};

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::traits::Scheduler;
use super::types::{ArrayJob, Dependency, DependencyPolicy, Job, JobId};

/// Scheduler backed by `fsl_sub`.
///
/// `fsl_sub -j` releases a job once the held job has left the queue, so
/// only [`DependencyPolicy::AllTerminal`] can be expressed.
pub struct FslSubScheduler {
    config: SchedulerConfig,
}

impl FslSubScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    fn base_args(&self, name: &str, log_dir: &std::path::Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(queue) = &self.config.queue {
            args.push("-q".to_string());
            args.push(queue.clone());
        }
        args.push("-N".to_string());
        args.push(name.to_string());
        args.push("-l".to_string());
        args.push(arg(log_dir));
        args
    }

    fn array_args(&self, job: &ArrayJob) -> Vec<String> {
        let mut args = self.base_args(&job.name, &job.log_dir);
        args.push("-t".to_string());
        args.push(arg(&job.command_file));
        args
    }

    fn job_args(&self, job: &Job, dependency: Option<&Dependency>) -> Vec<String> {
        let mut args = self.base_args(&job.name, &job.log_dir);
        if let Some(dep) = dependency {
            args.push("-j".to_string());
            args.push(dep.on.to_string());
        }
        args.push(arg(&job.script));
        args
    }

    async fn invoke(&self, args: &[String]) -> Result<JobId, SchedulerError> {
        let response =
            run_command("fsl_sub", &self.config.fsl_sub_command, args, &[], None).await?;
        parse_job_id(&response).ok_or_else(|| SchedulerError::unparseable("fsl_sub", response))
    }
}

/// `fsl_sub` prints the job id alone on stdout.
fn parse_job_id(response: &str) -> Option<JobId> {
    let re = Regex::new(r"(?m)^\s*(\d+)(?:\.\S*)?\s*$").ok()?;
    let caps = re.captures(response)?;
    Some(JobId::new(caps.get(1)?.as_str()))
}

#[async_trait]
impl Scheduler for FslSubScheduler {
    fn name(&self) -> &str {
        "fsl_sub"
    }

    fn supports(&self, policy: DependencyPolicy) -> bool {
        policy == DependencyPolicy::AllTerminal
    }

    async fn submit_array(&self, job: &ArrayJob) -> Result<JobId, SchedulerError> {
        self.invoke(&self.array_args(job)).await
    }

    async fn submit(
        &self,
        job: &Job,
        dependency: Option<&Dependency>,
    ) -> Result<JobId, SchedulerError> {
        if let Some(dep) = dependency {
            if !self.supports(dep.policy) {
                return Err(SchedulerError::UnsupportedPolicy {
                    backend: self.name().to_string(),
                    policy: dep.policy,
                });
            }
        }
        self.invoke(&self.job_args(job, dependency)).await
    }
}

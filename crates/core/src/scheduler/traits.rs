//! Trait definitions for the scheduler module.

use async_trait::async_trait;

use super::error::SchedulerError;
use super::types::{ArrayJob, Dependency, DependencyPolicy, Job, JobId};

/// A cluster job queue.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Returns the name of this scheduler backend.
    fn name(&self) -> &str;

    /// Whether dependent jobs can be held on `policy`.
    fn supports(&self, policy: DependencyPolicy) -> bool;

    /// Submits one task per line of the job's command file.
    async fn submit_array(&self, job: &ArrayJob) -> Result<JobId, SchedulerError>;

    /// Submits a single job, optionally held until `dependency` is met.
    async fn submit(
        &self,
        job: &Job,
        dependency: Option<&Dependency>,
    ) -> Result<JobId, SchedulerError>;
}

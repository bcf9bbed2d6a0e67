//! Mock scheduler for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::scheduler::{
    ArrayJob, Dependency, DependencyPolicy, Job, JobId, Scheduler, SchedulerError,
};
use crate::toolkit::ToolkitError;

/// Mock implementation of the Scheduler trait.
///
/// Records submissions and hands out increasing numeric job ids starting
/// at 1000. Supports every [`DependencyPolicy`] unless configured
/// otherwise.
#[derive(Debug)]
pub struct MockScheduler {
    arrays: Arc<RwLock<Vec<ArrayJob>>>,
    jobs: Arc<RwLock<Vec<(Job, Option<Dependency>)>>>,
    policies: Vec<DependencyPolicy>,
    next_id: AtomicU64,
    fail_submissions: Arc<RwLock<bool>>,
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScheduler {
    /// Create a new mock scheduler.
    pub fn new() -> Self {
        Self {
            arrays: Arc::new(RwLock::new(Vec::new())),
            jobs: Arc::new(RwLock::new(Vec::new())),
            policies: vec![DependencyPolicy::AllTerminal, DependencyPolicy::AllSuccess],
            next_id: AtomicU64::new(1000),
            fail_submissions: Arc::new(RwLock::new(false)),
        }
    }

    /// Replace the supported dependency policies.
    pub fn with_policies(mut self, policies: &[DependencyPolicy]) -> Self {
        self.policies = policies.to_vec();
        self
    }

    /// Get all submitted arrays.
    pub async fn arrays(&self) -> Vec<ArrayJob> {
        self.arrays.read().await.clone()
    }

    /// Get all submitted single jobs with their dependencies.
    pub async fn jobs(&self) -> Vec<(Job, Option<Dependency>)> {
        self.jobs.read().await.clone()
    }

    /// Make every submission fail.
    pub async fn set_fail_submissions(&self, fail: bool) {
        *self.fail_submissions.write().await = fail;
    }

    async fn next(&self) -> Result<JobId, SchedulerError> {
        if *self.fail_submissions.read().await {
            return Err(SchedulerError::Submission(ToolkitError::command_failed(
                "mock-scheduler",
                Some(1),
                "queue unavailable",
            )));
        }
        Ok(JobId::new(
            self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
        ))
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports(&self, policy: DependencyPolicy) -> bool {
        self.policies.contains(&policy)
    }

    async fn submit_array(&self, job: &ArrayJob) -> Result<JobId, SchedulerError> {
        let id = self.next().await?;
        self.arrays.write().await.push(job.clone());
        Ok(id)
    }

    async fn submit(
        &self,
        job: &Job,
        dependency: Option<&Dependency>,
    ) -> Result<JobId, SchedulerError> {
        let id = self.next().await?;
        self.jobs
            .write()
            .await
            .push((job.clone(), dependency.cloned()));
        Ok(id)
    }
}

//! Job dependency graph: a fan-out array followed by one aggregation job.

use tracing::info;

use crate::metrics;

use super::error::SchedulerError;
use super::traits::Scheduler;
use super::types::{ArrayJob, Dependency, DependencyPolicy, Job, JobNode, SubmittedGraph};

/// Directed acyclic graph of one array and the job that waits for it.
///
/// Every array task has an edge to the aggregation node; nothing else
/// depends on anything.
#[derive(Debug, Clone)]
pub struct JobGraph {
    array: ArrayJob,
    aggregate: Job,
    policy: DependencyPolicy,
}

impl JobGraph {
    pub fn new(array: ArrayJob, aggregate: Job, policy: DependencyPolicy) -> Self {
        Self {
            array,
            aggregate,
            policy,
        }
    }

    pub fn array(&self) -> &ArrayJob {
        &self.array
    }

    pub fn aggregate(&self) -> &Job {
        &self.aggregate
    }

    pub fn policy(&self) -> DependencyPolicy {
        self.policy
    }

    /// Number of array tasks.
    pub fn len(&self) -> usize {
        self.array.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.array.tasks == 0
    }

    /// All nodes, array tasks first.
    pub fn nodes(&self) -> Vec<JobNode> {
        (0..self.array.tasks)
            .map(JobNode::ArrayTask)
            .chain(std::iter::once(JobNode::Aggregate))
            .collect()
    }

    /// Edges `(upstream, downstream)`.
    pub fn edges(&self) -> Vec<(JobNode, JobNode)> {
        (0..self.array.tasks)
            .map(|i| (JobNode::ArrayTask(i), JobNode::Aggregate))
            .collect()
    }

    /// Nodes that must finish before `node` may start.
    pub fn upstream(&self, node: JobNode) -> Vec<JobNode> {
        self.edges()
            .into_iter()
            .filter(|(_, to)| *to == node)
            .map(|(from, _)| from)
            .collect()
    }

    /// Submits the array, then the aggregation job held on it.
    pub async fn submit(&self, scheduler: &dyn Scheduler) -> Result<SubmittedGraph, SchedulerError> {
        if !scheduler.supports(self.policy) {
            return Err(SchedulerError::UnsupportedPolicy {
                backend: scheduler.name().to_string(),
                policy: self.policy,
            });
        }
        if self.is_empty() {
            return Err(SchedulerError::InvalidJob {
                name: self.array.name.clone(),
                reason: "array has no tasks".to_string(),
            });
        }

        let array = scheduler.submit_array(&self.array).await?;
        metrics::JOBS_SUBMITTED.with_label_values(&["array"]).inc();
        info!(job_id = %array, tasks = self.array.tasks, "Submitted array job");

        let dependency = Dependency {
            on: array.clone(),
            policy: self.policy,
        };
        let aggregate = scheduler.submit(&self.aggregate, Some(&dependency)).await?;
        metrics::JOBS_SUBMITTED.with_label_values(&["aggregate"]).inc();
        info!(job_id = %aggregate, after = %array, policy = %self.policy, "Submitted aggregation job");

        Ok(SubmittedGraph { array, aggregate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::JobId;
    use crate::testing::MockScheduler;
    use std::path::PathBuf;

    fn graph(tasks: usize, policy: DependencyPolicy) -> JobGraph {
        JobGraph::new(
            ArrayJob {
                name: "fmriqc".to_string(),
                command_file: PathBuf::from("/study/jobs/commands.txt"),
                tasks,
                log_dir: PathBuf::from("/study/logs"),
                script_dir: PathBuf::from("/study/jobs"),
            },
            Job {
                name: "fmriqc_aggregate".to_string(),
                script: PathBuf::from("/study/jobs/aggregate.sh"),
                log_dir: PathBuf::from("/study/logs"),
            },
            policy,
        )
    }

    #[test]
    fn test_every_task_feeds_aggregate() {
        let g = graph(3, DependencyPolicy::AllTerminal);
        assert_eq!(g.nodes().len(), 4);
        assert_eq!(g.edges().len(), 3);
        assert_eq!(
            g.upstream(JobNode::Aggregate),
            vec![
                JobNode::ArrayTask(0),
                JobNode::ArrayTask(1),
                JobNode::ArrayTask(2)
            ]
        );
        assert!(g.upstream(JobNode::ArrayTask(1)).is_empty());
    }

    #[tokio::test]
    async fn test_submit_holds_aggregate_on_array() {
        let scheduler = MockScheduler::new();
        let submitted = graph(3, DependencyPolicy::AllSuccess)
            .submit(&scheduler)
            .await
            .unwrap();

        let arrays = scheduler.arrays().await;
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].tasks, 3);

        let jobs = scheduler.jobs().await;
        assert_eq!(jobs.len(), 1);
        let dependency = jobs[0].1.clone().unwrap();
        assert_eq!(dependency.on, submitted.array);
        assert_eq!(dependency.policy, DependencyPolicy::AllSuccess);
        assert_ne!(submitted.aggregate, JobId::new(submitted.array.as_str()));
    }

    #[tokio::test]
    async fn test_unsupported_policy_submits_nothing() {
        let scheduler = MockScheduler::new().with_policies(&[DependencyPolicy::AllTerminal]);
        let err = graph(2, DependencyPolicy::AllSuccess)
            .submit(&scheduler)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnsupportedPolicy { .. }));
        assert!(scheduler.arrays().await.is_empty());
    }
}

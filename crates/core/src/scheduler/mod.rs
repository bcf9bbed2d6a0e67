//! Scheduler module: submitting the batch to a cluster job queue.
//!
//! A batch is a [`JobGraph`]: one array job with a task per input volume,
//! and one aggregation job held until the array is finished under a
//! [`DependencyPolicy`]. Backends implement [`Scheduler`].
//!
//! # Example
//!
//! ```ignore
//! use fmriqc_core::scheduler::{JobGraph, SchedulerConfig, SlurmScheduler, DependencyPolicy};
//!
//! let scheduler = SlurmScheduler::new(SchedulerConfig::default());
//! let graph = JobGraph::new(array_job, aggregate_job, DependencyPolicy::AllSuccess);
//! let ids = graph.submit(&scheduler).await?;
//! println!("array {} -> aggregate {}", ids.array, ids.aggregate);
//! ```

mod config;
mod error;
mod fsl_sub;
mod graph;
mod shell;
mod slurm;
mod traits;
mod types;

use std::sync::Arc;

pub use config::{SchedulerBackend, SchedulerConfig};
pub use error::SchedulerError;
pub use fsl_sub::FslSubScheduler;
pub use graph::JobGraph;
pub use shell::{shell_join, shell_quote, write_script};
pub use slurm::{SBatchOpts, SlurmScheduler};
pub use traits::Scheduler;
pub use types::{ArrayJob, Dependency, DependencyPolicy, Job, JobId, JobNode, SubmittedGraph};

/// Builds the scheduler selected by `config`.
pub fn create_scheduler(config: &SchedulerConfig) -> Arc<dyn Scheduler> {
    match config.backend {
        SchedulerBackend::FslSub => Arc::new(FslSubScheduler::new(config.clone())),
        SchedulerBackend::Slurm => Arc::new(SlurmScheduler::new(config.clone())),
    }
}

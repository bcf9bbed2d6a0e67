//! Batch module: fanning a whole study out over a cluster.
//!
//! The coordinator discovers every input volume under a study root, writes
//! one pipeline command per volume and an aggregation script, then submits
//! them as a [`JobGraph`](crate::scheduler::JobGraph): an array job plus a
//! summary job held until the array is finished.
//!
//! # Example
//!
//! ```ignore
//! use fmriqc_core::batch::{BatchConfig, BatchCoordinator, BatchRequest};
//!
//! let coordinator = BatchCoordinator::new(BatchConfig::default(), scheduler, identifier);
//! let outcome = coordinator.run(&BatchRequest::new("/data/study")).await?;
//! println!("{} runs submitted", outcome.plan.runs.len());
//! ```

mod config;
mod coordinator;
mod discovery;
mod error;

pub use config::BatchConfig;
pub use coordinator::{
    aggregate_study, BatchCoordinator, BatchOutcome, BatchPlan, BatchRequest, PlannedRun,
};
pub use discovery::{discover_inputs, output_subdir, Discovery};
pub use error::BatchError;

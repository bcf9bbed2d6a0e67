pub mod batch;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod summary;
pub mod testing;
pub mod toolkit;

pub use batch::{aggregate_study, BatchConfig, BatchCoordinator, BatchError, BatchRequest};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
};
pub use pipeline::{
    PipelineConfig, PipelineRunner, RunOutcome, RunRequest, RunnerError, SampleType, StageId,
    Variant,
};
pub use scheduler::{create_scheduler, Scheduler, SchedulerConfig, SchedulerError};
pub use summary::{aggregate_summaries, SummaryError};
pub use toolkit::{FslToolkit, Reporter, ScriptReporter, Toolkit, ToolkitError};

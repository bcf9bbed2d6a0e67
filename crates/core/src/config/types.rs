use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::pipeline::PipelineConfig;
use crate::scheduler::SchedulerConfig;
use crate::toolkit::{ReporterConfig, ToolkitConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub toolkit: ToolkitConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

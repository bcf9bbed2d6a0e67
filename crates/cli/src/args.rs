use std::path::PathBuf;

use fmriqc_core::SampleType;

#[derive(clap::Parser, Debug)]
#[command(name = "fmriqc", version, about = "fMRI quality-control pipeline")]
#[command(arg_required_else_help = true)]
pub struct FmriqcArgs {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand, Debug)]
pub enum Action {
    /// Run the QC pipeline on one input volume.
    Run(RunArgs),
    /// Submit every scan of a study to the cluster.
    Batch(BatchArgs),
    /// Collect every run's summary row into the study table.
    Aggregate(AggregateArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// 4D input series (.nii or .nii.gz).
    pub input: PathBuf,
    /// Directory the run directory is created in.
    pub output_root: PathBuf,
    /// invivo or phantom.
    #[arg(default_value = "invivo")]
    pub sample_type: SampleType,
}

#[derive(clap::Args, Debug)]
pub struct BatchArgs {
    pub study_root: PathBuf,
    #[arg(default_value = "invivo")]
    pub sample_type: SampleType,
    /// Write the job files without submitting.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct AggregateArgs {
    pub study_root: PathBuf,
}

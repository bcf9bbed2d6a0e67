mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fmriqc_core::{
    aggregate_study, create_scheduler, load_default_config, pipeline::SuffixIdentifier,
    validate_config, BatchCoordinator, BatchError, BatchRequest, Config, FslToolkit,
    PipelineRunner, RunRequest, RunnerError, ScriptReporter,
};

use args::{Action, AggregateArgs, BatchArgs, FmriqcArgs, RunArgs};

#[tokio::main]
async fn main() {
    let args = match FmriqcArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                | ErrorKind::MissingRequiredArgument
                | ErrorKind::MissingSubcommand => 0,
                _ => e.exit_code(),
            };
            std::process::exit(code);
        }
    };

    init_logging(args.log_json);

    if let Err(e) = run(args).await {
        if is_user_error(&e) {
            println!("{:#}", e);
            return;
        }
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Bad input from the user is reported but does not fail the process.
fn is_user_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<RunnerError>()
            .map(RunnerError::is_user_error)
            .or_else(|| cause.downcast_ref::<BatchError>().map(BatchError::is_user_error))
            .unwrap_or(false)
    })
}

async fn run(args: FmriqcArgs) -> Result<()> {
    let config = load_default_config().context("Failed to load configuration")?;
    validate_config(&config).context("Configuration validation failed")?;

    match args.action {
        Action::Run(run_args) => run_pipeline(&config, run_args).await,
        Action::Batch(batch_args) => run_batch(&config, batch_args).await,
        Action::Aggregate(aggregate_args) => run_aggregate(&config, aggregate_args),
    }
}

async fn run_pipeline(config: &Config, args: RunArgs) -> Result<()> {
    let runner = PipelineRunner::new(
        config.pipeline.clone(),
        Arc::new(FslToolkit::new(config.toolkit.clone())),
        Arc::new(ScriptReporter::new(config.reporter.clone())),
    );
    let request = RunRequest::new(&args.input, &args.output_root).with_sample_type(args.sample_type);

    let outcome = runner.run(&request).await?;
    info!(
        run_dir = %outcome.run_dir.display(),
        executed = outcome.executed.len(),
        skipped = outcome.skipped.len(),
        tsfnr = outcome.tsfnr,
        "Run finished"
    );
    Ok(())
}

async fn run_batch(config: &Config, args: BatchArgs) -> Result<()> {
    let scheduler = create_scheduler(&config.scheduler);
    info!("Using scheduler: {}", scheduler.name());

    let coordinator = BatchCoordinator::new(
        config.batch.clone(),
        scheduler,
        Arc::new(SuffixIdentifier::new(config.pipeline.run_dir_suffix.clone())),
    );
    let request = BatchRequest::new(&args.study_root)
        .with_sample_type(args.sample_type)
        .dry_run(args.dry_run);

    let outcome = coordinator.run(&request).await?;
    match outcome.submitted {
        Some(ids) => println!(
            "Submitted {} runs as job {}; aggregation job {}",
            outcome.plan.runs.len(),
            ids.array,
            ids.aggregate
        ),
        None => println!(
            "Wrote {} commands to {}",
            outcome.plan.runs.len(),
            outcome.plan.command_file.display()
        ),
    }
    Ok(())
}

fn run_aggregate(config: &Config, args: AggregateArgs) -> Result<()> {
    let rows = aggregate_study(&config.batch, &args.study_root)
        .with_context(|| format!("Failed to aggregate {}", args.study_root.display()))?;
    info!(
        rows,
        output = %config.batch.summary_path(&args.study_root).display(),
        "Study summary written"
    );
    Ok(())
}

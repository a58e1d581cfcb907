//! Command-line entry point: run a session plan and hold it until Ctrl+C

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;

use coordinator::{Coordinator, CoordinatorConfig, OutputMode, SessionPlan};
use shared::logging::{self, Component};

/// Start the services of a session plan in order and wait for each to be ready
#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Starts dependent services in order and blocks until each is ready")]
pub struct Args {
    /// Session plan (JSON)
    #[arg(long)]
    pub plan: PathBuf,

    /// Worker index selecting the port block and artifact names
    #[arg(long, default_value = "1")]
    pub worker_index: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Child output forwarding: tracing, prefixed or discard (overrides the plan)
    #[arg(long, value_parser = parse_output_mode)]
    pub output: Option<OutputMode>,

    /// Directory for config artifacts (overrides the plan)
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Keep services running until Ctrl+C instead of tearing down once ready
    #[arg(long)]
    pub keep_running: bool,
}

fn parse_output_mode(value: &str) -> Result<OutputMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "tracing" => Ok(OutputMode::Tracing),
        "prefixed" => Ok(OutputMode::Prefixed),
        "discard" => Ok(OutputMode::Discard),
        other => Err(format!("unknown output mode '{other}'")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing_with_level(Component::Coordinator, Some(&args.log_level));

    let plan = SessionPlan::from_file(&args.plan).with_context(|| format!("loading {}", args.plan.display()))?;

    let mut config = plan.settings.apply(CoordinatorConfig::new(args.worker_index));
    if let Some(output) = args.output {
        config = config.with_output(output);
    }
    if let Some(ref dir) = args.artifact_dir {
        config = config.with_artifact_dir(dir);
    }
    logging::log_startup(
        "coordinator",
        &format!("{} services for worker {}", plan.services.len(), config.worker_index),
    );

    let specs = plan.into_specs(config.ports.for_worker(config.worker_index))?;
    let coordinator = Coordinator::from_env(config);
    let mut session = coordinator.start(specs).await?;

    for service in session.services() {
        for (name, port) in service.ports() {
            tracing::info!(service = %service.label(), "{} port: {}", name, port);
        }
    }

    if args.keep_running {
        match signal::ctrl_c().await {
            Ok(()) => logging::log_shutdown("coordinator", "Received Ctrl+C signal"),
            Err(err) => logging::log_error("coordinator", "Signal handling", &err),
        }
    }

    let report = session.teardown().await;
    if !report.is_clean() {
        anyhow::bail!("{} services failed to release cleanly", report.failures.len());
    }

    logging::log_success("coordinator", "All services released");
    Ok(())
}

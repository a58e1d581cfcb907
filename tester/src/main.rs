//! Stack runner
//!
//! Loads `*_BUILD_PATH` variables from a `.env` file, brings the stack up
//! for one worker and keeps it running until Ctrl+C (or tears it straight
//! down again with `--check`).

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use coordinator::{Coordinator, CoordinatorConfig, OutputMode, ReleasePolicy};
use shared::logging::{self, Component};
use tester::{Protocol, Stack, StackOptions, StackService, TlsFixtures};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Brings up the store, aggregator, agent and gateway for one worker")]
struct Args {
    /// Worker index selecting the port block
    #[arg(long, default_value = "1")]
    worker_index: u16,

    /// Services to start (comma separated); dependencies are not added implicitly
    #[arg(long, value_delimiter = ',')]
    services: Vec<StackService>,

    /// Agent transport: udp, tcp or tls
    #[arg(long, default_value = "udp")]
    protocol: Protocol,

    /// Directory holding the TLS certificate fixtures
    #[arg(long, default_value = "../fixtures")]
    fixtures_dir: PathBuf,

    /// Environment file with the *_BUILD_PATH variables
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Forward service output as tracing events instead of prefixed lines
    #[arg(long)]
    tracing_output: bool,

    /// Seconds to wait for a graceful stop before killing (0 kills at once)
    #[arg(long, default_value = "0")]
    grace_secs: u64,

    /// Tear the stack down as soon as every service is ready
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_loaded = match args.env_file {
        Some(ref path) => Some(dotenv::from_path(path).with_context(|| format!("loading {}", path.display()))?),
        None => dotenv::dotenv().ok().map(|_| ()),
    };

    logging::init_tracing_with_level(Component::Tester, Some(&args.log_level));
    if env_loaded.is_some() {
        tracing::debug!("Loaded environment file");
    }

    let release = if args.grace_secs == 0 {
        ReleasePolicy::Kill
    } else {
        ReleasePolicy::Terminate {
            grace: std::time::Duration::from_secs(args.grace_secs),
        }
    };
    let config = CoordinatorConfig::new(args.worker_index)
        .with_output(if args.tracing_output {
            OutputMode::Tracing
        } else {
            OutputMode::Prefixed
        })
        .with_release(release);

    let options = StackOptions {
        services: if args.services.is_empty() {
            StackService::ALL.to_vec()
        } else {
            args.services.clone()
        },
        protocol: args.protocol,
        fixtures: TlsFixtures::new(&args.fixtures_dir),
        ..StackOptions::default()
    };

    logging::log_startup("tester", &format!("stack for worker {}", args.worker_index));
    let coordinator = Coordinator::from_env(config);
    let mut stack = Stack::start(&coordinator, &options).await?;

    let ports = stack.ports();
    tracing::info!("📡 Store: {}", stack.store_url());
    tracing::info!(
        "📡 Aggregator: udp {} tcp {} tls {} outgoing {}",
        ports.aggregator.udp,
        ports.aggregator.tcp,
        ports.aggregator.tls,
        ports.aggregator.outgoing
    );
    tracing::info!("📡 Agent: udp {}  Gateway: {}", ports.agent, ports.gateway);

    if !args.check {
        tracing::info!("🔄 Stack is up, press Ctrl+C to stop all services");
        if let Err(err) = tokio::signal::ctrl_c().await {
            logging::log_error("tester", "Signal handling", &err);
        }
    }

    let report = stack.teardown().await;
    if !report.is_clean() {
        anyhow::bail!("{} services failed to release cleanly", report.failures.len());
    }

    logging::log_success("tester", "Stack stopped");
    Ok(())
}

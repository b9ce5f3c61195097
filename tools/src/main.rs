//! Simulates replicas of the APY estimation application and checks that they agree.
use std::{fs, io::IsTerminal as _, path::PathBuf};

use abci_tools::{Simulator, SimulatorConfig};
use anyhow::Context as _;
use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{prelude::*, Registry};
use vise_exporter::MetricsExporter;

/// Command-line application running a simulation.
#[derive(Debug, Parser)]
struct Args {
    /// Verify configuration instead of running the simulation.
    #[arg(long)]
    verify_config: bool,
    /// Path to a JSON file with the simulation configuration.
    #[arg(long, default_value = "simulator.json")]
    config_file: PathBuf,
    /// Number of replicas to simulate.
    #[arg(long, default_value_t = 4)]
    replicas: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();
    tracing::trace!(?args, "Starting simulator");

    if !args.verify_config {
        // Create log file.
        fs::create_dir_all("logs/")?;
        let log_file = fs::File::create("logs/output.log")?;

        // Human-readable logs of level INFO or higher.
        let stdout_log = tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(std::env::var("NO_COLOR").is_err() && std::io::stdout().is_terminal())
            .with_file(false)
            .with_line_number(false)
            .with_filter(LevelFilter::INFO);

        // Machine-readable logs of level DEBUG or higher.
        let file_log = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(log_file)
            .with_filter(LevelFilter::DEBUG);

        let subscriber = Registry::default().with(stdout_log).with(file_log);
        tracing::subscriber::set_global_default(subscriber)
            .context("set_global_default()")?;
    }

    tracing::debug!("Loading config file.");
    let cfg = SimulatorConfig::read(&args.config_file).context("SimulatorConfig::read()")?;

    if args.verify_config {
        tracing::info!("Configuration verified.");
        return Ok(());
    }

    if let Some(addr) = cfg.metrics_server_addr {
        tokio::spawn(async move {
            if let Err(err) = MetricsExporter::default().start(addr).await {
                tracing::warn!("metrics exporter stopped: {err}");
            }
        });
    }

    let simulator = Simulator::new(cfg, args.replicas).context("Simulator::new()")?;
    let report = tokio::task::spawn_blocking(move || simulator.run())
        .await
        .context("simulator panicked")?
        .context("simulation failed")?;
    tracing::info!(
        rounds = report.rounds,
        timeouts = report.timeouts,
        periods = report.periods,
        elapsed = ?report.elapsed,
        "Replicas agree."
    );
    Ok(())
}

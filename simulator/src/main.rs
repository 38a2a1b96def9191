// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trail Simulator
//!
//! Entry point for the `trail-sim` binary. Parses CLI arguments, initializes
//! logging and metrics, then drives one simulation from genesis to the end
//! height, streaming a JSON record per block to the report file.
//!
//! The binary supports two subcommands:
//!
//! - `run`     - simulate and write `output_<unix-time>.json`
//! - `version` - print build version information
//!
//! Every phase of every block runs under a watchdog. A phase that overruns
//! its budget ends the process with exit code 2; the report keeps every
//! block finished before it.

mod cli;
mod hook;
mod logging;
mod memory;
mod metrics;
mod report;
mod timer;
mod watchdog;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use trail_protocol::{BlockReport, Simulation, SimulationConfig};

use cli::{Commands, RunArgs, TrailSimCli};
use hook::RunHook;
use logging::LogFormat;
use metrics::SimulatorMetrics;
use report::ReportWriter;
use timer::Timer;
use watchdog::Watchdog;

/// Exit code for a phase that overran its time budget.
const EXIT_PHASE_TIMEOUT: i32 = 2;

fn main() -> Result<()> {
    let cli = TrailSimCli::parse();

    match cli.command {
        Commands::Run(args) => run_simulation(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs one simulation to completion.
fn run_simulation(args: RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format));

    let config = SimulationConfig::default();
    let seed = args
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64);

    info!(
        nodes = config.nodes,
        clients = config.clients,
        end_height = config.end_height,
        archive_window = config.archive_window,
        seed,
        "starting trail-sim"
    );

    let mut simulation =
        Simulation::new(config.clone(), seed).context("invalid simulation configuration")?;

    // --- Report file ---
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;
    let mut writer = ReportWriter::create(&args.output_dir, &config)?;
    info!(path = %writer.path().display(), "report opened");

    // --- Metrics and watchdog ---
    let metrics = SimulatorMetrics::new().context("failed to register metrics")?;
    let watchdog = Watchdog::spawn(Box::new(|phase: &'static str| {
        error!(phase, "phase exceeded its time budget, aborting run");
        std::process::exit(EXIT_PHASE_TIMEOUT);
    }))
    .context("failed to start watchdog thread")?;
    let mut hook = RunHook::new(&watchdog, &metrics);

    // --- Block loop ---
    let mut timer = Timer::start("block");

    let report = simulation
        .genesis(&mut hook)
        .context("failed to produce genesis")?;
    record_block(&mut writer, &metrics, &report)?;
    timer.record_lap();

    while !simulation.is_finished() {
        let next_height = simulation.tip().map_or(0, |(_, height)| height + 1);
        let report = simulation
            .step(&mut hook)
            .with_context(|| format!("failed to simulate block {next_height}"))?;
        record_block(&mut writer, &metrics, &report)?;
        timer.record_lap();
        memory::log_memory_usage("block", false);
    }

    info!(
        blocks = timer.laps(),
        elapsed_ms = timer.total().as_millis() as u64,
        path = %writer.path().display(),
        "simulation finished"
    );
    memory::log_memory_usage("end of run", true);

    if let Some(path) = &args.metrics_out {
        let text = metrics.encode().context("failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }

    Ok(())
}

/// Mirror a block record into the metrics and the report file.
fn record_block(
    writer: &mut ReportWriter,
    metrics: &SimulatorMetrics,
    report: &BlockReport,
) -> Result<()> {
    metrics.observe(report);
    writer.append(report)
}

/// Prints version information to stdout.
fn print_version() {
    println!("trail-sim {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", trail_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

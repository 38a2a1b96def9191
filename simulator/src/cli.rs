//! # CLI Interface
//!
//! Defines the command-line argument structure for `trail-sim` using
//! `clap` derive. Simulation parameters are compiled in; the flags only
//! decide where results go and how the run is observed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trail accumulator simulator.
///
/// Produces blocks with random transfers between simulated clients and
/// records, per block, how much proof data the clients keep in memory and
/// in their archives.
#[derive(Parser, Debug)]
#[command(
    name = "trail-sim",
    about = "Trail stateless-client accumulator simulator",
    version,
    propagate_version = true
)]
pub struct TrailSimCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one simulation up to the configured end height.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory the `output_<unix-time>.json` report is written to.
    ///
    /// Created if it does not exist.
    #[arg(long, short = 'o', env = "TRAIL_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// RNG seed. Two runs with the same seed produce the same chain.
    ///
    /// Defaults to the current time.
    #[arg(long, env = "TRAIL_SEED")]
    pub seed: Option<u64>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, default_value = "trail_sim=info,trail_protocol=info")]
    pub log_level: String,

    /// Write the final Prometheus metrics (text format) to this file.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TrailSimCli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = TrailSimCli::parse_from(["trail-sim", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.output_dir, PathBuf::from("output"));
        assert_eq!(args.log_format, "pretty");
        assert!(args.metrics_out.is_none());
    }

    #[test]
    fn test_run_with_seed_and_metrics() {
        let cli = TrailSimCli::parse_from([
            "trail-sim",
            "run",
            "--seed",
            "42",
            "-o",
            "/tmp/out",
            "--metrics-out",
            "/tmp/metrics.prom",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(args.metrics_out, Some(PathBuf::from("/tmp/metrics.prom")));
    }
}

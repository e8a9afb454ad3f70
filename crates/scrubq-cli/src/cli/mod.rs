//! CLI for the scrubq scrub scheduler.

mod commands;
mod sim;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scrubq_core::config;
use std::path::PathBuf;

use commands::{run_config, run_gate, run_simulation};

/// Top-level CLI for the scrub scheduler.
#[derive(Debug, Parser)]
#[command(name = "scrubq")]
#[command(about = "scrubq: scrub scheduling for a storage node", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config path.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Drive the scheduler against an in-process simulated node.
    Run {
        /// Number of simulated shards to register.
        #[arg(long, default_value = "8", value_name = "N")]
        shards: u32,
        /// Number of scheduling ticks to run.
        #[arg(long, default_value = "30", value_name = "T")]
        ticks: u32,
        /// Chance (percent) that a started scrub fails to reserve its replicas.
        #[arg(
            long,
            default_value = "10",
            value_name = "P",
            value_parser = clap::value_parser!(u8).range(0..=100)
        )]
        replica_failure_pct: u8,
    },

    /// Show whether the clock and load gates admit periodic scrubs right now.
    Gate,

    /// Print the effective configuration as TOML.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                shards,
                ticks,
                replica_failure_pct,
            } => run_simulation(&cfg, shards, ticks, replica_failure_pct).await?,
            CliCommand::Gate => run_gate(&cfg)?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

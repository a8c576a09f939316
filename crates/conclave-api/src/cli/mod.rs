//! CLI command definitions for the `conclave` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod simulate;
pub mod timeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run scripted round-table conversations between several agents.
#[derive(Parser)]
#[command(name = "conclave", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "CONCLAVE_OTEL")]
    pub otel: bool,

    /// Engine configuration file [default: ~/.conclave/config.toml].
    #[arg(long, global = true, env = "CONCLAVE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a scenario file through a round table and print the timeline.
    Simulate {
        /// Path to the scenario TOML file.
        scenario: PathBuf,

        /// Pause between streamed chunks, in milliseconds.
        #[arg(long, value_name = "MS")]
        chunk_delay: Option<u64>,

        /// Override the scenario's turn mode (broadcast or goal).
        #[arg(long)]
        turn_mode: Option<String>,

        /// Print streamed text as it arrives.
        #[arg(long)]
        live: bool,
    },

    /// Show the effective engine configuration.
    Config,
}

//! Conclave CLI entry point.
//!
//! Binary name: `conclave`
//!
//! Parses CLI arguments, installs tracing, then dispatches to the command
//! handler.

mod cli;

use std::time::Duration;

use clap::Parser;

use cli::simulate::SimulateOptions;
use cli::{Cli, Commands};
use conclave_infra::config::default_config_path;
use conclave_observe::tracing_setup::{init_tracing, shutdown_tracing};
use conclave_types::message::TurnMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Verbosity picks the filter unless RUST_LOG is set
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,conclave_core=debug",
        _ => "trace",
    };
    init_tracing(cli.otel, filter)?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let result = match cli.command {
        Commands::Simulate {
            scenario,
            chunk_delay,
            turn_mode,
            live,
        } => {
            let turn_mode = turn_mode
                .as_deref()
                .map(str::parse::<TurnMode>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            cli::simulate::simulate(SimulateOptions {
                scenario: &scenario,
                config: &config_path,
                chunk_delay: chunk_delay.map(Duration::from_millis),
                turn_mode,
                live,
                json: cli.json,
                quiet: cli.quiet,
            })
            .await
        }

        Commands::Config => cli::config::show_config(&config_path, cli.json).await,
    };

    shutdown_tracing();
    result
}

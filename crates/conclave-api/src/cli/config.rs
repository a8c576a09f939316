//! `conclave config`: print the effective engine configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use conclave_infra::config::load_engine_config;

/// Print the configuration loaded from `path`, with defaults filled in.
pub async fn show_config(path: &Path, json: bool) -> Result<()> {
    let config = load_engine_config(path).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = if tokio::fs::try_exists(path).await.unwrap_or(false) {
        format!("{}", style(path.display()).cyan())
    } else {
        format!("{} (not found, using defaults)", style(path.display()).dim())
    };
    println!();
    println!("  {} {source}", style("Config:").bold());
    println!();
    for line in toml::to_string_pretty(&config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

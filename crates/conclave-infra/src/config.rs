//! Engine configuration loader for Conclave.
//!
//! Reads a TOML file (`{data_dir}/config.toml` by default) and
//! deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use conclave_types::config::{EngineConfig, TurnConfig};

/// Smallest allowed per-agent reply limit.
const MIN_TURN_LIMIT: u32 = 1;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CONCLAVE_DATA_DIR` environment variable
/// 2. `~/.conclave`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CONCLAVE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".conclave");
    }

    PathBuf::from(".conclave")
}

/// Default location of the engine configuration file.
pub fn default_config_path() -> PathBuf {
    resolve_data_dir().join("config.toml")
}

/// Load engine configuration from `path`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config with turn limits normalized.
pub async fn load_engine_config(path: &Path) -> EngineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(mut config) => {
            config.turns = resolve_turn_limits(&config.turns);
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            EngineConfig::default()
        }
    }
}

/// Normalize reply limits.
///
/// Each limit is at least 1, and the goal-directed limit is never below
/// the broadcast limit.
pub fn resolve_turn_limits(turns: &TurnConfig) -> TurnConfig {
    let broadcast_limit = turns.broadcast_limit.max(MIN_TURN_LIMIT);
    TurnConfig {
        broadcast_limit,
        goal_limit: turns.goal_limit.max(broadcast_limit),
    }
}

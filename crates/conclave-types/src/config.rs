//! Engine configuration types for Conclave.
//!
//! `EngineConfig` represents the `conclave.toml` file that controls turn
//! budgets, context-window sizing, summarization, and generation defaults.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the round-table engine.
///
/// All fields have defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the broadcast event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub turns: TurnConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            turns: TurnConfig::default(),
            context: ContextConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Per-agent reply limits between two user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnConfig {
    #[serde(default = "default_broadcast_limit")]
    pub broadcast_limit: u32,
    #[serde(default = "default_goal_limit")]
    pub goal_limit: u32,
}

fn default_broadcast_limit() -> u32 {
    2
}

fn default_goal_limit() -> u32 {
    8
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            broadcast_limit: default_broadcast_limit(),
            goal_limit: default_goal_limit(),
        }
    }
}

/// Context-window and summarization thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Fraction of the model context limit available to history.
    #[serde(default = "default_window_ratio")]
    pub window_ratio: f64,
    /// Fraction of the window threshold at which summarization triggers.
    #[serde(default = "default_summarize_ratio")]
    pub summarize_ratio: f64,
    /// Timeline must be strictly longer than this to summarize.
    #[serde(default = "default_summarize_min_messages")]
    pub summarize_min_messages: usize,
    /// Most recent entries left out of the summary.
    #[serde(default = "default_summary_keep_recent")]
    pub summary_keep_recent: usize,
    #[serde(default = "default_summary_max_words")]
    pub summary_max_words: usize,
}

fn default_window_ratio() -> f64 {
    0.7
}

fn default_summarize_ratio() -> f64 {
    0.85
}

fn default_summarize_min_messages() -> usize {
    10
}

fn default_summary_keep_recent() -> usize {
    3
}

fn default_summary_max_words() -> usize {
    200
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_ratio: default_window_ratio(),
            summarize_ratio: default_summarize_ratio(),
            summarize_min_messages: default_summarize_min_messages(),
            summary_keep_recent: default_summary_keep_recent(),
            summary_max_words: default_summary_max_words(),
        }
    }
}

/// Defaults applied to every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Prefer streaming when the provider supports it.
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_streaming() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            streaming: default_streaming(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

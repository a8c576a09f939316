//! Scripted round-table scenarios.
//!
//! A scenario is a TOML file that seats participants with scripted replies,
//! declares optional tool providers, and lists the user messages to post:
//!
//! ```toml
//! name = "Launch planning"
//! turn_mode = "goal"
//! messages = ["hello everyone", "@Grace what is the risk?"]
//!
//! [[participants]]
//! name = "Ada"
//! persona = "Precise engineer."
//! replies = ["@Grace can you check the schedule?", "[[SILENT]]"]
//!
//! [[tools]]
//! name = "calendar"
//! description = "Team calendar"
//! tools = [{ name = "free_slots", description = "Open meeting slots" }]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use conclave_core::llm::box_provider::BoxLlmProvider;
use conclave_core::llm::registry::ProviderRegistry;
use conclave_types::error::RoundTableError;
use conclave_types::message::TurnMode;
use conclave_types::roundtable::{Participant, RoundTable};
use conclave_types::tool::ToolDefinition;

use crate::llm::ScriptedProvider;
use crate::tool::{StaticToolProvider, StaticToolRegistry};

/// Errors from loading a scenario file.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),

    #[error(transparent)]
    RoundTable(#[from] RoundTableError),
}

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub turn_mode: TurnMode,
    #[serde(default)]
    pub participants: Vec<ScenarioParticipant>,
    #[serde(default)]
    pub tools: Vec<ScenarioToolProvider>,
    /// User messages, posted in order once the table is idle.
    #[serde(default)]
    pub messages: Vec<String>,
}

/// A seated participant and its reply script.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioParticipant {
    pub name: String,
    #[serde(default)]
    pub persona: String,
    /// Model reference; defaults to `scripted-{lowercase name}`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub replies: Vec<String>,
    #[serde(default)]
    pub context_limit: Option<u32>,
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

fn default_streaming() -> bool {
    true
}

impl ScenarioParticipant {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| format!("scripted-{}", self.name.to_lowercase()))
    }

    fn provider(&self, chunk_delay: Option<Duration>) -> ScriptedProvider {
        let mut provider = ScriptedProvider::new(self.name.clone(), self.replies.clone());
        if let Some(limit) = self.context_limit {
            provider = provider.with_context_limit(limit);
        }
        if !self.streaming {
            provider = provider.without_streaming();
        }
        if let Some(delay) = chunk_delay {
            provider = provider.with_chunk_delay(delay);
        }
        provider
    }
}

/// A tool provider offered to every participant.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioToolProvider {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Scenario {
    /// Parse and validate scenario TOML.
    pub fn from_toml(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.participants.is_empty() {
            return Err(ScenarioError::Invalid(
                "at least one participant is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for participant in &self.participants {
            if participant.name.trim().is_empty() {
                return Err(ScenarioError::Invalid(
                    "participant name must not be empty".to_string(),
                ));
            }
            if !names.insert(participant.name.to_lowercase()) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate participant name '{}'",
                    participant.name
                )));
            }
        }
        Ok(())
    }

    /// Build the round table with every participant seated in file order.
    pub fn build_round_table(&self) -> Result<RoundTable, ScenarioError> {
        let mut round_table = RoundTable::new(self.name.clone());
        for participant in &self.participants {
            round_table.add_participant(Participant::new(
                participant.name.clone(),
                participant.persona.clone(),
                participant.model(),
            ))?;
        }
        Ok(round_table)
    }

    /// One scripted provider per participant, keyed by its model.
    pub fn provider_registry(&self, chunk_delay: Option<Duration>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for participant in &self.participants {
            registry.register(
                participant.model(),
                BoxLlmProvider::new(participant.provider(chunk_delay)),
            );
        }
        registry
    }

    /// The declared tool providers, or `None` when there are none.
    pub fn tool_registry(&self) -> Option<StaticToolRegistry> {
        if self.tools.is_empty() {
            return None;
        }
        let providers = self
            .tools
            .iter()
            .map(|t| {
                let provider =
                    StaticToolProvider::new(t.name.clone(), t.description.clone(), t.tools.clone());
                if t.enabled { provider } else { provider.disabled() }
            })
            .collect();
        Some(StaticToolRegistry::new(providers))
    }
}

/// Read and validate a scenario file.
pub async fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let scenario = Scenario::from_toml(&content)?;
    tracing::debug!(
        scenario = %scenario.name,
        participants = scenario.participants.len(),
        messages = scenario.messages.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

//! External tool descriptors.
//!
//! A tool provider (an MCP-style server) is enumerated as a
//! [`ToolProviderInfo`]; connecting to it yields concrete
//! [`ToolDefinition`]s that can be bound to a completion request.

use serde::{Deserialize, Serialize};

/// An enabled tool provider as listed by the tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProviderInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A tool exposed by a connected provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema describing the tool input.
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDefinition {
    /// A tool accepting an arbitrary JSON object.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_input_schema(),
        }
    }
}

/// A tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Errors from tool registry operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("tool provider '{0}' not found")]
    ProviderNotFound(String),

    #[error("connection to '{provider}' failed: {message}")]
    Connection { provider: String, message: String },

    #[error("tool registry unavailable: {0}")]
    Unavailable(String),
}

//! Two-phase tool augmentation.
//!
//! Phase 1 runs the generation with no tools bound. If the reply contains
//! `<tool_request name="..." />` markers, each requested name is matched
//! against the enabled providers, matching providers are connected (once per
//! negotiator lifetime), and the generation is re-run with their tools bound.
//! The phase-2 result supersedes phase 1. Without a marker, or without any
//! tools obtained, phase 1 is final.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use conclave_types::event::RoundTableEvent;
use conclave_types::llm::{ChatMessage, CompletionRequest};
use conclave_types::tool::{ToolDefinition, ToolError, ToolProviderInfo};

use crate::agent::generation::{GenerationError, GenerationOutcome, GenerationSession};
use crate::agent::markers::parse_tool_requests;
use crate::event::EventBus;

use super::registry::BoxToolRegistry;

/// Wraps generations with on-demand tool negotiation.
///
/// Connections are cached per provider name and shared by every agent of the
/// round table.
pub struct ToolNegotiator {
    registry: Arc<BoxToolRegistry>,
    providers: OnceCell<Vec<ToolProviderInfo>>,
    connections: DashMap<String, Vec<ToolDefinition>>,
}

impl ToolNegotiator {
    pub fn new(registry: Arc<BoxToolRegistry>) -> Self {
        Self {
            registry,
            providers: OnceCell::new(),
            connections: DashMap::new(),
        }
    }

    /// Enabled providers, enumerated once and cached.
    ///
    /// An enumeration failure yields an empty list and is retried on the
    /// next call.
    pub async fn providers(&self) -> Vec<ToolProviderInfo> {
        let result = self
            .providers
            .get_or_try_init(|| async { self.registry.enumerate().await })
            .await;
        match result {
            Ok(list) => list.clone(),
            Err(e) => {
                warn!(error = %e, "failed to enumerate tool providers");
                Vec::new()
            }
        }
    }

    /// Names of providers with a cached connection.
    pub fn connected(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Run `session` with two-phase tool negotiation.
    pub async fn negotiate(
        &self,
        session: &GenerationSession<'_>,
        mut request: CompletionRequest,
        events: &EventBus,
        agent_id: Uuid,
    ) -> Result<GenerationOutcome, GenerationError> {
        request.tools.clear();
        let phase_one = session.run(request.clone()).await?;
        let requested = match &phase_one {
            GenerationOutcome::Completed(result) => parse_tool_requests(&result.text),
            GenerationOutcome::Cancelled => return Ok(phase_one),
        };
        if requested.is_empty() {
            return Ok(phase_one);
        }
        debug!(agent_id = %agent_id, requested = ?requested, "tool request markers found");

        let providers = self.providers().await;
        let matched = match_providers(&requested, &providers);
        if matched.is_empty() {
            debug!(agent_id = %agent_id, "no tool provider matches the request");
            return Ok(phase_one);
        }

        let mut bound_providers = Vec::new();
        let mut tools: Vec<ToolDefinition> = Vec::new();
        for provider in matched {
            match self.connect(&provider.name).await {
                Ok(provided) if !provided.is_empty() => {
                    bound_providers.push(provider.name.clone());
                    for tool in provided {
                        if !tools.iter().any(|t| t.name == tool.name) {
                            tools.push(tool);
                        }
                    }
                }
                Ok(_) => {
                    debug!(provider = %provider.name, "tool provider exposes no tools");
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, provider = %provider.name, error = %e, "tool connection failed");
                    events.publish(RoundTableEvent::ToolConnectionFailed {
                        agent_id,
                        provider: provider.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if tools.is_empty() {
            return Ok(phase_one);
        }

        info!(
            agent_id = %agent_id,
            providers = ?bound_providers,
            tool_count = tools.len(),
            "re-running generation with tools bound"
        );
        events.publish(RoundTableEvent::ToolsBound {
            agent_id,
            providers: bound_providers,
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });

        request.messages.push(ChatMessage::system(tool_notice(&tools)));
        request.tools = tools;
        session.run(request).await
    }

    async fn connect(&self, provider: &str) -> Result<Vec<ToolDefinition>, ToolError> {
        if let Some(cached) = self.connections.get(provider) {
            return Ok(cached.clone());
        }
        let tools = self.registry.connect(provider).await?;
        self.connections
            .entry(provider.to_string())
            .or_insert_with(|| tools.clone());
        Ok(tools)
    }
}

impl std::fmt::Debug for ToolNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolNegotiator")
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// Providers whose name and a requested name contain one another,
/// case-insensitively, in provider order.
pub fn match_providers<'a>(
    requested: &[String],
    providers: &'a [ToolProviderInfo],
) -> Vec<&'a ToolProviderInfo> {
    let requested: Vec<String> = requested.iter().map(|r| r.to_lowercase()).collect();
    providers
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            requested
                .iter()
                .any(|r| !r.is_empty() && (name.contains(r.as_str()) || r.contains(name.as_str())))
        })
        .collect()
}

fn tool_notice(tools: &[ToolDefinition]) -> String {
    let lines: Vec<String> = tools
        .iter()
        .map(|t| {
            if t.description.is_empty() {
                format!("- {}", t.name)
            } else {
                format!("- {}: {}", t.name, t.description)
            }
        })
        .collect();
    format!(
        "The following tools are now available to you. Use them to answer the last message:\n{}",
        lines.join("\n")
    )
}

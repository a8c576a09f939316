//! Static tool registry.
//!
//! - `StaticToolProvider` -- a named provider with a fixed tool list
//! - `StaticToolRegistry` -- `ToolRegistry` over a fixed set of providers,
//!   with a DashMap of open connections so `connect` is idempotent

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use conclave_core::tool::ToolRegistry;
use conclave_types::tool::{ToolDefinition, ToolError, ToolProviderInfo};

/// A provider known to the registry.
#[derive(Debug, Clone)]
pub struct StaticToolProvider {
    pub info: ToolProviderInfo,
    pub tools: Vec<ToolDefinition>,
    /// Disabled providers are listed but refuse connections.
    pub enabled: bool,
}

impl StaticToolProvider {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            info: ToolProviderInfo {
                name: name.into(),
                description: description.into(),
            },
            tools,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// `ToolRegistry` over providers declared up front.
///
/// Uses `DashMap` for concurrent connection bookkeeping: several agents
/// may connect to the same provider at once, and only the first opens a
/// connection.
#[derive(Debug, Clone, Default)]
pub struct StaticToolRegistry {
    providers: Arc<Vec<StaticToolProvider>>,
    connections: Arc<DashMap<String, Vec<ToolDefinition>>>,
}

impl StaticToolRegistry {
    pub fn new(providers: Vec<StaticToolProvider>) -> Self {
        Self {
            providers: Arc::new(providers),
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Number of providers with an open connection.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, provider: &str) -> bool {
        self.connections.contains_key(provider)
    }
}

impl ToolRegistry for StaticToolRegistry {
    async fn enumerate(&self) -> Result<Vec<ToolProviderInfo>, ToolError> {
        Ok(self.providers.iter().map(|p| p.info.clone()).collect())
    }

    async fn connect(&self, provider: &str) -> Result<Vec<ToolDefinition>, ToolError> {
        if let Some(tools) = self.connections.get(provider) {
            debug!(provider, "reusing tool provider connection");
            return Ok(tools.clone());
        }

        let found = self
            .providers
            .iter()
            .find(|p| p.info.name == provider)
            .ok_or_else(|| ToolError::ProviderNotFound(provider.to_string()))?;
        if !found.enabled {
            return Err(ToolError::Connection {
                provider: provider.to_string(),
                message: "provider is disabled".to_string(),
            });
        }

        let tools = self
            .connections
            .entry(provider.to_string())
            .or_insert_with(|| {
                info!(provider, tools = found.tools.len(), "tool provider connected");
                found.tools.clone()
            })
            .clone();
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StaticToolRegistry {
        StaticToolRegistry::new(vec![
            StaticToolProvider::new(
                "weather",
                "Forecasts and current conditions",
                vec![ToolDefinition::new("forecast", "Five-day forecast")],
            ),
            StaticToolProvider::new("search", "Web search", vec![]).disabled(),
        ])
    }

    #[tokio::test]
    async fn enumerate_lists_every_provider() {
        let providers = registry().enumerate().await.unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["weather", "search"]);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let registry = registry();
        let first = registry.connect("weather").await.unwrap();
        let second = registry.connect("weather").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].name, "forecast");
        assert_eq!(registry.connection_count(), 1);
        assert!(registry.is_connected("weather"));
    }

    #[tokio::test]
    async fn connect_unknown_or_disabled_provider_fails() {
        let registry = registry();
        assert!(matches!(
            registry.connect("calendar").await,
            Err(ToolError::ProviderNotFound(_))
        ));
        assert!(matches!(
            registry.connect("search").await,
            Err(ToolError::Connection { .. })
        ));
        assert_eq!(registry.connection_count(), 0);
    }
}

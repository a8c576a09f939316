//! ToolRegistry trait and its type-erased wrapper.
//!
//! The registry lists enabled tool providers and connects to them on
//! demand. `connect` must be idempotent: connecting twice returns the same
//! tools without opening a second connection.

use std::future::Future;
use std::pin::Pin;

use conclave_types::tool::{ToolDefinition, ToolError, ToolProviderInfo};

/// Port over the external tool ecosystem.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ToolRegistry: Send + Sync {
    /// Enabled tool providers.
    fn enumerate(
        &self,
    ) -> impl Future<Output = Result<Vec<ToolProviderInfo>, ToolError>> + Send;

    /// Connect to a provider (reusing an existing connection) and return
    /// its tools.
    fn connect(
        &self,
        provider: &str,
    ) -> impl Future<Output = Result<Vec<ToolDefinition>, ToolError>> + Send;
}

/// Object-safe version of [`ToolRegistry`] with boxed futures.
pub trait ToolRegistryDyn: Send + Sync {
    fn enumerate_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolProviderInfo>, ToolError>> + Send + '_>>;

    fn connect_boxed<'a>(
        &'a self,
        provider: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolDefinition>, ToolError>> + Send + 'a>>;
}

impl<T: ToolRegistry> ToolRegistryDyn for T {
    fn enumerate_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolProviderInfo>, ToolError>> + Send + '_>> {
        Box::pin(self.enumerate())
    }

    fn connect_boxed<'a>(
        &'a self,
        provider: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolDefinition>, ToolError>> + Send + 'a>> {
        Box::pin(self.connect(provider))
    }
}

/// Type-erased tool registry.
pub struct BoxToolRegistry {
    inner: Box<dyn ToolRegistryDyn + Send + Sync>,
}

impl BoxToolRegistry {
    pub fn new<T: ToolRegistry + 'static>(registry: T) -> Self {
        Self {
            inner: Box::new(registry),
        }
    }

    pub async fn enumerate(&self) -> Result<Vec<ToolProviderInfo>, ToolError> {
        self.inner.enumerate_boxed().await
    }

    pub async fn connect(&self, provider: &str) -> Result<Vec<ToolDefinition>, ToolError> {
        self.inner.connect_boxed(provider).await
    }
}

impl std::fmt::Debug for BoxToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxToolRegistry").finish_non_exhaustive()
    }
}

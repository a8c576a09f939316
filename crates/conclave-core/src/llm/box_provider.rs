//! Type-erased completion provider.
//!
//! `LlmProvider::complete` returns an opaque future, so the trait cannot be
//! a trait object. `LlmProviderDyn` boxes that future and is blanket
//! implemented for every provider; `BoxLlmProvider` owns one and is what
//! the [`ProviderRegistry`](super::registry::ProviderRegistry) stores.

use std::future::Future;
use std::pin::Pin;

use conclave_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

use super::provider::{CompletionStream, LlmProvider};

type CompleteFuture<'a> = Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

/// Object-safe version of [`LlmProvider`].
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompleteFuture<'a>;

    fn stream_boxed(&self, request: CompletionRequest) -> CompletionStream;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        LlmProvider::capabilities(self)
    }

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompleteFuture<'a> {
        Box::pin(self.complete(request))
    }

    fn stream_boxed(&self, request: CompletionRequest) -> CompletionStream {
        self.stream(request)
    }
}

/// A completion provider chosen at runtime by model name.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    /// Model context limit `L`.
    pub fn context_limit(&self) -> u32 {
        self.inner.capabilities().max_context_tokens
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }

    pub fn stream(&self, request: CompletionRequest) -> CompletionStream {
        self.inner.stream_boxed(request)
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .field("context_limit", &self.context_limit())
            .finish()
    }
}

//! LlmProvider trait definition.
//!
//! This is the completion-provider port every backend implements.
//! Uses RPITIT for `complete`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use conclave_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// Stream of events produced by one streaming completion.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for completion provider backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) for
/// `complete`. The `stream` method returns a boxed stream because streams
/// need to be object-safe for `BoxLlmProvider`.
///
/// A scripted implementation lives in conclave-infra.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// What this provider supports (streaming, context limit, etc.).
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    fn stream(&self, request: CompletionRequest) -> CompletionStream;
}

//! Generation session for one agent answering one mailbox entry.
//!
//! A session owns the agent's [`GenerationHandle`] for its lifetime. It
//! invokes the completion provider (streaming when requested and supported),
//! surfaces partial output on the handle and the event bus, and checks the
//! handle's cancellation token at every streamed increment.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use conclave_observe::genai_attrs::{
    GEN_AI_AGENT_ID, GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MAX_TOKENS, GEN_AI_REQUEST_MODEL,
    GEN_AI_REQUEST_STREAM, GEN_AI_REQUEST_TEMPERATURE, GEN_AI_REQUEST_TOOLS, GEN_AI_SYSTEM, OP_CHAT,
};
use conclave_types::event::RoundTableEvent;
use conclave_types::llm::{CompletionRequest, LlmError, StopReason, StreamEvent, Usage};
use conclave_types::message::MediaAttachment;
use conclave_types::tool::ToolCall;

use crate::event::EventBus;
use crate::llm::box_provider::BoxLlmProvider;

/// Partial output of an in-flight generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutput {
    pub text: String,
    pub reasoning: String,
}

/// Live handle on one agent's in-flight generation.
///
/// Cloning shares the cancellation token and the partial-output channel.
#[derive(Debug, Clone)]
pub struct GenerationHandle {
    pub agent_id: Uuid,
    /// The timeline message being answered.
    pub message_id: Uuid,
    cancellation: CancellationToken,
    partial: Arc<watch::Sender<PartialOutput>>,
}

impl GenerationHandle {
    pub fn new(agent_id: Uuid, message_id: Uuid) -> Self {
        let (partial, _) = watch::channel(PartialOutput::default());
        Self {
            agent_id,
            message_id,
            cancellation: CancellationToken::new(),
            partial: Arc::new(partial),
        }
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Snapshot of the partial text and reasoning received so far.
    pub fn partial(&self) -> PartialOutput {
        self.partial.borrow().clone()
    }

    /// Watch partial output as it streams in.
    pub fn subscribe(&self) -> watch::Receiver<PartialOutput> {
        self.partial.subscribe()
    }

    fn reset(&self) {
        self.partial.send_replace(PartialOutput::default());
    }

    fn push_text(&self, delta: &str) {
        self.partial.send_modify(|p| p.text.push_str(delta));
    }

    fn push_reasoning(&self, delta: &str) {
        self.partial.send_modify(|p| p.reasoning.push_str(delta));
    }
}

/// Final output of a completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub text: String,
    pub reasoning: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: StopReason,
    pub usage: Usage,
}

/// How a generation session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed(GenerationResult),
    /// Cancelled before completion; there is no result to append.
    Cancelled,
}

/// Errors that end a generation session without a result.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("completion provider failed: {0}")]
    Provider(#[from] LlmError),

    #[error("no completion provider for model '{0}'")]
    NoProvider(String),
}

/// Single-use generation bound to one agent and one mailbox entry.
pub struct GenerationSession<'a> {
    provider: &'a BoxLlmProvider,
    handle: &'a GenerationHandle,
    events: &'a EventBus,
}

impl<'a> GenerationSession<'a> {
    pub fn new(provider: &'a BoxLlmProvider, handle: &'a GenerationHandle, events: &'a EventBus) -> Self {
        Self {
            provider,
            handle,
            events,
        }
    }

    /// Run the completion and return its outcome.
    ///
    /// Streams when the request asks for it and the provider supports it;
    /// otherwise a single-shot completion is raced against cancellation.
    pub async fn run(&self, request: CompletionRequest) -> Result<GenerationOutcome, GenerationError> {
        let streaming = request.stream && self.provider.capabilities().streaming;
        let span = info_span!(
            "gen_ai.generate",
            { GEN_AI_OPERATION_NAME } = OP_CHAT,
            { GEN_AI_SYSTEM } = self.provider.name(),
            { GEN_AI_REQUEST_MODEL } = %request.model,
            { GEN_AI_REQUEST_MAX_TOKENS } = request.max_tokens,
            { GEN_AI_REQUEST_TEMPERATURE } = ?request.temperature,
            { GEN_AI_REQUEST_STREAM } = streaming,
            { GEN_AI_AGENT_ID } = %self.handle.agent_id,
            { GEN_AI_REQUEST_TOOLS } = request.tools.len(),
        );

        self.handle.reset();
        let started = Instant::now();
        let outcome = if streaming {
            self.run_streaming(request).instrument(span.clone()).await?
        } else {
            self.run_single_shot(request).instrument(span.clone()).await?
        };

        span.in_scope(|| {
            debug!(
                agent_id = %self.handle.agent_id,
                cancelled = matches!(outcome, GenerationOutcome::Cancelled),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "generation finished"
            );
        });
        Ok(outcome)
    }

    async fn run_single_shot(&self, request: CompletionRequest) -> Result<GenerationOutcome, GenerationError> {
        let token = self.handle.cancellation_token();
        if token.is_cancelled() {
            return Ok(GenerationOutcome::Cancelled);
        }

        let response = tokio::select! {
            _ = token.cancelled() => return Ok(GenerationOutcome::Cancelled),
            result = self.provider.complete(&request) => result?,
        };

        self.handle.push_text(&response.content);
        if let Some(reasoning) = &response.reasoning {
            self.handle.push_reasoning(reasoning);
        }

        Ok(GenerationOutcome::Completed(GenerationResult {
            text: response.content,
            reasoning: response.reasoning.filter(|r| !r.is_empty()),
            media: response.media,
            tool_calls: response.tool_calls,
            finish_reason: response.stop_reason,
            usage: response.usage,
        }))
    }

    async fn run_streaming(&self, request: CompletionRequest) -> Result<GenerationOutcome, GenerationError> {
        let agent_id = self.handle.agent_id;
        let token = self.handle.cancellation_token();
        if token.is_cancelled() {
            return Ok(GenerationOutcome::Cancelled);
        }

        let mut stream = self.provider.stream(request);
        let mut text = String::new();
        let mut reasoning = String::new();
        let mut media = Vec::new();
        let mut tool_calls = Vec::new();
        let mut finish_reason = StopReason::EndTurn;
        let mut usage = Usage::default();

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return Ok(GenerationOutcome::Cancelled),
                next = stream.next() => next,
            };
            let Some(event) = next else { break };

            // Checked per increment; a cancelled session never completes.
            if token.is_cancelled() {
                return Ok(GenerationOutcome::Cancelled);
            }

            match event? {
                StreamEvent::TextDelta { text: delta } => {
                    text.push_str(&delta);
                    self.handle.push_text(&delta);
                    self.events.publish(RoundTableEvent::GenerationDelta { agent_id, text: delta });
                }
                StreamEvent::ThinkingDelta { thinking } => {
                    reasoning.push_str(&thinking);
                    self.handle.push_reasoning(&thinking);
                    self.events.publish(RoundTableEvent::ReasoningDelta {
                        agent_id,
                        reasoning: thinking,
                    });
                }
                StreamEvent::ToolUseComplete { id, name, input } => {
                    tool_calls.push(ToolCall { id, name, input });
                }
                StreamEvent::Media(attachment) => media.push(attachment),
                StreamEvent::MessageDelta { stop_reason } => finish_reason = stop_reason,
                StreamEvent::Usage(u) => usage = u,
                StreamEvent::Done => break,
                StreamEvent::Connected => {}
            }
        }

        Ok(GenerationOutcome::Completed(GenerationResult {
            text,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            media,
            tool_calls,
            finish_reason,
            usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProvider, FakeReply};
    use conclave_types::llm::ChatMessage;
    use std::time::Duration;

    fn request(stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: "model-a".to_string(),
            messages: vec![ChatMessage::user("[you]: hello")],
            system: Some("<persona>test</persona>".to_string()),
            max_tokens: 64,
            temperature: Some(0.7),
            stream,
            tools: vec![],
            media_output_path: None,
        }
    }

    #[tokio::test]
    async fn single_shot_completes_with_text() {
        let provider = BoxLlmProvider::new(FakeProvider::with_replies(vec!["Hello there"]));
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);

        let outcome = GenerationSession::new(&provider, &handle, &bus)
            .run(request(false))
            .await
            .unwrap();
        match outcome {
            GenerationOutcome::Completed(result) => {
                assert_eq!(result.text, "Hello there");
                assert_eq!(result.finish_reason, StopReason::EndTurn);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(handle.partial().text, "Hello there");
    }

    #[tokio::test]
    async fn streaming_publishes_deltas_and_partials() {
        let provider = BoxLlmProvider::new(FakeProvider::with_script(vec![FakeReply::Stream(vec![
            StreamEvent::Connected,
            StreamEvent::ThinkingDelta {
                thinking: "hmm".to_string(),
            },
            StreamEvent::TextDelta {
                text: "Hel".to_string(),
            },
            StreamEvent::TextDelta {
                text: "lo".to_string(),
            },
            StreamEvent::MessageDelta {
                stop_reason: StopReason::MaxTokens,
            },
            StreamEvent::Done,
        ])]));
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let outcome = GenerationSession::new(&provider, &handle, &bus)
            .run(request(true))
            .await
            .unwrap();
        let GenerationOutcome::Completed(result) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.text, "Hello");
        assert_eq!(result.reasoning.as_deref(), Some("hmm"));
        assert_eq!(result.finish_reason, StopReason::MaxTokens);
        assert_eq!(
            handle.partial(),
            PartialOutput {
                text: "Hello".to_string(),
                reasoning: "hmm".to_string(),
            }
        );

        assert!(matches!(rx.try_recv().unwrap(), RoundTableEvent::ReasoningDelta { .. }));
        assert!(matches!(rx.try_recv().unwrap(), RoundTableEvent::GenerationDelta { .. }));
        assert!(matches!(rx.try_recv().unwrap(), RoundTableEvent::GenerationDelta { .. }));
    }

    #[tokio::test]
    async fn stream_request_falls_back_when_provider_cannot_stream() {
        let provider = BoxLlmProvider::new(
            FakeProvider::with_replies(vec!["plain"]).without_streaming(),
        );
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let outcome = GenerationSession::new(&provider, &handle, &bus)
            .run(request(true))
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Completed(ref r) if r.text == "plain"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_during_stream_yields_cancelled() {
        let provider = BoxLlmProvider::new(FakeProvider::with_script(vec![FakeReply::Hang]));
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);

        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = GenerationSession::new(&provider, &handle, &bus)
            .run(request(true))
            .await
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn cancel_during_single_shot_yields_cancelled() {
        let provider = BoxLlmProvider::new(FakeProvider::with_script(vec![FakeReply::Hang]));
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);
        handle.cancel();

        let outcome = GenerationSession::new(&provider, &handle, &bus)
            .run(request(false))
            .await
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn provider_failure_is_an_error() {
        let provider = BoxLlmProvider::new(FakeProvider::with_script(vec![FakeReply::Fail(
            "overloaded".to_string(),
        )]));
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let bus = EventBus::new(16);

        let result = GenerationSession::new(&provider, &handle, &bus)
            .run(request(true))
            .await;
        assert!(matches!(result, Err(GenerationError::Provider(_))));
    }

    #[tokio::test]
    async fn subscriber_sees_partial_updates() {
        let handle = GenerationHandle::new(Uuid::now_v7(), Uuid::now_v7());
        let mut rx = handle.subscribe();
        handle.push_text("par");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().text, "par");
    }
}

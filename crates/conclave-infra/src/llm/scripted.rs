//! Scripted completion provider.
//!
//! Replays a fixed list of replies, one per request, streaming each reply
//! word by word when asked to. Used by `conclave simulate` to drive a round
//! table without a network backend. Once the script is exhausted the
//! provider answers with the silence marker, so a simulated conversation
//! always winds down.
//!
//! Summary requests never consume a scripted reply; they are answered with
//! a short digest of the conversation they carry.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use conclave_core::agent::markers::SILENT_MARKER;
use conclave_core::agent::summarizer::SUMMARY_REQUEST_PREFIX;
use conclave_core::llm::estimator::{CharEstimator, TokenEstimator};
use conclave_core::llm::provider::{CompletionStream, LlmProvider};
use conclave_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};

/// Completion provider backed by a reply script.
pub struct ScriptedProvider {
    name: String,
    capabilities: ProviderCapabilities,
    script: Mutex<VecDeque<String>>,
    chunk_delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, replies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: ProviderCapabilities::default(),
            script: Mutex::new(replies.into()),
            chunk_delay: None,
        }
    }

    /// Override the model context limit reported in the capabilities.
    pub fn with_context_limit(mut self, tokens: u32) -> Self {
        self.capabilities.max_context_tokens = tokens;
        self
    }

    pub fn without_streaming(mut self) -> Self {
        self.capabilities.streaming = false;
        self
    }

    /// Pause between streamed chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Number of scripted replies not yet used.
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock poisoned").len()
    }

    fn next_reply(&self, request: &CompletionRequest) -> String {
        if let Some(conversation) = summary_conversation(request) {
            return digest(conversation);
        }
        self.script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| SILENT_MARKER.to_string())
    }
}

/// Conversation text of a summary request, if `request` is one.
fn summary_conversation(request: &CompletionRequest) -> Option<&str> {
    request
        .messages
        .first()
        .and_then(|m| m.content.strip_prefix(SUMMARY_REQUEST_PREFIX))
}

/// One bullet per speaker line, cut to the opening words.
fn digest(conversation: &str) -> String {
    conversation
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('['))
        .map(|line| {
            let words: Vec<&str> = line.split_whitespace().take(8).collect();
            format!("- {}", words.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn usage(request: &CompletionRequest, reply: &str) -> Usage {
    let input_tokens = request
        .messages
        .iter()
        .map(|m| CharEstimator.estimate(&m.content))
        .sum::<u32>()
        + request
            .system
            .as_deref()
            .map_or(0, |s| CharEstimator.estimate(s));
    Usage {
        input_tokens,
        output_tokens: CharEstimator.estimate(reply),
    }
}

/// Split a reply into stream chunks that concatenate back to the reply.
fn chunks(reply: &str) -> Vec<String> {
    reply.split_inclusive(' ').map(str::to_string).collect()
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let reply = self.next_reply(request);
        tracing::debug!(provider = %self.name, model = %request.model, "scripted completion");
        Ok(CompletionResponse {
            id: Uuid::now_v7().to_string(),
            usage: usage(request, &reply),
            content: reply,
            reasoning: None,
            media: vec![],
            tool_calls: vec![],
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
        })
    }

    fn stream(&self, request: CompletionRequest) -> CompletionStream {
        let reply = self.next_reply(&request);
        let usage = usage(&request, &reply);
        let delay = self.chunk_delay;

        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            for chunk in chunks(&reply) {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(StreamEvent::TextDelta { text: chunk });
            }
            yield Ok(StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn,
            });
            yield Ok(StreamEvent::Usage(usage));
            yield Ok(StreamEvent::Done);
        })
    }
}

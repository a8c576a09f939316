//! Shared conversation summarizer.
//!
//! When the timeline approaches the history budget of the agent about to
//! speak, that agent's provider condenses older entries into a short
//! bullet summary. The summary becomes entry zero of every later context
//! window for every agent.

use tracing::{Instrument, info_span};

use conclave_observe::genai_attrs::{GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MODEL, OP_SUMMARIZE_CONTEXT};
use conclave_types::config::ContextConfig;
use conclave_types::llm::{ChatMessage, CompletionRequest, LlmError};
use conclave_types::message::Message;

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::token_budget::TokenBudget;

use super::context::with_sender_prefix;

/// A summary of the older part of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub text: String,
    /// Sequence number of the newest message the summary covers.
    pub covered_through: u64,
    pub covered_messages: usize,
}

/// Scheduler-side summary state shared by all agents of a round table.
#[derive(Debug, Clone, Default)]
pub struct SummaryState {
    pub summary: Option<ConversationSummary>,
    pub in_flight: bool,
}

impl SummaryState {
    /// Whether summarization should run before the next generation.
    ///
    /// Fires only when the timeline is longer than the configured minimum,
    /// estimated usage is above the summarize ratio of the threshold, and no
    /// summary exists or is being produced.
    pub fn should_summarize(
        &self,
        timeline_len: usize,
        timeline_tokens: u32,
        budget: &TokenBudget,
        config: &ContextConfig,
    ) -> bool {
        timeline_len > config.summarize_min_messages
            && budget.should_summarize(timeline_tokens)
            && self.summary.is_none()
            && !self.in_flight
    }
}

/// Opening of the user turn of every summary request.
pub const SUMMARY_REQUEST_PREFIX: &str = "Please summarize this conversation:";

fn summary_system_prompt(max_words: usize) -> String {
    format!(
        "Summarize the following round-table conversation as concise bullet points. Preserve:\n\
        1. Decisions and conclusions, and who reached them\n\
        2. Open questions and who they are addressed to\n\
        3. The user's goals\n\n\
        Use at most {max_words} words. Refer to participants by name."
    )
}

/// Stateless utility for summarizing the shared timeline.
pub struct ContextSummarizer;

impl ContextSummarizer {
    /// Summarize timeline messages into a bullet list.
    pub async fn summarize(
        provider: &BoxLlmProvider,
        messages: &[Message],
        model: &str,
        max_words: usize,
    ) -> Result<String, LlmError> {
        if messages.is_empty() {
            return Ok(String::new());
        }
        let span = info_span!(
            "summarize_context",
            { GEN_AI_OPERATION_NAME } = OP_SUMMARIZE_CONTEXT,
            { GEN_AI_REQUEST_MODEL } = %model,
            message_count = messages.len(),
        );
        Self::request_summary(provider, messages, model, max_words)
            .instrument(span)
            .await
    }

    async fn request_summary(
        provider: &BoxLlmProvider,
        messages: &[Message],
        model: &str,
        max_words: usize,
    ) -> Result<String, LlmError> {
        let conversation_text: String = messages
            .iter()
            .map(with_sender_prefix)
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(format!(
                "{SUMMARY_REQUEST_PREFIX}\n\n<conversation>\n{conversation_text}\n</conversation>"
            ))],
            system: Some(summary_system_prompt(max_words)),
            max_tokens: (max_words as u32).saturating_mul(2).max(64),
            temperature: Some(0.0),
            stream: false,
            tools: Vec::new(),
            media_output_path: None,
        };

        let response = provider.complete(&request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(LlmError::Provider {
                message: "summary response was empty".to_string(),
            });
        }
        Ok(truncate_words(text, max_words))
    }

    /// Split items into `(to_summarize, to_keep)` where `to_keep` holds the
    /// most recent `keep_recent` items.
    pub fn select_messages_to_summarize<T>(items: &[T], keep_recent: usize) -> (&[T], &[T]) {
        if items.len() <= keep_recent {
            (&[], items)
        } else {
            items.split_at(items.len() - keep_recent)
        }
    }
}

/// Cut `text` to at most `max_words` whitespace-separated words, keeping
/// line breaks between bullets.
fn truncate_words(text: &str, max_words: usize) -> String {
    let mut remaining = max_words;
    let mut lines = Vec::new();
    for line in text.lines() {
        if remaining == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let take = words.len().min(remaining);
        remaining -= take;
        lines.push(words[..take].join(" "));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeProvider;
    use uuid::Uuid;

    fn messages(n: usize) -> Vec<Message> {
        let table = Uuid::now_v7();
        (0..n)
            .map(|i| Message::user(table, "you", format!("message {i}"), vec![]))
            .collect()
    }

    #[test]
    fn select_keeps_most_recent() {
        let msgs = messages(5);
        let (old, recent) = ContextSummarizer::select_messages_to_summarize(&msgs, 3);
        assert_eq!(old.len(), 2);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "message 2");
    }

    #[test]
    fn select_with_fewer_than_keep_summarizes_nothing() {
        let msgs = messages(2);
        let (old, recent) = ContextSummarizer::select_messages_to_summarize(&msgs, 3);
        assert!(old.is_empty());
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn truncate_words_limits_total_words() {
        let text = "- one two three\n- four five\n- six";
        assert_eq!(truncate_words(text, 4), "- one two three");
        assert_eq!(truncate_words(text, 5), "- one two three\n-");
        assert_eq!(truncate_words(text, 100), text);
    }

    #[test]
    fn should_summarize_requires_every_condition() {
        let config = ContextConfig::default();
        let budget = TokenBudget::new(1_000, &config); // threshold 700, trigger > 595
        let state = SummaryState::default();

        assert!(state.should_summarize(11, 600, &budget, &config));
        assert!(!state.should_summarize(10, 600, &budget, &config));
        assert!(!state.should_summarize(11, 595, &budget, &config));

        let in_flight = SummaryState {
            summary: None,
            in_flight: true,
        };
        assert!(!in_flight.should_summarize(11, 600, &budget, &config));

        let done = SummaryState {
            summary: Some(ConversationSummary {
                text: "- x".to_string(),
                covered_through: 3,
                covered_messages: 3,
            }),
            in_flight: false,
        };
        assert!(!done.should_summarize(11, 600, &budget, &config));
    }

    #[tokio::test]
    async fn summarize_sends_prefixed_conversation() {
        let provider = FakeProvider::with_replies(vec!["- Ada proposed tests\n- Grace agreed"]);
        let recorded = provider.requests();
        let boxed = BoxLlmProvider::new(provider);

        let msgs = messages(3);
        let summary = ContextSummarizer::summarize(&boxed, &msgs, "model-a", 200)
            .await
            .unwrap();
        assert_eq!(summary, "- Ada proposed tests\n- Grace agreed");

        let requests = recorded.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].content.contains("[you]: message 0"));
        assert!(requests[0].system.as_deref().unwrap().contains("200 words"));
        assert!(!requests[0].stream);
    }

    #[tokio::test]
    async fn summarize_empty_input_skips_provider() {
        let provider = FakeProvider::with_replies(vec![]);
        let recorded = provider.requests();
        let boxed = BoxLlmProvider::new(provider);

        let summary = ContextSummarizer::summarize(&boxed, &[], "model-a", 200)
            .await
            .unwrap();
        assert!(summary.is_empty());
        assert!(recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        let boxed = BoxLlmProvider::new(FakeProvider::with_replies(vec!["   "]));
        let result = ContextSummarizer::summarize(&boxed, &messages(2), "m", 200).await;
        assert!(matches!(result, Err(LlmError::Provider { .. })));
    }
}

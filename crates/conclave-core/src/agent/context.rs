//! Per-agent context window assembly.
//!
//! Every agent sees the same shared timeline, but from its own point of
//! view: its own messages are assistant turns, everyone else's are user
//! turns prefixed with the sender's name. The window is bounded by the
//! model's history [`TokenBudget`] and walks the timeline newest to oldest.

use uuid::Uuid;

use conclave_types::llm::{ChatMessage, MessageRole};
use conclave_types::message::{Message, SenderKind};

use crate::llm::estimator::TokenEstimator;
use crate::llm::token_budget::TokenBudget;

use super::summarizer::ConversationSummary;

/// The history handed to one generation.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Chronological turns; the summary (if any) is entry zero.
    pub messages: Vec<ChatMessage>,
    /// Timeline message ids included, in chronological order.
    pub included: Vec<Uuid>,
    pub summary_included: bool,
    /// Estimated tokens of everything in `messages`.
    pub estimated_tokens: u32,
    pub threshold: u32,
}

/// Builds [`ContextWindow`]s for one model budget.
pub struct ContextWindowBuilder<'a> {
    estimator: &'a dyn TokenEstimator,
    budget: TokenBudget,
}

impl<'a> ContextWindowBuilder<'a> {
    pub fn new(estimator: &'a dyn TokenEstimator, budget: TokenBudget) -> Self {
        Self { estimator, budget }
    }

    /// Build the window for `viewer`.
    ///
    /// The summary cost is reserved first. Messages already covered by the
    /// summary are skipped, as is `exclude` (the message being answered,
    /// which is sent as the final turn instead). The walk stops at the
    /// first message that would exceed the remaining threshold.
    pub fn build(
        &self,
        timeline: &[Message],
        viewer: &Uuid,
        summary: Option<&ConversationSummary>,
        exclude: Option<&Uuid>,
    ) -> ContextWindow {
        let threshold = self.budget.threshold;
        let mut used: u32 = 0;

        let summary_entry = summary.and_then(|s| {
            let entry = summary_message(&s.text);
            let cost = self.estimator.estimate(&entry.content);
            (cost <= threshold).then(|| {
                used = cost;
                entry
            })
        });
        let covered_through = summary_entry
            .as_ref()
            .and(summary)
            .map(|s| s.covered_through);

        let mut picked: Vec<&Message> = Vec::new();
        for message in timeline.iter().rev() {
            if exclude == Some(&message.id) {
                continue;
            }
            if covered_through.is_some_and(|seq| message.sequence <= seq) {
                break;
            }
            let cost = self.estimator.estimate_message(message);
            if used.saturating_add(cost) > threshold {
                break;
            }
            used += cost;
            picked.push(message);
        }
        picked.reverse();

        let summary_included = summary_entry.is_some();
        let mut messages = Vec::with_capacity(picked.len() + 1);
        messages.extend(summary_entry);
        messages.extend(picked.iter().map(|m| render_for(m, viewer)));

        ContextWindow {
            messages,
            included: picked.iter().map(|m| m.id).collect(),
            summary_included,
            estimated_tokens: used,
            threshold,
        }
    }

    /// Estimated cost of the entire timeline, ignoring the threshold.
    pub fn timeline_usage(&self, timeline: &[Message]) -> u32 {
        timeline
            .iter()
            .map(|m| self.estimator.estimate_message(m))
            .fold(0u32, u32::saturating_add)
    }
}

fn summary_message(text: &str) -> ChatMessage {
    ChatMessage::system(format!(
        "<conversation_summary>\n{}\n</conversation_summary>",
        text.trim()
    ))
}

/// Render one timeline message from `viewer`'s point of view.
pub fn render_for(message: &Message, viewer: &Uuid) -> ChatMessage {
    let mut chat = if message.is_authored_by(viewer) {
        ChatMessage::new(MessageRole::Assistant, message.text.clone())
    } else {
        ChatMessage::new(MessageRole::User, with_sender_prefix(message))
    };
    chat.media = message.media.clone();
    chat
}

/// `[Name]: text`, with system notices labelled as such.
pub fn with_sender_prefix(message: &Message) -> String {
    match message.sender_kind {
        SenderKind::System => format!("[notice]: {}", message.text),
        _ => format!("[{}]: {}", message.sender_name, message.text),
    }
}

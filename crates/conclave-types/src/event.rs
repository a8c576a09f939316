//! Event types for the Conclave round-table event bus.
//!
//! `RoundTableEvent` is the unified event type broadcast while a round table
//! runs. All variants are Clone + Send + Sync for use with tokio broadcast
//! channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, TurnMode};

/// Why a mailbox entry was dropped without a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The agent reached its reply limit for the current turn.
    BudgetExhausted,
    /// The agent left the round table.
    ParticipantRemoved,
    /// The round table was closed.
    Closed,
}

/// Events emitted by a running round table.
///
/// Used by the event bus to communicate timeline appends, generation
/// progress, and scheduling decisions to subscribers (UI, logging).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundTableEvent {
    /// A message was appended to the timeline.
    MessageAppended {
        round_table_id: Uuid,
        message: Box<Message>,
    },

    /// An agent started generating a reply.
    GenerationStarted {
        agent_id: Uuid,
        message_id: Uuid,
        turn_mode: TurnMode,
    },

    /// A streaming text increment.
    GenerationDelta { agent_id: Uuid, text: String },

    /// A streaming reasoning increment.
    ReasoningDelta { agent_id: Uuid, reasoning: String },

    /// A generation finished and produced a visible reply.
    GenerationCompleted {
        agent_id: Uuid,
        message_id: Uuid,
        duration_ms: u64,
    },

    /// The agent chose not to reply.
    AgentSilent { agent_id: Uuid, message_id: Uuid },

    /// An in-flight generation was cancelled.
    GenerationCancelled { agent_id: Uuid, message_id: Uuid },

    /// The completion provider failed; nothing was appended.
    GenerationFailed {
        agent_id: Uuid,
        message_id: Uuid,
        error: String,
    },

    /// A mailbox entry was discarded without running a generation.
    EntryDropped {
        agent_id: Uuid,
        message_id: Uuid,
        reason: DropReason,
    },

    /// A conversation summary became available.
    SummaryCreated {
        round_table_id: Uuid,
        agent_id: Uuid,
        covered_messages: usize,
    },

    /// Extra tools were bound for a second generation phase.
    ToolsBound {
        agent_id: Uuid,
        providers: Vec<String>,
        tools: Vec<String>,
    },

    /// A tool provider could not be connected.
    ToolConnectionFailed {
        agent_id: Uuid,
        provider: String,
        error: String,
    },

    /// A response candidate was selected for a message.
    ResponseSelected {
        message_id: Uuid,
        response_id: Uuid,
    },

    /// A participant joined the round table.
    ParticipantAdded { agent_id: Uuid, display_name: String },

    /// A participant left the round table.
    ParticipantRemoved { agent_id: Uuid },

    /// The turn mode changed.
    TurnModeChanged { turn_mode: TurnMode },

    /// The round table was closed.
    RoundTableClosed { round_table_id: Uuid },

    /// Writing to the external repository failed.
    PersistenceFailed { operation: String, error: String },
}

impl RoundTableEvent {
    /// Returns the agent id for agent-scoped events.
    pub fn agent_id(&self) -> Option<Uuid> {
        match self {
            RoundTableEvent::GenerationStarted { agent_id, .. }
            | RoundTableEvent::GenerationDelta { agent_id, .. }
            | RoundTableEvent::ReasoningDelta { agent_id, .. }
            | RoundTableEvent::GenerationCompleted { agent_id, .. }
            | RoundTableEvent::AgentSilent { agent_id, .. }
            | RoundTableEvent::GenerationCancelled { agent_id, .. }
            | RoundTableEvent::GenerationFailed { agent_id, .. }
            | RoundTableEvent::EntryDropped { agent_id, .. }
            | RoundTableEvent::SummaryCreated { agent_id, .. }
            | RoundTableEvent::ToolsBound { agent_id, .. }
            | RoundTableEvent::ToolConnectionFailed { agent_id, .. }
            | RoundTableEvent::ParticipantAdded { agent_id, .. }
            | RoundTableEvent::ParticipantRemoved { agent_id } => Some(*agent_id),
            RoundTableEvent::MessageAppended { message, .. } => message.sender_agent_id,
            RoundTableEvent::ResponseSelected { .. }
            | RoundTableEvent::TurnModeChanged { .. }
            | RoundTableEvent::RoundTableClosed { .. }
            | RoundTableEvent::PersistenceFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tag() {
        let event = RoundTableEvent::EntryDropped {
            agent_id: Uuid::nil(),
            message_id: Uuid::nil(),
            reason: DropReason::BudgetExhausted,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"entry_dropped\""));
        assert!(json.contains("\"reason\":\"budget_exhausted\""));
        let parsed: RoundTableEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, RoundTableEvent::EntryDropped { .. }));
    }

    #[test]
    fn test_agent_id_for_message_appended_uses_sender() {
        let author = Uuid::now_v7();
        let table = Uuid::now_v7();
        let agent_msg = Message::agent(table, author, "Ada", "hi", vec![]);
        let event = RoundTableEvent::MessageAppended {
            round_table_id: table,
            message: Box::new(agent_msg),
        };
        assert_eq!(event.agent_id(), Some(author));

        let user_msg = Message::user(table, "you", "hi", vec![]);
        let event = RoundTableEvent::MessageAppended {
            round_table_id: table,
            message: Box::new(user_msg),
        };
        assert_eq!(event.agent_id(), None);
    }

    #[test]
    fn test_agent_id_none_for_table_scoped_events() {
        let events = vec![
            RoundTableEvent::TurnModeChanged {
                turn_mode: TurnMode::Goal,
            },
            RoundTableEvent::RoundTableClosed {
                round_table_id: Uuid::nil(),
            },
            RoundTableEvent::PersistenceFailed {
                operation: "append_message".to_string(),
                error: "disk full".to_string(),
            },
        ];
        for event in events {
            assert_eq!(event.agent_id(), None, "expected None for {event:?}");
        }
    }
}

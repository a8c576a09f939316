//! Terminal rendering of a round-table run.
//!
//! `EventTally` folds the event stream into per-participant counters;
//! the `render_*` functions turn the final timeline and the tally into
//! comfy-table tables.

use std::collections::HashMap;

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;
use uuid::Uuid;

use conclave_types::event::RoundTableEvent;
use conclave_types::message::{Message, SenderKind};
use conclave_types::roundtable::Participant;

/// Longest message preview shown in a table cell.
const PREVIEW_CHARS: usize = 120;

/// What one participant did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantStats {
    pub replies: u32,
    pub silent: u32,
    pub dropped: u32,
    pub failed: u32,
    pub cancelled: u32,
}

/// Running counters built from `RoundTableEvent`s.
#[derive(Debug, Default, Serialize)]
pub struct EventTally {
    pub participants: HashMap<Uuid, ParticipantStats>,
    pub summaries: u32,
    pub tools_bound: Vec<String>,
    pub persistence_failures: u32,
}

impl EventTally {
    pub fn record(&mut self, event: &RoundTableEvent) {
        match event {
            RoundTableEvent::MessageAppended { message, .. } => {
                if let Some(author) = message.sender_agent_id {
                    self.stats(author).replies += 1;
                }
            }
            RoundTableEvent::AgentSilent { agent_id, .. } => self.stats(*agent_id).silent += 1,
            RoundTableEvent::EntryDropped { agent_id, .. } => self.stats(*agent_id).dropped += 1,
            RoundTableEvent::GenerationFailed { agent_id, .. } => {
                self.stats(*agent_id).failed += 1
            }
            RoundTableEvent::GenerationCancelled { agent_id, .. } => {
                self.stats(*agent_id).cancelled += 1
            }
            RoundTableEvent::SummaryCreated { .. } => self.summaries += 1,
            RoundTableEvent::ToolsBound { tools, .. } => {
                for tool in tools {
                    if !self.tools_bound.contains(tool) {
                        self.tools_bound.push(tool.clone());
                    }
                }
            }
            RoundTableEvent::PersistenceFailed { .. } => self.persistence_failures += 1,
            _ => {}
        }
    }

    pub fn get(&self, agent_id: &Uuid) -> ParticipantStats {
        self.participants.get(agent_id).cloned().unwrap_or_default()
    }

    fn stats(&mut self, agent_id: Uuid) -> &mut ParticipantStats {
        self.participants.entry(agent_id).or_default()
    }
}

/// One-line form of an event for live output, or `None` for events that
/// are not worth a line.
pub fn describe_event(event: &RoundTableEvent, roster: &[Participant]) -> Option<String> {
    let name = |id: &Uuid| {
        roster
            .iter()
            .find(|p| &p.agent_id == id)
            .map_or_else(|| id.to_string(), |p| p.display_name.clone())
    };
    let line = match event {
        RoundTableEvent::MessageAppended { message, .. } => format!(
            "{} {}",
            style(format!("{}:", message.sender_name)).cyan().bold(),
            message.text
        ),
        RoundTableEvent::GenerationStarted { agent_id, .. } => {
            format!("{}", style(format!("{} is thinking...", name(agent_id))).dim())
        }
        RoundTableEvent::AgentSilent { agent_id, .. } => {
            format!("{}", style(format!("{} stays silent", name(agent_id))).dim())
        }
        RoundTableEvent::EntryDropped {
            agent_id, reason, ..
        } => format!(
            "{}",
            style(format!("{} skipped ({reason:?})", name(agent_id))).yellow()
        ),
        RoundTableEvent::GenerationFailed {
            agent_id, error, ..
        } => format!("{}", style(format!("{} failed: {error}", name(agent_id))).red()),
        RoundTableEvent::SummaryCreated {
            covered_messages, ..
        } => format!(
            "{}",
            style(format!("summarized {covered_messages} earlier messages")).blue()
        ),
        RoundTableEvent::ToolsBound {
            agent_id, tools, ..
        } => format!(
            "{}",
            style(format!("{} bound tools: {}", name(agent_id), tools.join(", "))).blue()
        ),
        RoundTableEvent::ToolConnectionFailed {
            agent_id,
            provider,
            error,
        } => format!(
            "{}",
            style(format!("{} could not reach {provider}: {error}", name(agent_id))).yellow()
        ),
        RoundTableEvent::PersistenceFailed { operation, error } => {
            format!("{}", style(format!("{operation} not persisted: {error}")).red())
        }
        _ => return None,
    };
    Some(line)
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// The timeline in sequence order.
pub fn render_timeline(messages: &[Message], roster: &[Participant]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("To").fg(Color::White),
        Cell::new("Message").fg(Color::White),
    ]);

    for message in messages {
        let from_color = match message.sender_kind {
            SenderKind::User => Color::Green,
            SenderKind::Agent => Color::Cyan,
            SenderKind::System => Color::DarkGrey,
        };
        let to = if message.mentions.is_empty() {
            "everyone".to_string()
        } else {
            message
                .mentions
                .iter()
                .filter_map(|id| roster.iter().find(|p| &p.agent_id == id))
                .map(|p| p.display_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut from = message.sender_name.clone();
        if message.raised_hand {
            from.push_str(" (raised hand)");
        }

        table.add_row(vec![
            Cell::new(message.sequence),
            Cell::new(from).fg(from_color),
            Cell::new(to).fg(Color::DarkGrey),
            Cell::new(preview(&message.text)),
        ]);
    }
    table
}

/// One row per participant with its counters.
pub fn render_participants(roster: &[Participant], tally: &EventTally) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Participant").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Replies").fg(Color::White),
        Cell::new("Silent").fg(Color::White),
        Cell::new("Skipped").fg(Color::White),
        Cell::new("Failed").fg(Color::White),
    ]);

    for participant in roster {
        let stats = tally.get(&participant.agent_id);
        let failed = if stats.failed > 0 {
            Cell::new(stats.failed).fg(Color::Red)
        } else {
            Cell::new(stats.failed)
        };
        table.add_row(vec![
            Cell::new(&participant.display_name).fg(Color::Cyan),
            Cell::new(participant.effective_model()).fg(Color::DarkGrey),
            Cell::new(stats.replies),
            Cell::new(stats.silent),
            Cell::new(stats.dropped),
            failed,
        ]);
    }
    table
}

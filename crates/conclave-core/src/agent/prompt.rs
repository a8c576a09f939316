//! Framing preamble builder for round-table agents.
//!
//! Assembles the system prompt for one agent's generation from its persona,
//! the round-table roster, and the reply conventions, using XML tag
//! boundaries for clear section delineation.

use conclave_types::message::TurnMode;
use conclave_types::roundtable::{Participant, RoundTable};
use conclave_types::tool::ToolProviderInfo;

use super::markers::{RAISE_HAND_MARKER, SILENT_MARKER};

/// Builds the framing preamble for one agent.
///
/// Layout:
/// ```text
/// <persona>{effective persona}</persona>
/// <round_table>Name: ... Participants: - Ada (you) - Grace ...</round_table>
/// <decision_rubric>Judge whether you are the right responder...</decision_rubric>
/// <conventions>Silence and raise-hand markers, @mentions</conventions>
/// <tool_requests>Available capabilities and the request syntax</tool_requests>
/// ```
pub struct FramingBuilder<'a> {
    round_table: &'a RoundTable,
    agent: &'a Participant,
    turn_mode: TurnMode,
    tool_providers: &'a [ToolProviderInfo],
}

impl<'a> FramingBuilder<'a> {
    pub fn new(round_table: &'a RoundTable, agent: &'a Participant) -> Self {
        Self {
            round_table,
            agent,
            turn_mode: TurnMode::Broadcast,
            tool_providers: &[],
        }
    }

    pub fn turn_mode(mut self, mode: TurnMode) -> Self {
        self.turn_mode = mode;
        self
    }

    /// Advertise external capabilities the agent may request.
    pub fn tool_providers(mut self, providers: &'a [ToolProviderInfo]) -> Self {
        self.tool_providers = providers;
        self
    }

    pub fn build(&self) -> String {
        let mut sections = Vec::with_capacity(5);

        let persona = self.agent.effective_persona().trim();
        if !persona.is_empty() {
            sections.push(format!("<persona>\n{persona}\n</persona>"));
        }

        sections.push(self.roster_section());
        sections.push(self.rubric_section());
        sections.push(Self::conventions_section());

        if !self.tool_providers.is_empty() {
            sections.push(self.tool_section());
        }

        sections.join("\n\n")
    }

    fn roster_section(&self) -> String {
        let lines: Vec<String> = self
            .round_table
            .roster()
            .iter()
            .map(|p| {
                if p.agent_id == self.agent.agent_id {
                    format!("- {} (you)", p.display_name)
                } else {
                    format!("- {}", p.display_name)
                }
            })
            .collect();
        format!(
            "<round_table>\nName: {}\nYou are {}. Participants:\n{}\n</round_table>",
            self.round_table.name,
            self.agent.display_name,
            lines.join("\n")
        )
    }

    fn rubric_section(&self) -> String {
        let mode_line = match self.turn_mode {
            TurnMode::Broadcast => {
                "This is an open conversation. Keep replies short and only speak when you add something."
            }
            TurnMode::Goal => {
                "The group is working toward a shared goal. Collaborate, hand work to others by mentioning them, and keep moving toward the result."
            }
        };
        format!(
            "<decision_rubric>\n\
            Before replying, decide whether you are the right participant to respond.\n\
            If the message is addressed to someone else, or you have nothing new to add, reply with exactly {SILENT_MARKER}.\n\
            A silent turn is better than a low-value reply.\n\
            {mode_line}\n\
            </decision_rubric>"
        )
    }

    fn conventions_section() -> String {
        format!(
            "<conventions>\n\
            Address a participant by writing @ followed by their name; only mentioned participants will see your reply as addressed to them.\n\
            If you are contributing without being asked, begin your reply with {RAISE_HAND_MARKER}.\n\
            Do not prefix your reply with your own name.\n\
            </conventions>"
        )
    }

    fn tool_section(&self) -> String {
        let lines: Vec<String> = self
            .tool_providers
            .iter()
            .map(|p| {
                if p.description.is_empty() {
                    format!("- {}", p.name)
                } else {
                    format!("- {}: {}", p.name, p.description)
                }
            })
            .collect();
        format!(
            "<tool_requests>\n\
            You can request these external capabilities:\n\
            {}\n\
            To request one, include <tool_request name=\"CAPABILITY\" /> in your reply. \
            You will be asked again with the capability's tools available.\n\
            </tool_requests>",
            lines.join("\n")
        )
    }
}

//! Round table and participant types for Conclave.
//!
//! A `RoundTable` is a session in which several agent participants converse
//! concurrently with a user and with each other. Participants are kept in a
//! stable, ordered roster; agent ids are unique within one round table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::error::RoundTableError;

/// Lifecycle status of a round table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundTableStatus {
    Active,
    Closed,
}

impl fmt::Display for RoundTableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundTableStatus::Active => write!(f, "active"),
            RoundTableStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for RoundTableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RoundTableStatus::Active),
            "closed" => Ok(RoundTableStatus::Closed),
            other => Err(format!("invalid round table status: '{other}'")),
        }
    }
}

impl Default for RoundTableStatus {
    fn default() -> Self {
        RoundTableStatus::Active
    }
}

/// Per-round overrides applied on top of a participant's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Where generated media for this participant should be written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_output_path: Option<String>,
}

/// An agent seated at a round table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub agent_id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Default persona text (the agent's system personality).
    pub persona: String,
    /// Default model reference used to resolve a completion provider.
    pub model: String,
    #[serde(default)]
    pub overrides: ParticipantOverrides,
}

impl Participant {
    /// Create a participant with a fresh UUIDv7 agent id and no overrides.
    pub fn new(
        display_name: impl Into<String>,
        persona: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: Uuid::now_v7(),
            display_name: display_name.into(),
            avatar: None,
            persona: persona.into(),
            model: model.into(),
            overrides: ParticipantOverrides::default(),
        }
    }

    /// Persona in effect for this round (override wins over default).
    pub fn effective_persona(&self) -> &str {
        self.overrides.persona.as_deref().unwrap_or(&self.persona)
    }

    /// Model in effect for this round (override wins over default).
    pub fn effective_model(&self) -> &str {
        self.overrides.model.as_deref().unwrap_or(&self.model)
    }
}

/// A multi-agent conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTable {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub status: RoundTableStatus,
    participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
}

impl RoundTable {
    /// Create an active round table with no participants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            status: RoundTableStatus::Active,
            participants: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Builder-style variant of [`add_participant`](Self::add_participant).
    pub fn with_participant(mut self, participant: Participant) -> Result<Self, RoundTableError> {
        self.add_participant(participant)?;
        Ok(self)
    }

    /// Seat a participant at the end of the roster.
    ///
    /// Rejects an agent id that is already seated.
    pub fn add_participant(&mut self, participant: Participant) -> Result<(), RoundTableError> {
        if self
            .participants
            .iter()
            .any(|p| p.agent_id == participant.agent_id)
        {
            return Err(RoundTableError::DuplicateParticipant(participant.agent_id));
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Remove a participant, returning it.
    pub fn remove_participant(&mut self, agent_id: &Uuid) -> Result<Participant, RoundTableError> {
        let idx = self
            .participants
            .iter()
            .position(|p| &p.agent_id == agent_id)
            .ok_or(RoundTableError::ParticipantNotFound(*agent_id))?;
        Ok(self.participants.remove(idx))
    }

    /// Ordered roster of participants.
    pub fn roster(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, agent_id: &Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.agent_id == agent_id)
    }

    pub fn participant_mut(&mut self, agent_id: &Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.agent_id == agent_id)
    }

    /// Look up a participant by display name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        let wanted = name.to_lowercase();
        self.participants
            .iter()
            .find(|p| p.display_name.to_lowercase() == wanted)
    }

    pub fn is_active(&self) -> bool {
        self.status == RoundTableStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [RoundTableStatus::Active, RoundTableStatus::Closed] {
            let parsed: RoundTableStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("archived".parse::<RoundTableStatus>().is_err());
    }

    #[test]
    fn test_add_participant_rejects_duplicate_id() {
        let mut table = RoundTable::new("Design review");
        let ada = Participant::new("Ada", "Precise engineer.", "model-a");
        let clone = ada.clone();

        table.add_participant(ada).unwrap();
        let err = table.add_participant(clone).unwrap_err();
        assert!(matches!(err, RoundTableError::DuplicateParticipant(_)));
        assert_eq!(table.roster().len(), 1);
    }

    #[test]
    fn test_roster_preserves_insertion_order() {
        let table = RoundTable::new("Ordering")
            .with_participant(Participant::new("Ada", "", "m"))
            .unwrap()
            .with_participant(Participant::new("Grace", "", "m"))
            .unwrap()
            .with_participant(Participant::new("Linus", "", "m"))
            .unwrap();

        let names: Vec<&str> = table.roster().iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Grace", "Linus"]);
    }

    #[test]
    fn test_remove_participant() {
        let grace = Participant::new("Grace", "", "m");
        let grace_id = grace.agent_id;
        let mut table = RoundTable::new("Removal").with_participant(grace).unwrap();

        let removed = table.remove_participant(&grace_id).unwrap();
        assert_eq!(removed.display_name, "Grace");
        assert!(table.roster().is_empty());
        assert!(matches!(
            table.remove_participant(&grace_id),
            Err(RoundTableError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let table = RoundTable::new("Lookup")
            .with_participant(Participant::new("Grace", "", "m"))
            .unwrap();
        assert!(table.find_by_name("grace").is_some());
        assert!(table.find_by_name("GRACE").is_some());
        assert!(table.find_by_name("gra").is_none());
    }

    #[test]
    fn test_effective_overrides() {
        let mut ada = Participant::new("Ada", "Default persona", "model-a");
        assert_eq!(ada.effective_persona(), "Default persona");
        assert_eq!(ada.effective_model(), "model-a");

        ada.overrides.persona = Some("Devil's advocate".to_string());
        ada.overrides.model = Some("model-b".to_string());
        assert_eq!(ada.effective_persona(), "Devil's advocate");
        assert_eq!(ada.effective_model(), "model-b");
    }

    #[test]
    fn test_overrides_omitted_when_empty() {
        let json = serde_json::to_string(&ParticipantOverrides::default()).unwrap();
        assert_eq!(json, "{}");
    }
}

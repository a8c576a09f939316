//! In-memory round-table repository.
//!
//! Implements `RoundTableRepository` from `conclave-core` over `RwLock`ed
//! maps. Response candidates and selections are folded into the stored
//! messages, so `list_messages` returns the same shape the timeline holds.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use conclave_core::repository::RoundTableRepository;
use conclave_types::error::RepositoryError;
use conclave_types::message::{Message, Response};
use conclave_types::roundtable::{ParticipantOverrides, RoundTable};

/// Process-local implementation of `RoundTableRepository`.
#[derive(Debug, Default)]
pub struct InMemoryRoundTableRepository {
    tables: RwLock<HashMap<Uuid, RoundTable>>,
    messages: RwLock<HashMap<Uuid, Vec<Message>>>,
}

impl InMemoryRoundTableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) a round table with its roster.
    pub fn save_round_table(&self, round_table: &RoundTable) {
        self.tables
            .write()
            .expect("round table lock poisoned")
            .insert(round_table.id, round_table.clone());
    }

    pub fn message_count(&self, round_table_id: &Uuid) -> usize {
        self.messages
            .read()
            .expect("message lock poisoned")
            .get(round_table_id)
            .map_or(0, Vec::len)
    }

    fn with_message<T>(
        &self,
        message_id: &Uuid,
        f: impl FnOnce(&mut Message) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut messages = self.messages.write().expect("message lock poisoned");
        let message = messages
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|m| m.id == *message_id)
            .ok_or(RepositoryError::NotFound)?;
        f(message)
    }
}

impl RoundTableRepository for InMemoryRoundTableRepository {
    async fn append_message(&self, message: &Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().expect("message lock poisoned");
        let list = messages.entry(message.round_table_id).or_default();
        if list.iter().any(|m| m.id == message.id) {
            return Err(RepositoryError::Conflict(format!(
                "message {} already stored",
                message.id
            )));
        }
        list.push(message.clone());
        Ok(())
    }

    async fn append_response(&self, response: &Response) -> Result<(), RepositoryError> {
        self.with_message(&response.message_id, |message| {
            if message.responses.iter().any(|r| r.id == response.id) {
                return Err(RepositoryError::Conflict(format!(
                    "response {} already stored",
                    response.id
                )));
            }
            message.responses.push(response.clone());
            Ok(())
        })
    }

    async fn select_response(
        &self,
        message_id: &Uuid,
        response_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        self.with_message(message_id, |message| {
            if !message.responses.iter().any(|r| r.id == *response_id) {
                return Err(RepositoryError::NotFound);
            }
            for response in &mut message.responses {
                response.selected = response.id == *response_id;
            }
            Ok(())
        })
    }

    async fn get_round_table(
        &self,
        round_table_id: &Uuid,
    ) -> Result<Option<RoundTable>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .expect("round table lock poisoned")
            .get(round_table_id)
            .cloned())
    }

    async fn list_messages(&self, round_table_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let mut messages = self
            .messages
            .read()
            .expect("message lock poisoned")
            .get(round_table_id)
            .cloned()
            .unwrap_or_default();
        // Writes may land out of order; the sequence is authoritative.
        messages.sort_by_key(|m| m.sequence);
        Ok(messages)
    }

    async fn update_participant_overrides(
        &self,
        round_table_id: &Uuid,
        agent_id: &Uuid,
        overrides: &ParticipantOverrides,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().expect("round table lock poisoned");
        let participant = tables
            .get_mut(round_table_id)
            .and_then(|t| t.participant_mut(agent_id))
            .ok_or(RepositoryError::NotFound)?;
        participant.overrides = overrides.clone();
        Ok(())
    }
}

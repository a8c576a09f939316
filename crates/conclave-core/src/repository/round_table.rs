//! Round-table repository trait definition.
//!
//! The engine keeps the authoritative timeline in memory and writes through
//! to this port. Implementations decide how (and whether) the data is made
//! durable.

use conclave_types::error::RepositoryError;
use conclave_types::message::{Message, Response};
use conclave_types::roundtable::{ParticipantOverrides, RoundTable};
use uuid::Uuid;

/// Repository trait for round-table persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait RoundTableRepository: Send + Sync {
    /// Persist a newly appended timeline message.
    fn append_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist a new response candidate.
    fn append_response(
        &self,
        response: &Response,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Mark one response as selected for a message, clearing any other.
    fn select_response(
        &self,
        message_id: &Uuid,
        response_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch a round table with its roster.
    fn get_round_table(
        &self,
        round_table_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<RoundTable>, RepositoryError>> + Send;

    /// All messages of a round table in sequence order.
    fn list_messages(
        &self,
        round_table_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Persist per-round overrides for one participant.
    fn update_participant_overrides(
        &self,
        round_table_id: &Uuid,
        agent_id: &Uuid,
        overrides: &ParticipantOverrides,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

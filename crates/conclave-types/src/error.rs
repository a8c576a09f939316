use thiserror::Error;
use uuid::Uuid;

/// Errors related to round-table and timeline operations.
#[derive(Debug, Error)]
pub enum RoundTableError {
    #[error("agent {0} is already seated at this round table")]
    DuplicateParticipant(Uuid),

    #[error("participant {0} not found")]
    ParticipantNotFound(Uuid),

    #[error("round table is closed")]
    Closed,

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("response {0} not found")]
    ResponseNotFound(Uuid),

    #[error("response belongs to message {actual}, expected {expected}")]
    ResponseMismatch { expected: Uuid, actual: Uuid },
}

/// Errors from repository operations (used by trait definitions in conclave-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_table_error_display() {
        let id = Uuid::nil();
        let err = RoundTableError::ParticipantNotFound(id);
        assert_eq!(
            err.to_string(),
            "participant 00000000-0000-0000-0000-000000000000 not found"
        );
        assert_eq!(RoundTableError::Closed.to_string(), "round table is closed");
    }

    #[test]
    fn test_response_mismatch_display() {
        let expected = Uuid::now_v7();
        let actual = Uuid::now_v7();
        let err = RoundTableError::ResponseMismatch { expected, actual };
        assert!(err.to_string().contains(&expected.to_string()));
        assert!(err.to_string().contains(&actual.to_string()));
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }
}

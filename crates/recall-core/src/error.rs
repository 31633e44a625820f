//! Error types for Recall.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid quality: {0} (must be an integer between 0 and 5)")]
    InvalidQuality(i64),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("No cards available for a quiz in collection {0}")]
    EmptyCollection(String),

    #[error("Card {card_id} is not part of session {session_id}")]
    CardNotInSession { session_id: String, card_id: String },

    #[error("Card already answered in this session: {0}")]
    AlreadyAnswered(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Collaborator failures the caller may retry with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::GenerationUnavailable(_) | Self::Timeout { .. }
        )
    }

    /// Validation failures caused by the caller's input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuality(_)
                | Self::DimensionMismatch { .. }
                | Self::CardNotInSession { .. }
                | Self::AlreadyAnswered(_)
                | Self::InvalidInput(_)
        )
    }

    /// Stable machine-readable name, used by the HTTP binding.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuality(_) => "invalid_quality",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::CollectionNotFound(_) => "collection_not_found",
            Self::EmptyCollection(_) => "empty_collection",
            Self::CardNotInSession { .. } => "card_not_in_session",
            Self::AlreadyAnswered(_) => "already_answered",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Storage(_) => "storage",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::EmbeddingUnavailable("down".into()).is_retryable());
        assert!(Error::GenerationUnavailable("down".into()).is_retryable());
        assert!(Error::Timeout {
            operation: "embed".into(),
            seconds: 5
        }
        .is_retryable());
        assert!(!Error::InvalidQuality(7).is_retryable());
    }

    #[test]
    fn test_caller_errors() {
        assert!(Error::AlreadyAnswered("c1".into()).is_caller_error());
        assert!(Error::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_caller_error());
        assert!(!Error::NotFound("x".into()).is_caller_error());
        assert_eq!(Error::InvalidQuality(9).kind(), "invalid_quality");
    }
}

//! Error types for the retrieval and answer pipeline.
//!
//! Provider failures are typed so callers can pick a recovery action
//! (keep the previous index, show the generic failure message) without
//! matching on human-readable text.

use thiserror::Error;

/// The only failure text ever shown to the user for a failed question.
pub const USER_FACING_ERROR: &str =
    "An error occurred while processing your question. Please try again.";

/// Errors raised while turning text into vectors.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    Malformed(String),

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed (network, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Request(_) => true,
            EmbeddingError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised by the completion provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid completion response: {0}")]
    Malformed(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Request(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Malformed(_) => false,
        }
    }
}

/// A question was asked before any documents were indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no documents have been indexed yet")]
pub struct NotReadyError;

/// Everything that can go wrong while answering one question.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl AnswerError {
    /// Short, non-technical text safe to show in the chat history.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_ERROR
    }
}

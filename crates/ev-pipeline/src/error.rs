use ev_core::{EmbeddingError, IndexError, StoreError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::state::Stage;

/// Why a run stopped.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StageError {
    /// Some inputs failed to embed and the policy is `Abort`.
    #[error("{failed} of {total} inputs failed to embed; first failure (input {first_index}): {first}")]
    EmbeddingAborted {
        failed: usize,
        total: usize,
        first_index: usize,
        first: EmbeddingError,
    },

    #[error("Inconsistent embedding dimension for input {index}: expected {expected}, got {got}")]
    InconsistentDimension { index: usize, expected: usize, got: usize },

    #[error("Query input {0} has no embedding")]
    QueryInputUnavailable(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{stage} stage cancelled after {timeout:?}")]
    Cancelled { stage: Stage, timeout: Duration },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StageError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmbeddingAborted { .. } => "embedding_aborted",
            Self::InconsistentDimension { .. } => "inconsistent_dimension",
            Self::QueryInputUnavailable(_) => "query_input_unavailable",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Cancelled { .. } => "cancelled",
            Self::Index(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::EmbeddingAborted { first, .. } => first.is_retryable(),
            Self::Index(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure to turn one text into a vector.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EmbeddingError {
    #[error("Rate limited by embedding provider: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Embedding failed: {0}")]
    Unknown(String),
}

impl EmbeddingError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidInput(_) => "invalid_input",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ProviderUnavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IndexError {
    #[error("Index creation failed: {0}")]
    CreationFailed(String),
    #[error("Index {name} not ready after {waited:?}")]
    Timeout { name: String, waited: Duration },
    #[error("Invalid index descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
}

impl IndexError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreationFailed(_) => "creation_failed",
            Self::Timeout { .. } => "timeout",
            Self::InvalidDescriptor(_) => "invalid_descriptor",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StoreError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),
    #[error("Dimension mismatch{}: expected {expected}, got {got}", record_suffix(.id))]
    DimensionMismatch {
        id: Option<String>,
        expected: usize,
        got: usize,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    #[error("Vector store error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IndexNotFound(_) => "index_not_found",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unavailable(_) => "unavailable",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

fn record_suffix(id: &Option<String>) -> String {
    id.as_deref().map(|id| format!(" for record {id}")).unwrap_or_default()
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => IndexError::Unavailable(msg),
            other => IndexError::CreationFailed(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

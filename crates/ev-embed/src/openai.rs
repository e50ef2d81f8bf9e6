use async_trait::async_trait;
use ev_core::config::ENV_OPENAI_API_KEY;
use ev_core::{ConfigError, EmbedVecConfig, EmbeddingError, EmbeddingRequest, EmbeddingVector};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::EmbeddingClient;
use crate::models::ModelCatalog;

/// OpenAI API base URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosted OpenAI embeddings endpoint.
pub struct OpenAiEmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    catalog: ModelCatalog,
}

impl OpenAiEmbeddingClient {
    /// Creates a client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_OPENAI_API_KEY.into()));
        }
        Ok(Self {
            client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: OPENAI_API_URL.to_owned(),
            catalog: ModelCatalog::default(),
        })
    }

    /// Creates a client from loaded configuration.
    pub fn from_config(config: &EmbedVecConfig) -> Result<Self, ConfigError> {
        Self::new(config.openai_api_key()?)
    }

    /// Points the client at a different API root (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Replaces the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder().timeout(timeout).build().map_err(|err| ConfigError::Invalid {
        key: "http_client".into(),
        value: err.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a non-success HTTP status to an embedding error kind.
pub(crate) fn map_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> EmbeddingError {
    let message = format!("{status}: {message}");
    match status.as_u16() {
        429 => EmbeddingError::RateLimited { message, retry_after },
        400 | 404 | 413 | 422 => EmbeddingError::InvalidInput(message),
        500..=599 => EmbeddingError::ProviderUnavailable(message),
        _ => EmbeddingError::Unknown(message),
    }
}

fn map_transport(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() || err.is_connect() {
        EmbeddingError::ProviderUnavailable(err.to_string())
    } else {
        EmbeddingError::Unknown(err.to_string())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    async fn request_embedding(&self, request: &EmbeddingRequest) -> Result<EmbeddingVector, EmbeddingError> {
        let body = EmbeddingsRequest {
            model: &request.model,
            input: &request.text,
            encoding_format: "float",
        };
        tracing::debug!(model = %request.model, chars = request.text.len(), "requesting embedding");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or(text);
            return Err(map_status(status, message, retry_after));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Unknown(format!("malformed embeddings response: {err}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Unknown("embeddings response contained no data".into()))
    }
}

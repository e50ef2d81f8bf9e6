//! Pinecone REST backend.

use async_trait::async_trait;
use ev_core::config::ENV_PINECONE_API_KEY;
use ev_core::types::Metadata;
use ev_core::{
    ConfigError, DeploymentSpec, DistanceMetric, EmbedVecConfig, IndexDescriptor, IndexInfo,
    QueryMatch, QueryRequest, QueryResult, StoreError, VectorRecord,
};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::backend::{CreateOutcome, VectorBackend};

/// Control-plane endpoint.
pub const PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";
/// Pinned REST API version.
pub const PINECONE_API_VERSION: &str = "2024-07";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PineconeBackend {
    client: Client,
    api_key: String,
    control_url: String,
    /// Data-plane host per index, learned from describe.
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeBackend {
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_PINECONE_API_KEY.into()));
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| ConfigError::Invalid { key: "http_client".into(), value: err.to_string() })?;
        Ok(Self {
            client,
            api_key,
            control_url: PINECONE_CONTROL_URL.to_owned(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &EmbedVecConfig) -> Result<Self, ConfigError> {
        Self::new(config.pinecone_api_key()?)
    }

    #[must_use]
    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    async fn data_url(&self, index: &str) -> Result<String, StoreError> {
        let cached = self.hosts.read().get(index).cloned();
        if let Some(host) = cached {
            return Ok(host);
        }
        let info = self.describe_index(index).await?;
        info.host
            .ok_or_else(|| StoreError::Unknown(format!("index {index} has no data-plane host yet")))
    }

    fn remember_host(&self, info: &IndexInfo) {
        if let Some(host) = &info.host {
            self.hosts.write().insert(info.name.clone(), host.clone());
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    }
}

// -- Wire types --

#[derive(Debug, Deserialize)]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl IndexModel {
    fn into_info(self) -> IndexInfo {
        let metric = DistanceMetric::parse(&self.metric).unwrap_or_else(|| {
            tracing::warn!(index = %self.name, metric = %self.metric, "unrecognised metric, assuming cosine");
            DistanceMetric::Cosine
        });
        IndexInfo {
            name: self.name,
            dimension: self.dimension,
            metric,
            host: self.host.filter(|h| !h.is_empty()).map(|h| normalize_host(&h)),
            ready: self.status.map(|s| s.ready).unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    spec: &'a DeploymentSpec,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireQuery<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireQueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// -- Response handling --

fn map_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() || err.is_connect() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Unknown(err.to_string())
    }
}

/// Map a non-success status; `index` names the target for 404s.
pub(crate) fn map_status(status: StatusCode, message: &str, index: Option<&str>) -> StoreError {
    match status.as_u16() {
        404 => StoreError::IndexNotFound(index.unwrap_or("<unknown>").to_string()),
        400 | 422 => StoreError::InvalidRequest(format!("{status}: {message}")),
        429 | 500..=599 => StoreError::Unavailable(format!("{status}: {message}")),
        _ => StoreError::Unknown(format!("{status}: {message}")),
    }
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|env| env.error.message)
        .unwrap_or(text)
}

async fn decode<T: DeserializeOwned>(response: Response, index: Option<&str>) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(map_status(status, &message, index));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| StoreError::Unknown(format!("malformed response: {err}")))
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError> {
        let response = self
            .authed(self.client.get(format!("{}/indexes", self.control_url)))
            .send()
            .await
            .map_err(map_transport)?;
        let list: ListIndexesResponse = decode(response, None).await?;
        let infos: Vec<IndexInfo> = list.indexes.into_iter().map(IndexModel::into_info).collect();
        for info in &infos {
            self.remember_host(info);
        }
        tracing::debug!(count = infos.len(), "listed indexes");
        Ok(infos)
    }

    async fn describe_index(&self, name: &str) -> Result<IndexInfo, StoreError> {
        let response = self
            .authed(self.client.get(format!("{}/indexes/{name}", self.control_url)))
            .send()
            .await
            .map_err(map_transport)?;
        let info = decode::<IndexModel>(response, Some(name)).await?.into_info();
        self.remember_host(&info);
        Ok(info)
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<CreateOutcome, StoreError> {
        let body = CreateIndexRequest {
            name: &descriptor.name,
            dimension: descriptor.dimension,
            metric: descriptor.metric,
            spec: &descriptor.spec,
        };
        let response = self
            .authed(self.client.post(format!("{}/indexes", self.control_url)))
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(map_status(status, &message, Some(&descriptor.name)));
        }
        Ok(CreateOutcome::Created)
    }

    async fn upsert(&self, index: &str, namespace: &str, records: &[VectorRecord]) -> Result<usize, StoreError> {
        let url = self.data_url(index).await?;
        let response = self
            .authed(self.client.post(format!("{url}/vectors/upsert")))
            .json(&UpsertRequest { vectors: records, namespace })
            .send()
            .await
            .map_err(map_transport)?;
        let result = decode::<UpsertResponse>(response, Some(index)).await;
        if matches!(result, Err(StoreError::IndexNotFound(_))) {
            self.hosts.write().remove(index);
        }
        Ok(result?.upserted_count)
    }

    async fn query(&self, index: &str, request: &QueryRequest) -> Result<QueryResult, StoreError> {
        let url = self.data_url(index).await?;
        let body = WireQuery {
            vector: &request.vector,
            top_k: request.top_k,
            include_values: request.include_values,
            include_metadata: request.include_metadata,
            namespace: &request.namespace,
        };
        let response = self
            .authed(self.client.post(format!("{url}/query")))
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let result = decode::<WireQueryResponse>(response, Some(index)).await;
        if matches!(result, Err(StoreError::IndexNotFound(_))) {
            self.hosts.write().remove(index);
        }
        let wire = result?;
        Ok(QueryResult {
            matches: wire
                .matches
                .into_iter()
                .map(|m| QueryMatch {
                    id: m.id,
                    score: m.score,
                    values: (!m.values.is_empty()).then_some(m.values),
                    metadata: m.metadata,
                })
                .collect(),
            namespace: wire.namespace,
        })
    }
}

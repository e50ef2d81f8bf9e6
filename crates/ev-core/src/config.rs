use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{DeploymentSpec, DistanceMetric, IndexDescriptor};

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_PINECONE_API_KEY: &str = "PINECONE_API_KEY";
pub const ENV_MODEL: &str = "EMBEDVEC_MODEL";
pub const ENV_INDEX_NAME: &str = "EMBEDVEC_INDEX_NAME";
pub const ENV_CLOUD: &str = "EMBEDVEC_CLOUD";
pub const ENV_REGION: &str = "EMBEDVEC_REGION";
pub const ENV_METRIC: &str = "EMBEDVEC_METRIC";
pub const ENV_TOP_K: &str = "EMBEDVEC_TOP_K";
pub const ENV_INCLUDE_VALUES: &str = "EMBEDVEC_INCLUDE_VALUES";
pub const ENV_CONCURRENCY: &str = "EMBEDVEC_CONCURRENCY";
pub const ENV_STAGE_TIMEOUT_SECS: &str = "EMBEDVEC_STAGE_TIMEOUT_SECS";
pub const ENV_PARTIAL_POLICY: &str = "EMBEDVEC_PARTIAL_POLICY";

pub const DEFAULT_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_INDEX_NAME: &str = "embeddings-index";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedVecConfig {
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub query: QueryConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on embedding calls in flight.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub index_name: String,
    pub metric: DistanceMetric,
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub top_k: usize,
    pub include_values: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub stage_timeout_secs: u64,
    pub partial_policy: PartialEmbeddingPolicy,
}

/// What the pipeline does when some inputs fail to embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialEmbeddingPolicy {
    /// Fail the run before touching the index.
    #[default]
    Abort,
    /// Store and query with the inputs that did embed.
    ProceedWithSubset,
}

impl PartialEmbeddingPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "proceed" | "proceed_with_subset" | "subset" => Some(Self::ProceedWithSubset),
            _ => None,
        }
    }
}

impl Default for EmbedVecConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig {
                api_key: None,
                model: DEFAULT_MODEL.into(),
                concurrency: 4,
            },
            store: StoreConfig {
                api_key: None,
                index_name: DEFAULT_INDEX_NAME.into(),
                metric: DistanceMetric::Cosine,
                cloud: "aws".into(),
                region: "us-east-1".into(),
            },
            query: QueryConfig {
                top_k: 3,
                include_values: true,
            },
            pipeline: PipelineConfig {
                stage_timeout_secs: 60,
                partial_policy: PartialEmbeddingPolicy::Abort,
            },
        }
    }
}

impl EmbedVecConfig {
    /// Build from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        cfg.embedding.api_key = get(ENV_OPENAI_API_KEY);
        cfg.store.api_key = get(ENV_PINECONE_API_KEY);
        if let Some(model) = get(ENV_MODEL) {
            cfg.embedding.model = model;
        }
        if let Some(name) = get(ENV_INDEX_NAME) {
            cfg.store.index_name = name;
        }
        if let Some(cloud) = get(ENV_CLOUD) {
            cfg.store.cloud = cloud;
        }
        if let Some(region) = get(ENV_REGION) {
            cfg.store.region = region;
        }
        if let Some(raw) = get(ENV_METRIC) {
            cfg.store.metric = DistanceMetric::parse(&raw).ok_or_else(|| invalid(ENV_METRIC, &raw))?;
        }
        if let Some(raw) = get(ENV_TOP_K) {
            cfg.query.top_k = parse_positive(ENV_TOP_K, &raw)?;
        }
        if let Some(raw) = get(ENV_INCLUDE_VALUES) {
            cfg.query.include_values = parse_bool(ENV_INCLUDE_VALUES, &raw)?;
        }
        if let Some(raw) = get(ENV_CONCURRENCY) {
            cfg.embedding.concurrency = parse_positive(ENV_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = get(ENV_STAGE_TIMEOUT_SECS) {
            cfg.pipeline.stage_timeout_secs = parse_positive(ENV_STAGE_TIMEOUT_SECS, &raw)? as u64;
        }
        if let Some(raw) = get(ENV_PARTIAL_POLICY) {
            cfg.pipeline.partial_policy =
                PartialEmbeddingPolicy::parse(&raw).ok_or_else(|| invalid(ENV_PARTIAL_POLICY, &raw))?;
        }

        tracing::debug!(
            model = %cfg.embedding.model,
            index = %cfg.store.index_name,
            top_k = cfg.query.top_k,
            "configuration loaded"
        );
        Ok(cfg)
    }

    pub fn openai_api_key(&self) -> Result<&str, ConfigError> {
        self.embedding
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(ENV_OPENAI_API_KEY.into()))
    }

    pub fn pinecone_api_key(&self) -> Result<&str, ConfigError> {
        self.store
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(ENV_PINECONE_API_KEY.into()))
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.stage_timeout_secs)
    }

    /// Descriptor for the configured index at the given dimension.
    pub fn index_descriptor(&self, dimension: usize) -> IndexDescriptor {
        IndexDescriptor::new(self.store.index_name.clone(), dimension)
            .with_metric(self.store.metric)
            .with_spec(DeploymentSpec::serverless(
                self.store.cloud.clone(),
                self.store.region.clone(),
            ))
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid { key: key.into(), value: value.into() }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, raw)),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::IndexError;

/// Dense embedding produced by a model. Every vector of one run has the same length.
pub type EmbeddingVector = Vec<f32>;

/// Metadata attached to a stored vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Longest index name the store accepts.
pub const MAX_INDEX_NAME_LEN: usize = 45;

/// A single text to embed with a given model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingRequest {
    pub text: String,
    pub model: String,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self { text: text.into(), model: model.into() }
    }
}

/// Similarity metric an index is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Euclidean distance.
    Euclidean,
    /// Dot product.
    DotProduct,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::DotProduct => write!(f, "dotproduct"),
        }
    }
}

impl DistanceMetric {
    /// Parse a metric name, accepting common aliases. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" | "cos" => Some(Self::Cosine),
            "euclidean" | "l2" => Some(Self::Euclidean),
            "dotproduct" | "dot" | "ip" | "inner_product" => Some(Self::DotProduct),
            _ => None,
        }
    }
}

/// Where the store provisions index infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentSpec {
    Serverless { cloud: String, region: String },
}

impl DeploymentSpec {
    pub fn serverless(cloud: impl Into<String>, region: impl Into<String>) -> Self {
        Self::Serverless { cloud: cloud.into(), region: region.into() }
    }
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self::serverless("aws", "us-east-1")
    }
}

/// Desired shape of an index. Creating one is a remote side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub spec: DeploymentSpec,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: DistanceMetric::default(),
            spec: DeploymentSpec::default(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_spec(mut self, spec: DeploymentSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Check the name and dimension against the store's rules.
    pub fn validate(&self) -> Result<(), IndexError> {
        if !is_valid_index_name(&self.name) {
            return Err(IndexError::InvalidDescriptor(format!(
                "index name {:?} must be 1-{MAX_INDEX_NAME_LEN} lowercase alphanumerics or '-', \
                 not starting or ending with '-'",
                self.name
            )));
        }
        if self.dimension == 0 {
            return Err(IndexError::InvalidDescriptor(format!(
                "index {} must have a dimension of at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

pub fn is_valid_index_name(name: &str) -> bool {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").expect("index name pattern is valid")
    });
    name.len() <= MAX_INDEX_NAME_LEN && re.is_match(name)
}

/// An index as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Data-plane host, when the store exposes one.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub ready: bool,
}

/// A vector stored under a caller-assigned id. Re-upserting an id overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: EmbeddingVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, values: EmbeddingVector) -> Self {
        Self { id: id.into(), values, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of an upsert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub upserted_count: usize,
    pub batches: usize,
}

/// A top-K nearest-neighbour request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub vector: EmbeddingVector,
    pub top_k: usize,
    #[serde(default)]
    pub include_values: bool,
    #[serde(default)]
    pub include_metadata: bool,
    #[serde(default)]
    pub namespace: String,
}

impl QueryRequest {
    pub fn new(vector: EmbeddingVector, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            include_values: false,
            include_metadata: false,
            namespace: String::new(),
        }
    }

    pub fn include_values(mut self, include: bool) -> Self {
        self.include_values = include;
        self
    }

    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<EmbeddingVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Matches ordered by descending similarity, at most `top_k` of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub matches: Vec<QueryMatch>,
    #[serde(default)]
    pub namespace: String,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn top(&self) -> Option<&QueryMatch> {
        self.matches.first()
    }
}

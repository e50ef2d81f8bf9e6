pub mod config;
pub mod error;
pub mod types;

pub use config::{EmbedVecConfig, PartialEmbeddingPolicy};
pub use error::{ConfigError, EmbeddingError, IndexError, StoreError};
pub use types::{
    DeploymentSpec, DistanceMetric, EmbeddingRequest, EmbeddingVector, IndexDescriptor, IndexInfo,
    Metadata, QueryMatch, QueryRequest, QueryResult, UpsertSummary, VectorRecord,
};

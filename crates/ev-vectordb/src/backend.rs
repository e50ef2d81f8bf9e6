use async_trait::async_trait;
use ev_core::{IndexDescriptor, IndexInfo, QueryRequest, QueryResult, StoreError, VectorRecord};

/// What a create call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another caller created the index first.
    AlreadyExists,
}

/// Operations a vector store service exposes.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError>;

    /// `IndexNotFound` when no index has this name.
    async fn describe_index(&self, name: &str) -> Result<IndexInfo, StoreError>;

    /// Must answer `AlreadyExists` rather than fail when the name is taken.
    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<CreateOutcome, StoreError>;

    /// Write records into `namespace`; returns how many were written.
    async fn upsert(&self, index: &str, namespace: &str, records: &[VectorRecord]) -> Result<usize, StoreError>;

    async fn query(&self, index: &str, request: &QueryRequest) -> Result<QueryResult, StoreError>;
}

use ev_core::{QueryRequest, QueryResult, StoreError, UpsertSummary, VectorRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::VectorBackend;

/// Upper bound on records per upsert request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Upsert and query against named indexes.
///
/// Each index's dimension is looked up once and cached; records and query
/// vectors are checked against it before anything goes over the wire.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    namespace: String,
    max_batch_size: usize,
    dimensions: RwLock<HashMap<String, usize>>,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            namespace: String::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            dimensions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// Drop the cached dimension, e.g. after the index was recreated.
    pub fn forget(&self, index_name: &str) {
        self.dimensions.write().remove(index_name);
    }

    pub async fn dimension(&self, index_name: &str) -> Result<usize, StoreError> {
        let cached = self.dimensions.read().get(index_name).copied();
        if let Some(dim) = cached {
            return Ok(dim);
        }
        let info = self.backend.describe_index(index_name).await?;
        self.dimensions.write().insert(index_name.to_string(), info.dimension);
        Ok(info.dimension)
    }

    /// Write `records`, overwriting existing ids.
    ///
    /// The batch is rejected as a whole if any record has an empty id or the
    /// wrong length; nothing is written in that case.
    pub async fn upsert(&self, index_name: &str, records: &[VectorRecord]) -> Result<UpsertSummary, StoreError> {
        if records.is_empty() {
            return Ok(UpsertSummary::default());
        }
        if records.iter().any(|r| r.id.is_empty()) {
            return Err(StoreError::InvalidRequest("record ids must not be empty".into()));
        }

        let dim = self.dimension(index_name).await?;
        if let Some(bad) = records.iter().find(|r| r.values.len() != dim) {
            tracing::warn!(index = %index_name, id = %bad.id, expected = dim, got = bad.values.len(), "rejecting upsert batch");
            return Err(StoreError::DimensionMismatch {
                id: Some(bad.id.clone()),
                expected: dim,
                got: bad.values.len(),
            });
        }

        let mut summary = UpsertSummary::default();
        for chunk in records.chunks(self.max_batch_size) {
            summary.upserted_count += self.backend.upsert(index_name, &self.namespace, chunk).await?;
            summary.batches += 1;
        }
        tracing::info!(index = %index_name, upserted = summary.upserted_count, batches = summary.batches, "upsert complete");
        Ok(summary)
    }

    /// Top-`top_k` matches for `vector`, best first. Fewer than `top_k` is not an error.
    pub async fn query(
        &self,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
        include_values: bool,
    ) -> Result<QueryResult, StoreError> {
        let request = QueryRequest::new(vector.to_vec(), top_k)
            .include_values(include_values)
            .include_metadata(true);
        self.query_with(index_name, request).await
    }

    pub async fn query_with(&self, index_name: &str, mut request: QueryRequest) -> Result<QueryResult, StoreError> {
        if request.top_k == 0 {
            return Err(StoreError::InvalidRequest("top_k must be at least 1".into()));
        }
        let dim = self.dimension(index_name).await?;
        if request.vector.len() != dim {
            return Err(StoreError::DimensionMismatch { id: None, expected: dim, got: request.vector.len() });
        }
        request.namespace = self.namespace.clone();

        let result = self.backend.query(index_name, &request).await?;
        tracing::info!(
            index = %index_name,
            namespace = %request.namespace,
            top_k = request.top_k,
            matches = result.len(),
            "query complete"
        );
        Ok(result)
    }
}

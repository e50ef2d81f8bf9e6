//! In-process backend with flat (brute-force) indexes.

use async_trait::async_trait;
use ev_core::types::Metadata;
use ev_core::{
    DistanceMetric, IndexDescriptor, IndexInfo, QueryMatch, QueryRequest, QueryResult, StoreError,
    VectorRecord,
};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{CreateOutcome, VectorBackend};
use crate::distance;

/// One namespace of a flat index.
#[derive(Default)]
struct FlatNamespace {
    ids: Vec<String>,
    /// Stored as given; returned when `include_values` is set.
    values: Vec<Vec<f32>>,
    /// Normalized copies for cosine, raw otherwise.
    search_vectors: Vec<Vec<f32>>,
    metadata: Vec<Option<Metadata>>,
    id_to_idx: HashMap<String, usize>,
}

impl FlatNamespace {
    fn upsert(&mut self, metric: DistanceMetric, record: &VectorRecord) {
        let mut search = record.values.clone();
        if metric == DistanceMetric::Cosine {
            distance::normalize_vector(&mut search);
        }
        if let Some(&idx) = self.id_to_idx.get(&record.id) {
            self.values[idx] = record.values.clone();
            self.search_vectors[idx] = search;
            self.metadata[idx] = record.metadata.clone();
        } else {
            let idx = self.ids.len();
            self.ids.push(record.id.clone());
            self.values.push(record.values.clone());
            self.search_vectors.push(search);
            self.metadata.push(record.metadata.clone());
            self.id_to_idx.insert(record.id.clone(), idx);
        }
    }

    fn search(&self, metric: DistanceMetric, request: &QueryRequest) -> Vec<QueryMatch> {
        let (query, effective) = if metric == DistanceMetric::Cosine {
            let mut q = request.vector.clone();
            distance::normalize_vector(&mut q);
            // normalized vectors: cosine = IP
            (q, DistanceMetric::DotProduct)
        } else {
            (request.vector.clone(), metric)
        };

        let mut scored: Vec<(usize, f32)> = self
            .search_vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx, distance::compute_score(effective, &query, v)))
            .collect();

        // Descending score, ties broken by id for stable output.
        scored.sort_by(|a, b| {
            OrderedFloat(b.1)
                .cmp(&OrderedFloat(a.1))
                .then_with(|| self.ids[a.0].cmp(&self.ids[b.0]))
        });
        scored.truncate(request.top_k);

        scored
            .into_iter()
            .map(|(idx, score)| QueryMatch {
                id: self.ids[idx].clone(),
                score,
                values: request.include_values.then(|| self.values[idx].clone()),
                metadata: if request.include_metadata { self.metadata[idx].clone() } else { None },
            })
            .collect()
    }
}

struct MemoryIndex {
    descriptor: IndexDescriptor,
    namespaces: HashMap<String, FlatNamespace>,
    /// Describe calls remaining before the index reports ready.
    pending_polls: usize,
}

impl MemoryIndex {
    fn info(&self) -> IndexInfo {
        IndexInfo {
            name: self.descriptor.name.clone(),
            dimension: self.descriptor.dimension,
            metric: self.descriptor.metric,
            host: None,
            ready: self.pending_polls == 0,
        }
    }

    fn record_count(&self) -> usize {
        self.namespaces.values().map(|ns| ns.ids.len()).sum()
    }
}

/// Vector store held entirely in memory.
///
/// Behaves like the hosted store where the pipeline can observe it: create is
/// idempotent, readiness can lag creation, and upserts are validated against
/// the index dimension before anything is written.
#[derive(Default)]
pub struct MemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
    create_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    ready_after_polls: usize,
    query_latency: Option<Duration>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// New indexes report ready only after `polls` describe calls.
    #[must_use]
    pub fn with_ready_after(mut self, polls: usize) -> Self {
        self.ready_after_polls = polls;
        self
    }

    /// Every query sleeps this long before answering.
    #[must_use]
    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.query_latency = Some(latency);
        self
    }

    /// Make every call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of create calls received, including ones that found the index.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Total records across all namespaces of `index`.
    pub fn record_count(&self, index: &str) -> usize {
        self.indexes.read().get(index).map(MemoryIndex::record_count).unwrap_or(0)
    }

    /// Stored values for `id` in the default namespace.
    pub fn fetch(&self, index: &str, id: &str) -> Option<Vec<f32>> {
        let indexes = self.indexes.read();
        let ns = indexes.get(index)?.namespaces.get("")?;
        ns.id_to_idx.get(id).map(|&idx| ns.values[idx].clone())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, StoreError> {
        self.check_available()?;
        let mut infos: Vec<IndexInfo> = self.indexes.read().values().map(MemoryIndex::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn describe_index(&self, name: &str) -> Result<IndexInfo, StoreError> {
        self.check_available()?;
        let mut indexes = self.indexes.write();
        let index = indexes
            .get_mut(name)
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))?;
        let info = index.info();
        index.pending_polls = index.pending_polls.saturating_sub(1);
        Ok(info)
    }

    async fn create_index(&self, descriptor: &IndexDescriptor) -> Result<CreateOutcome, StoreError> {
        self.check_available()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&descriptor.name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        indexes.insert(
            descriptor.name.clone(),
            MemoryIndex {
                descriptor: descriptor.clone(),
                namespaces: HashMap::new(),
                pending_polls: self.ready_after_polls,
            },
        );
        Ok(CreateOutcome::Created)
    }

    async fn upsert(&self, index: &str, namespace: &str, records: &[VectorRecord]) -> Result<usize, StoreError> {
        self.check_available()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut indexes = self.indexes.write();
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;

        let dim = idx.descriptor.dimension;
        // Validate the whole batch first so a bad record writes nothing.
        if let Some(bad) = records.iter().find(|r| r.values.len() != dim) {
            return Err(StoreError::DimensionMismatch {
                id: Some(bad.id.clone()),
                expected: dim,
                got: bad.values.len(),
            });
        }

        let metric = idx.descriptor.metric;
        let ns = idx.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            ns.upsert(metric, record);
        }
        Ok(records.len())
    }

    async fn query(&self, index: &str, request: &QueryRequest) -> Result<QueryResult, StoreError> {
        self.check_available()?;
        if let Some(latency) = self.query_latency {
            tokio::time::sleep(latency).await;
        }
        let indexes = self.indexes.read();
        let idx = indexes
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        if request.vector.len() != idx.descriptor.dimension {
            return Err(StoreError::DimensionMismatch {
                id: None,
                expected: idx.descriptor.dimension,
                got: request.vector.len(),
            });
        }
        let matches = idx
            .namespaces
            .get(&request.namespace)
            .map(|ns| ns.search(idx.descriptor.metric, request))
            .unwrap_or_default();
        Ok(QueryResult { matches, namespace: request.namespace.clone() })
    }
}

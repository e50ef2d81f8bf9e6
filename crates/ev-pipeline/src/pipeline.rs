//! The embed → ensure index → upsert → query run.

use ev_core::{
    DeploymentSpec, DistanceMetric, EmbedVecConfig, EmbeddingVector, IndexDescriptor, Metadata,
    PartialEmbeddingPolicy, VectorRecord,
};
use ev_embed::EmbeddingClient;
use ev_vectordb::{EnsureOutcome, IndexManager, VectorStore};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StageError;
use crate::report::{ItemFailure, PipelineReport};
use crate::request::{PipelineRequest, QuerySource};
use crate::state::{PipelineState, Stage};

/// Index dimension when nothing embedded and the model is not in the catalog.
pub const FALLBACK_DIMENSION: usize = 3072;

/// Metadata key holding the source text of an upserted record.
pub const TEXT_METADATA_KEY: &str = "text";

/// Per-run knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub model: String,
    pub index_name: String,
    pub metric: DistanceMetric,
    pub spec: DeploymentSpec,
    pub top_k: usize,
    pub include_values: bool,
    pub concurrency: usize,
    /// `None` disables the per-stage timeout.
    pub stage_timeout: Option<Duration>,
    pub partial_policy: PartialEmbeddingPolicy,
    pub store_text: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &EmbedVecConfig) -> Self {
        Self {
            model: config.embedding.model.clone(),
            index_name: config.store.index_name.clone(),
            metric: config.store.metric,
            spec: DeploymentSpec::serverless(config.store.cloud.clone(), config.store.region.clone()),
            top_k: config.query.top_k,
            include_values: config.query.include_values,
            concurrency: config.embedding.concurrency,
            stage_timeout: Some(config.stage_timeout()),
            partial_policy: config.pipeline.partial_policy,
            store_text: true,
        }
    }

    /// Checks that must hold before anything is embedded or written.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.top_k == 0 {
            return Err(StageError::InvalidRequest("top_k must be at least 1".into()));
        }
        if self.stage_timeout == Some(Duration::ZERO) {
            return Err(StageError::InvalidRequest("stage timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&EmbedVecConfig::default())
    }
}

/// Runs one request end to end against injected clients.
///
/// The pipeline owns no mutable state of its own; every run produces a fresh
/// [`PipelineReport`]. Failures never panic: the report carries the stage,
/// a structured summary, and the typed cause.
pub struct Pipeline {
    embedder: Arc<dyn EmbeddingClient>,
    indexes: Arc<IndexManager>,
    store: Arc<VectorStore>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        indexes: Arc<IndexManager>,
        store: Arc<VectorStore>,
        options: PipelineOptions,
    ) -> Self {
        Self { embedder, indexes, store, options }
    }

    pub async fn run(&self, request: &PipelineRequest) -> PipelineReport {
        let mut report = PipelineReport::start(&self.options.model, &self.options.index_name);
        tracing::info!(
            run_id = %report.run_id,
            index = %self.options.index_name,
            model = %self.options.model,
            inputs = request.inputs.len(),
            "pipeline run started"
        );
        report.enter(PipelineState::Embedding);
        if let Err(e) = self.options.validate().and_then(|()| request.validate()) {
            return report.fail(Stage::Embedding, e);
        }

        // Embedding
        let texts = request.texts();
        let results = match self
            .staged(
                Stage::Embedding,
                self.embedder.embed_all(&texts, &self.options.model, self.options.concurrency),
            )
            .await
        {
            Ok(results) => results,
            Err(e) => return report.fail(Stage::Embedding, e),
        };

        let mut vectors: Vec<Option<EmbeddingVector>> = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(vector) => vectors.push(Some(vector)),
                Err(error) => {
                    tracing::warn!(run_id = %report.run_id, input = index, kind = error.kind(), error = %error, "input failed to embed");
                    report.embedding_failures.push(ItemFailure { index, error });
                    vectors.push(None);
                }
            }
        }
        report.embedded = vectors.iter().filter(|v| v.is_some()).count();

        let dimension = self.derive_dimension(&vectors);
        report.dimension = Some(dimension);
        if let Some((index, got)) = vectors
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.as_ref().filter(|v| v.len() != dimension).map(|v| (i, v.len())))
        {
            return report.fail(Stage::Embedding, StageError::InconsistentDimension { index, expected: dimension, got });
        }

        let first_failure = report.embedding_failures.first().map(|f| (f.index, f.error.clone()));
        if let Some((first_index, first)) = first_failure {
            if self.options.partial_policy == PartialEmbeddingPolicy::Abort {
                let cause = StageError::EmbeddingAborted {
                    failed: report.embedding_failures.len(),
                    total: vectors.len(),
                    first_index,
                    first,
                };
                return report.fail(Stage::Embedding, cause);
            }
            tracing::warn!(
                failed = report.embedding_failures.len(),
                embedded = report.embedded,
                "continuing with the inputs that embedded"
            );
        }

        // Ensure index
        let descriptor = IndexDescriptor::new(self.options.index_name.clone(), dimension)
            .with_metric(self.options.metric)
            .with_spec(self.options.spec.clone());
        let outcome = match self.attempt(Stage::EnsureIndex, self.indexes.ensure_index(&descriptor)).await {
            Ok(outcome) => outcome,
            Err(e) => return report.fail(Stage::EnsureIndex, e),
        };
        if let EnsureOutcome::Created(_) = outcome {
            self.store.forget(&descriptor.name);
        }
        report.index = Some(outcome);
        report.enter(PipelineState::IndexEnsured);

        // Upsert
        let records = self.records(request, &vectors);
        let summary = match self.attempt(Stage::Upsert, self.store.upsert(&descriptor.name, &records)).await {
            Ok(summary) => summary,
            Err(e) => return report.fail(Stage::Upsert, e),
        };
        report.upserted = summary.upserted_count;
        report.enter(PipelineState::Upserted);

        // Query
        let vector = match &request.query {
            QuerySource::Probe(probe) => probe.as_slice(),
            QuerySource::Input(i) => match vectors.get(*i).and_then(Option::as_ref) {
                Some(v) => v.as_slice(),
                None => return report.fail(Stage::Query, StageError::QueryInputUnavailable(*i)),
            },
        };
        let query = self.store.query(&descriptor.name, vector, self.options.top_k, self.options.include_values);
        let result = match self.attempt(Stage::Query, query).await {
            Ok(result) => result,
            Err(e) => return report.fail(Stage::Query, e),
        };
        report.query = Some(result);
        report.enter(PipelineState::Queried);

        report.finish()
    }

    /// First successful embedding, then the catalog, then [`FALLBACK_DIMENSION`].
    fn derive_dimension(&self, vectors: &[Option<EmbeddingVector>]) -> usize {
        vectors
            .iter()
            .flatten()
            .map(Vec::len)
            .next()
            .or_else(|| self.embedder.catalog().dimension(&self.options.model))
            .unwrap_or(FALLBACK_DIMENSION)
    }

    fn records(&self, request: &PipelineRequest, vectors: &[Option<EmbeddingVector>]) -> Vec<VectorRecord> {
        request
            .inputs
            .iter()
            .zip(vectors)
            .filter_map(|(input, vector)| {
                let id = input.record_id.as_ref()?;
                let values = vector.as_ref()?;
                let record = VectorRecord::new(id.clone(), values.clone());
                if !self.options.store_text {
                    return Some(record);
                }
                let mut metadata = Metadata::new();
                metadata.insert(TEXT_METADATA_KEY.into(), Value::String(input.text.clone()));
                Some(record.with_metadata(metadata))
            })
            .collect()
    }

    async fn staged<F, T>(&self, stage: Stage, fut: F) -> Result<T, StageError>
    where
        F: Future<Output = T>,
    {
        match self.options.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                tracing::warn!(stage = %stage, timeout = ?limit, "stage cancelled");
                StageError::Cancelled { stage, timeout: limit }
            }),
            None => Ok(fut.await),
        }
    }

    async fn attempt<F, T, E>(&self, stage: Stage, fut: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageError>,
    {
        self.staged(stage, fut).await?.map_err(Into::into)
    }
}

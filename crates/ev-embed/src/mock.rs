//! Deterministic embedding client for tests and offline runs.

use async_trait::async_trait;
use ev_core::{EmbeddingError, EmbeddingRequest, EmbeddingVector};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::client::EmbeddingClient;
use crate::models::ModelCatalog;

/// Produces the same vector for the same text on every call.
///
/// Failures and fixed vectors can be scripted per text, and an optional
/// latency makes calls yield so concurrency can be observed.
#[derive(Default)]
pub struct MockEmbeddingClient {
    catalog: ModelCatalog,
    failures: HashMap<String, EmbeddingError>,
    fixed: HashMap<String, EmbeddingVector>,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockEmbeddingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, e.g. a tiny dimension for readable tests.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, dimension: usize) -> Self {
        self.catalog.register(name, dimension);
        self
    }

    /// Fail every call for `text` with `error`.
    #[must_use]
    pub fn with_failure(mut self, text: impl Into<String>, error: EmbeddingError) -> Self {
        self.failures.insert(text.into(), error);
        self
    }

    /// Return exactly `vector` for `text`.
    #[must_use]
    pub fn with_vector(mut self, text: impl Into<String>, vector: EmbeddingVector) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Texts that reached the provider, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of simultaneous calls seen.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// The vector this client derives for `text` at `dimension`.
    pub fn vector_for(text: &str, dimension: usize) -> EmbeddingVector {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    async fn request_embedding(&self, request: &EmbeddingRequest) -> Result<EmbeddingVector, EmbeddingError> {
        self.calls.lock().push(request.text.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.failures.get(&request.text) {
            return Err(err.clone());
        }
        if let Some(vector) = self.fixed.get(&request.text) {
            return Ok(vector.clone());
        }
        let dimension = self.catalog.dimension(&request.model).unwrap_or_default();
        Ok(Self::vector_for(&request.text, dimension))
    }
}

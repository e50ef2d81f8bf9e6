use async_trait::async_trait;
use ev_core::{EmbeddingError, EmbeddingRequest, EmbeddingVector};
use futures::stream::{self, StreamExt};

use crate::models::ModelCatalog;

/// Turns text into fixed-dimension vectors.
///
/// Implementors provide `request_embedding`, the raw provider call. `embed`
/// wraps it with input validation and the dimension guarantee, and
/// `embed_all` fans a batch out with bounded concurrency.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Models this client can serve.
    fn catalog(&self) -> &ModelCatalog;

    /// One provider call for one text, no validation.
    async fn request_embedding(&self, request: &EmbeddingRequest) -> Result<EmbeddingVector, EmbeddingError>;

    /// Embed a single non-empty text. A success has exactly the model's dimension.
    async fn embed(&self, text: &str, model: &str) -> Result<EmbeddingVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text must not be empty".into()));
        }
        let catalog = self.catalog();
        let expected = catalog.dimension(model).ok_or_else(|| {
            EmbeddingError::InvalidInput(format!(
                "unsupported embedding model: {model} (known: {})",
                catalog.models().join(", ")
            ))
        })?;

        let request = EmbeddingRequest::new(text, model);
        let vector = self.request_embedding(&request).await?;
        if vector.len() != expected {
            return Err(EmbeddingError::Unknown(format!(
                "{} returned {} values for {model}, expected {expected}",
                self.name(),
                vector.len()
            )));
        }
        Ok(vector)
    }

    /// Embed every text, at most `concurrency` calls in flight.
    ///
    /// The output has one entry per input and `out[i]` belongs to `texts[i]`.
    /// A failed item never aborts its siblings.
    async fn embed_all(
        &self,
        texts: &[String],
        model: &str,
        concurrency: usize,
    ) -> Vec<Result<EmbeddingVector, EmbeddingError>> {
        let calls: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(idx, text)| async move { (idx, self.embed(text, model).await) })
            .collect();
        let mut indexed: Vec<(usize, Result<EmbeddingVector, EmbeddingError>)> = stream::iter(calls)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        // completion order is arbitrary
        indexed.sort_by_key(|(idx, _)| *idx);

        let failed = indexed.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(provider = self.name(), failed, total = texts.len(), "some embeddings failed");
        }
        indexed.into_iter().map(|(_, r)| r).collect()
    }
}

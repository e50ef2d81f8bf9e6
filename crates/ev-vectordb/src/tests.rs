use crate::*;
use crate::distance;
use crate::pinecone::map_status;
use ev_core::{DistanceMetric, IndexDescriptor, QueryRequest, StoreError, VectorRecord};
use reqwest::StatusCode;

// ========== Distance ==========

#[test]
fn test_inner_product() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![4.0, 5.0, 6.0];
    assert!((distance::inner_product(&a, &b) - 32.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_identical() {
    let a = vec![1.0, 2.0, 3.0];
    assert!((distance::cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_zero_vector() {
    assert_eq!(distance::cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
}

#[test]
fn test_euclidean_score_is_similarity() {
    let near = distance::compute_score(DistanceMetric::Euclidean, &[0.0, 0.0], &[0.1, 0.0]);
    let far = distance::compute_score(DistanceMetric::Euclidean, &[0.0, 0.0], &[3.0, 4.0]);
    assert!(near > far);
    assert!((distance::compute_score(DistanceMetric::Euclidean, &[1.0], &[1.0]) - 1.0).abs() < 1e-6);
}

// ========== Memory Backend ==========

fn record(id: &str, values: &[f32]) -> VectorRecord {
    VectorRecord::new(id, values.to_vec())
}

async fn backend_with_index(metric: DistanceMetric) -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .create_index(&IndexDescriptor::new("test", 3).with_metric(metric))
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn test_memory_create_is_idempotent() {
    let backend = MemoryBackend::new();
    let desc = IndexDescriptor::new("test", 3);
    assert_eq!(backend.create_index(&desc).await.unwrap(), CreateOutcome::Created);
    assert_eq!(backend.create_index(&desc).await.unwrap(), CreateOutcome::AlreadyExists);
    assert_eq!(backend.list_indexes().await.unwrap().len(), 1);
    assert_eq!(backend.create_calls(), 2);
}

#[tokio::test]
async fn test_memory_ready_after_polls() {
    let backend = MemoryBackend::new().with_ready_after(2);
    backend.create_index(&IndexDescriptor::new("slow", 3)).await.unwrap();
    assert!(!backend.describe_index("slow").await.unwrap().ready);
    assert!(!backend.describe_index("slow").await.unwrap().ready);
    assert!(backend.describe_index("slow").await.unwrap().ready);
}

#[tokio::test]
async fn test_memory_describe_missing() {
    let backend = MemoryBackend::new();
    assert!(matches!(backend.describe_index("nope").await, Err(StoreError::IndexNotFound(_))));
}

#[tokio::test]
async fn test_memory_upsert_overwrites() {
    let backend = backend_with_index(DistanceMetric::Cosine).await;
    backend.upsert("test", "", &[record("a", &[1.0, 0.0, 0.0])]).await.unwrap();
    backend.upsert("test", "", &[record("a", &[0.0, 1.0, 0.0])]).await.unwrap();
    assert_eq!(backend.record_count("test"), 1);
    assert_eq!(backend.fetch("test", "a").unwrap(), vec![0.0, 1.0, 0.0]);
}

#[tokio::test]
async fn test_memory_upsert_rejects_whole_batch() {
    let backend = backend_with_index(DistanceMetric::Cosine).await;
    let err = backend
        .upsert("test", "", &[record("ok", &[1.0, 0.0, 0.0]), record("bad", &[1.0])])
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::DimensionMismatch { id: Some("bad".into()), expected: 3, got: 1 });
    assert_eq!(backend.record_count("test"), 0);
}

#[tokio::test]
async fn test_memory_query_ranks_by_similarity() {
    let backend = backend_with_index(DistanceMetric::Cosine).await;
    backend
        .upsert(
            "test",
            "",
            &[
                record("x", &[1.0, 0.0, 0.0]),
                record("y", &[0.0, 1.0, 0.0]),
                record("xy", &[1.0, 1.0, 0.0]),
            ],
        )
        .await
        .unwrap();
    let result = backend
        .query("test", &QueryRequest::new(vec![1.0, 0.1, 0.0], 3))
        .await
        .unwrap();
    assert_eq!(result.ids(), vec!["x", "xy", "y"]);
    assert!(result.matches[0].values.is_none());
}

#[tokio::test]
async fn test_memory_query_include_values_returns_raw() {
    let backend = backend_with_index(DistanceMetric::Cosine).await;
    backend.upsert("test", "", &[record("a", &[3.0, 4.0, 0.0])]).await.unwrap();
    let result = backend
        .query("test", &QueryRequest::new(vec![3.0, 4.0, 0.0], 1).include_values(true))
        .await
        .unwrap();
    assert_eq!(result.matches[0].values.as_deref(), Some(&[3.0, 4.0, 0.0][..]));
    assert!((result.matches[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_memory_query_top_k_larger_than_count() {
    let backend = backend_with_index(DistanceMetric::DotProduct).await;
    backend.upsert("test", "", &[record("a", &[1.0, 0.0, 0.0])]).await.unwrap();
    let result = backend.query("test", &QueryRequest::new(vec![1.0, 0.0, 0.0], 10)).await.unwrap();
    assert_eq!(result.len(), 1);
}

#[tokio::test]
async fn test_memory_query_namespace_isolated() {
    let backend = backend_with_index(DistanceMetric::Cosine).await;
    backend.upsert("test", "other", &[record("a", &[1.0, 0.0, 0.0])]).await.unwrap();
    let result = backend.query("test", &QueryRequest::new(vec![1.0, 0.0, 0.0], 1)).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_memory_unavailable() {
    let backend = MemoryBackend::new();
    backend.set_unavailable(true);
    assert!(matches!(backend.list_indexes().await, Err(StoreError::Unavailable(_))));
    backend.set_unavailable(false);
    assert!(backend.list_indexes().await.is_ok());
}

// ========== Pinecone status mapping ==========

#[test]
fn test_pinecone_status_mapping() {
    assert_eq!(
        map_status(StatusCode::NOT_FOUND, "missing", Some("idx")),
        StoreError::IndexNotFound("idx".into())
    );
    assert!(matches!(map_status(StatusCode::BAD_REQUEST, "bad", None), StoreError::InvalidRequest(_)));
    assert!(matches!(map_status(StatusCode::TOO_MANY_REQUESTS, "slow", None), StoreError::Unavailable(_)));
    assert!(matches!(map_status(StatusCode::INTERNAL_SERVER_ERROR, "boom", None), StoreError::Unavailable(_)));
    assert!(matches!(map_status(StatusCode::UNAUTHORIZED, "key", None), StoreError::Unknown(_)));
}

#[test]
fn test_pinecone_requires_key() {
    assert!(PineconeBackend::new("  ").is_err());
}

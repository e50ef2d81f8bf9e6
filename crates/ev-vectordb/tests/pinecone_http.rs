//! PineconeBackend against a local fake of the control and data planes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ev_core::{DeploymentSpec, DistanceMetric, IndexDescriptor, QueryRequest, StoreError, VectorRecord};
use ev_vectordb::{CreateOutcome, IndexManager, PineconeBackend, VectorBackend, VectorStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    base: String,
    indexes: HashMap<String, Value>,
    vectors: HashMap<String, Vec<Value>>,
    create_bodies: Vec<Value>,
    api_keys: Vec<String>,
}

type Shared = Arc<Mutex<FakeState>>;

fn record_key(state: &Shared, headers: &HeaderMap) {
    if let Some(key) = headers.get("api-key").and_then(|v| v.to_str().ok()) {
        state.lock().unwrap().api_keys.push(key.to_string());
    }
}

async fn list_indexes(State(state): State<Shared>, headers: HeaderMap) -> Json<Value> {
    record_key(&state, &headers);
    let s = state.lock().unwrap();
    Json(json!({ "indexes": s.indexes.values().cloned().collect::<Vec<_>>() }))
}

async fn describe_index(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    let s = state.lock().unwrap();
    match s.indexes.get(&name) {
        Some(model) => Json(model.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": {"code": "NOT_FOUND", "message": "not found"}}))).into_response(),
    }
}

async fn create_index(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.create_bodies.push(body.clone());
    let name = body["name"].as_str().unwrap_or_default().to_string();
    if s.indexes.contains_key(&name) {
        return (StatusCode::CONFLICT, Json(json!({"error": {"code": "ALREADY_EXISTS", "message": "exists"}}))).into_response();
    }
    let model = json!({
        "name": name,
        "dimension": body["dimension"],
        "metric": body["metric"],
        "host": format!("{}/data/{}", s.base, name),
        "spec": body["spec"],
        "status": {"ready": true, "state": "Ready"}
    });
    s.indexes.insert(name, model.clone());
    (StatusCode::CREATED, Json(model)).into_response()
}

async fn upsert(State(state): State<Shared>, Path(name): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    if !s.indexes.contains_key(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let vectors = body["vectors"].as_array().cloned().unwrap_or_default();
    let count = vectors.len();
    let stored = s.vectors.entry(name).or_default();
    for v in vectors {
        stored.retain(|existing| existing["id"] != v["id"]);
        stored.push(v);
    }
    Json(json!({ "upsertedCount": count })).into_response()
}

async fn query(State(state): State<Shared>, Path(name): Path<String>, Json(body): Json<Value>) -> Response {
    let s = state.lock().unwrap();
    let top_k = body["topK"].as_u64().unwrap_or(0) as usize;
    let include_values = body["includeValues"].as_bool().unwrap_or(false);
    let stored = s.vectors.get(&name).cloned().unwrap_or_default();
    let matches: Vec<Value> = stored
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(i, v)| {
            let values = if include_values { v["values"].clone() } else { json!([]) };
            json!({
                "id": v["id"],
                "score": 1.0 - i as f64 * 0.1,
                "values": values,
            })
        })
        .collect();
    Json(json!({ "matches": matches, "namespace": body["namespace"] })).into_response()
}

async fn spawn_fake() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeState::default()));
    let app = Router::new()
        .route("/indexes", get(list_indexes).post(create_index))
        .route("/indexes/{name}", get(describe_index))
        .route("/data/{name}/vectors/upsert", post(upsert))
        .route("/data/{name}/query", post(query))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    state.lock().unwrap().base = base.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, state)
}

fn backend(base: &str) -> PineconeBackend {
    PineconeBackend::new("pc-test").unwrap().with_control_url(base)
}

#[tokio::test]
async fn test_create_sends_serverless_spec() {
    let (base, state) = spawn_fake().await;
    let pc = backend(&base);
    let desc = IndexDescriptor::new("embeddings-index", 3072)
        .with_metric(DistanceMetric::Cosine)
        .with_spec(DeploymentSpec::serverless("aws", "us-east-1"));
    assert_eq!(pc.create_index(&desc).await.unwrap(), CreateOutcome::Created);

    let s = state.lock().unwrap();
    assert_eq!(
        s.create_bodies[0],
        json!({
            "name": "embeddings-index",
            "dimension": 3072,
            "metric": "cosine",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
        })
    );
}

#[tokio::test]
async fn test_create_conflict_is_already_exists() {
    let (base, _state) = spawn_fake().await;
    let pc = backend(&base);
    let desc = IndexDescriptor::new("dup", 4);
    pc.create_index(&desc).await.unwrap();
    assert_eq!(pc.create_index(&desc).await.unwrap(), CreateOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_list_and_describe() {
    let (base, state) = spawn_fake().await;
    let pc = backend(&base);
    pc.create_index(&IndexDescriptor::new("listed", 4).with_metric(DistanceMetric::DotProduct)).await.unwrap();

    let list = pc.list_indexes().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "listed");
    assert_eq!(list[0].metric, DistanceMetric::DotProduct);
    assert!(list[0].ready);
    assert_eq!(state.lock().unwrap().api_keys, vec!["pc-test".to_string()]);

    assert!(matches!(pc.describe_index("absent").await, Err(StoreError::IndexNotFound(name)) if name == "absent"));
}

#[tokio::test]
async fn test_upsert_and_query_round_trip_through_store() {
    let (base, _state) = spawn_fake().await;
    let pc: Arc<dyn VectorBackend> = Arc::new(backend(&base));
    let manager = IndexManager::new(pc.clone());
    let store = VectorStore::new(pc.clone());

    manager.ensure_index(&IndexDescriptor::new("demo", 3)).await.unwrap();
    let summary = store
        .upsert(
            "demo",
            &[VectorRecord::new("artichoke", vec![0.1, 0.2, 0.3]), VectorRecord::new("marmalade", vec![0.3, 0.2, 0.1])],
        )
        .await
        .unwrap();
    assert_eq!(summary.upserted_count, 2);

    let result = store.query("demo", &[0.1, 0.2, 0.3], 3, true).await.unwrap();
    assert_eq!(result.ids(), vec!["artichoke", "marmalade"]);
    assert_eq!(result.matches[0].values.as_deref(), Some(&[0.1f32, 0.2, 0.3][..]));

    let bare = pc.query("demo", &QueryRequest::new(vec![0.1, 0.2, 0.3], 1)).await.unwrap();
    assert_eq!(bare.len(), 1);
    assert!(bare.matches[0].values.is_none());
}

#[tokio::test]
async fn test_ensure_existing_over_http_no_second_create() {
    let (base, state) = spawn_fake().await;
    let pc: Arc<dyn VectorBackend> = Arc::new(backend(&base));
    let manager = IndexManager::new(pc);
    let desc = IndexDescriptor::new("once", 4);
    manager.ensure_index(&desc).await.unwrap();
    manager.ensure_index(&desc).await.unwrap();
    assert_eq!(state.lock().unwrap().create_bodies.len(), 1);
}

#[tokio::test]
async fn test_upsert_unknown_index_over_http() {
    let (base, _state) = spawn_fake().await;
    let pc = backend(&base);
    let err = pc.upsert("ghost", "", &[VectorRecord::new("a", vec![1.0])]).await.unwrap_err();
    assert_eq!(err, StoreError::IndexNotFound("ghost".into()));
}

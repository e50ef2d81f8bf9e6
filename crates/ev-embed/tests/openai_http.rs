//! OpenAI client against a local fake of the embeddings endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use ev_core::EmbeddingError;
use ev_embed::{EmbeddingClient, ModelCatalog, OpenAiEmbeddingClient};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct FakeOpenAi {
    requests: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

async fn embeddings(State(fake): State<FakeOpenAi>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    fake.requests.lock().unwrap().push(body.clone());
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        fake.auth.lock().unwrap().push(auth.to_string());
    }

    let input = body["input"].as_str().unwrap_or_default();
    match input {
        "rate me" => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "3")],
            Json(json!({"error": {"message": "Rate limit reached", "type": "requests"}})),
        )
            .into_response(),
        "break me" => (StatusCode::BAD_GATEWAY, "upstream exploded").into_response(),
        "too long" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "maximum context length exceeded"}})),
        )
            .into_response(),
        _ => {
            let dim = if body["model"] == "tiny" { 4 } else { 3072 };
            let embedding: Vec<f32> = (0..dim).map(|i| i as f32 / dim as f32).collect();
            Json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": embedding}],
                "model": body["model"],
                "usage": {"prompt_tokens": 8, "total_tokens": 8}
            }))
            .into_response()
        }
    }
}

async fn spawn_fake() -> (String, FakeOpenAi) {
    let fake = FakeOpenAi::default();
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .with_state(fake.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), fake)
}

fn client(base_url: &str) -> OpenAiEmbeddingClient {
    OpenAiEmbeddingClient::new("sk-test")
        .unwrap()
        .with_base_url(base_url)
        .with_catalog(ModelCatalog::default().with_model("tiny", 4))
}

#[tokio::test]
async fn test_embed_sends_float_encoding_and_bearer() {
    let (url, fake) = spawn_fake().await;
    let v = client(&url)
        .embed("The artichoke is the finest of all vegetables.", "text-embedding-3-large")
        .await
        .unwrap();
    assert_eq!(v.len(), 3072);

    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests[0]["encoding_format"], "float");
    assert_eq!(requests[0]["model"], "text-embedding-3-large");
    assert_eq!(requests[0]["input"], "The artichoke is the finest of all vegetables.");
    assert_eq!(fake.auth.lock().unwrap()[0], "Bearer sk-test");
}

#[tokio::test]
async fn test_rate_limit_maps_with_retry_after() {
    let (url, _fake) = spawn_fake().await;
    let err = client(&url).embed("rate me", "tiny").await.unwrap_err();
    match err {
        EmbeddingError::RateLimited { message, retry_after } => {
            assert!(message.contains("Rate limit reached"));
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(3)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let (url, _fake) = spawn_fake().await;
    let err = client(&url).embed("break me", "tiny").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::ProviderUnavailable(msg) if msg.contains("upstream exploded")));
}

#[tokio::test]
async fn test_bad_request_maps_to_invalid_input() {
    let (url, _fake) = spawn_fake().await;
    let err = client(&url).embed("too long", "tiny").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidInput(msg) if msg.contains("maximum context length")));
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = client(&format!("http://{addr}/v1")).embed("hello", "tiny").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn test_embed_all_mixed_results_over_http() {
    let (url, fake) = spawn_fake().await;
    let texts: Vec<String> = ["first", "rate me", "third"].iter().map(|s| s.to_string()).collect();
    let results = client(&url).embed_all(&texts, "tiny", 2).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().len(), 4);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().len(), 4);
    assert_eq!(fake.requests.lock().unwrap().len(), 3);
}

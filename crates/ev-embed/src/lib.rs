//! Text embedding clients.
//!
//! `EmbeddingClient` is the seam the pipeline talks to. `OpenAiEmbeddingClient`
//! calls the hosted API; `MockEmbeddingClient` produces deterministic vectors
//! for tests and offline runs.

pub mod client;
pub mod mock;
pub mod models;
pub mod openai;

pub use client::EmbeddingClient;
pub use mock::MockEmbeddingClient;
pub use models::ModelCatalog;
pub use openai::OpenAiEmbeddingClient;

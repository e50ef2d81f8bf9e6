//! Vector store access: index provisioning, upsert and top-K query.
//!
//! `VectorBackend` is the wire seam. `PineconeBackend` talks to the hosted
//! service; `MemoryBackend` keeps flat in-process indexes with exact search.
//! `IndexManager` and `VectorStore` sit on top of either.

pub mod backend;
pub mod distance;
pub mod manager;
pub mod memory;
pub mod pinecone;
pub mod store;

pub use backend::{CreateOutcome, VectorBackend};
pub use manager::{DescriptorMismatch, EnsureOutcome, IndexManager};
pub use memory::MemoryBackend;
pub use pinecone::PineconeBackend;
pub use store::VectorStore;

#[cfg(test)]
mod tests;

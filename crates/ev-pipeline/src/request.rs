use ev_core::EmbeddingVector;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::StageError;

/// One text to embed. Only inputs with a `record_id` are written to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedInput {
    pub text: String,
    pub record_id: Option<String>,
}

impl EmbedInput {
    /// Embedded and upserted under `id`.
    pub fn stored(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { text: text.into(), record_id: Some(id.into()) }
    }

    /// Embedded but never upserted.
    pub fn transient(text: impl Into<String>) -> Self {
        Self { text: text.into(), record_id: None }
    }
}

/// The vector a run queries with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    /// The embedding of input `i`.
    Input(usize),
    /// A caller-supplied vector.
    Probe(EmbeddingVector),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRequest {
    pub inputs: Vec<EmbedInput>,
    pub query: QuerySource,
}

impl PipelineRequest {
    pub fn new(inputs: Vec<EmbedInput>, query: QuerySource) -> Self {
        Self { inputs, query }
    }

    pub fn texts(&self) -> Vec<String> {
        self.inputs.iter().map(|i| i.text.clone()).collect()
    }

    /// Checks that hold before any provider is called.
    pub fn validate(&self) -> Result<(), StageError> {
        if let QuerySource::Input(i) = self.query {
            if i >= self.inputs.len() {
                return Err(StageError::InvalidRequest(format!(
                    "query input {i} out of range for {} inputs",
                    self.inputs.len()
                )));
            }
        }
        let mut seen = HashSet::new();
        for id in self.inputs.iter().filter_map(|i| i.record_id.as_deref()) {
            if id.is_empty() {
                return Err(StageError::InvalidRequest("record ids must not be empty".into()));
            }
            if !seen.insert(id) {
                return Err(StageError::InvalidRequest(format!("duplicate record id: {id}")));
            }
        }
        Ok(())
    }
}

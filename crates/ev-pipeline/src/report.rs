use chrono::{DateTime, Utc};
use ev_core::{EmbeddingError, QueryResult};
use ev_vectordb::EnsureOutcome;
use serde::Serialize;
use uuid::Uuid;

use crate::error::StageError;
use crate::state::{PipelineState, Stage};

/// An input that did not embed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub error: EmbeddingError,
}

/// Structured account of the stage that stopped a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
    /// Items the run had completed when it stopped: embeddings for the
    /// first two stages, upserted records after that.
    pub succeeded_before_failure: usize,
    pub cause: StageError,
}

/// Everything one pipeline run did, in order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub model: String,
    pub index_name: String,
    pub states: Vec<PipelineState>,
    pub embedded: usize,
    pub embedding_failures: Vec<ItemFailure>,
    pub dimension: Option<usize>,
    pub index: Option<EnsureOutcome>,
    pub upserted: usize,
    pub query: Option<QueryResult>,
    pub failure: Option<FailureReport>,
}

impl PipelineReport {
    pub(crate) fn start(model: &str, index_name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            model: model.to_string(),
            index_name: index_name.to_string(),
            states: Vec::new(),
            embedded: 0,
            embedding_failures: Vec::new(),
            dimension: None,
            index: None,
            upserted: 0,
            query: None,
            failure: None,
        }
    }

    pub(crate) fn enter(&mut self, state: PipelineState) {
        tracing::info!(run_id = %self.run_id, state = state.name(), "pipeline state");
        self.states.push(state);
    }

    pub(crate) fn fail(mut self, stage: Stage, cause: StageError) -> Self {
        let succeeded_before_failure = match stage {
            Stage::Embedding | Stage::EnsureIndex => self.embedded,
            Stage::Upsert | Stage::Query => self.upserted,
        };
        tracing::warn!(
            run_id = %self.run_id,
            stage = %stage,
            kind = cause.kind(),
            error = %cause,
            "pipeline failed"
        );
        self.failure = Some(FailureReport {
            stage,
            kind: cause.kind(),
            message: cause.to_string(),
            retryable: cause.is_retryable(),
            succeeded_before_failure,
            cause: cause.clone(),
        });
        self.states.push(PipelineState::Failed { stage, cause });
        self.finished_at = Some(Utc::now());
        self
    }

    pub(crate) fn finish(mut self) -> Self {
        self.enter(PipelineState::Done);
        self.finished_at = Some(Utc::now());
        self
    }

    /// The last state reached.
    pub fn state(&self) -> Option<&PipelineState> {
        self.states.last()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state(), Some(PipelineState::Done))
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        self.failure.as_ref()
    }

    pub fn matched_ids(&self) -> Vec<&str> {
        self.query.as_ref().map(QueryResult::ids).unwrap_or_default()
    }

    pub fn state_names(&self) -> Vec<&'static str> {
        self.states.iter().map(PipelineState::name).collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

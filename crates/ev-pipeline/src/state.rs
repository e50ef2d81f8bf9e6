use serde::Serialize;
use std::fmt;

use crate::error::StageError;

/// A unit of work inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Embedding,
    EnsureIndex,
    Upsert,
    Query,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::EnsureIndex => "ensure_index",
            Self::Upsert => "upsert",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run is. `Failed` is terminal and reachable from every other state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Embedding,
    IndexEnsured,
    Upserted,
    Queried,
    Done,
    Failed { stage: Stage, cause: StageError },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::IndexEnsured => "index_ensured",
            Self::Upserted => "upserted",
            Self::Queried => "queried",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

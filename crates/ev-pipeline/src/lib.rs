//! embedvec pipeline: embed → ensure index → upsert → query, with a typed report.

pub mod error;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod scenario;
pub mod state;

pub use error::StageError;
pub use pipeline::{Pipeline, PipelineOptions, FALLBACK_DIMENSION};
pub use report::{FailureReport, ItemFailure, PipelineReport};
pub use request::{EmbedInput, PipelineRequest, QuerySource};
pub use state::{PipelineState, Stage};

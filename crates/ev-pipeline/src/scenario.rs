//! The literary demo run.

use crate::request::{EmbedInput, PipelineRequest, QuerySource};

pub const ARTICHOKE: &str = "The artichoke is the finest of all vegetables.";
pub const MARMALADE: &str = "A nun writing her name in marmalade on a soldier's leg.";
pub const MOON: &str = "Light coursing from a swarming moon that careens in frozen ecstasy across the sky";

/// Eight-value probe. Against a 3072-d index it fails with a dimension mismatch.
pub const PROBE_VECTOR: [f32; 8] = [0.3; 8];

/// Three texts; the first two are stored as `artichoke` and `marmalade`.
pub fn literary_inputs() -> Vec<EmbedInput> {
    vec![
        EmbedInput::stored("artichoke", ARTICHOKE),
        EmbedInput::stored("marmalade", MARMALADE),
        EmbedInput::transient(MOON),
    ]
}

/// Queries with the embedding of the unstored third text.
pub fn literary_request() -> PipelineRequest {
    PipelineRequest::new(literary_inputs(), QuerySource::Input(2))
}

pub fn literary_probe_request() -> PipelineRequest {
    PipelineRequest::new(literary_inputs(), QuerySource::Probe(PROBE_VECTOR.to_vec()))
}

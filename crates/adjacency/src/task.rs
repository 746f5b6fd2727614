use adjacency_common::{AdjacencyRecord, LayerResult, MeasureParams};
use thiserror::Error;

use crate::backend::{Backend, ScoringError, SourceError};

/// Per-layer failure, surfaced to the driver without touching other layers
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("scoring error: {0}")]
    Scoring(#[from] ScoringError),
}

/// Run the unit of work for one layer: source, pre-filter, batch score.
///
/// An empty result (no adjacent pairs found) is a valid outcome, not an
/// error. This function never writes to the result store; persistence is
/// the driver's job.
pub fn run_layer<B: Backend>(
    backend: &B,
    layer: &str,
    params: &MeasureParams,
) -> Result<LayerResult, TaskError> {
    let boundaries =
        backend.boundaries_in_layer(layer, params.area_threshold, params.bbox_scale)?;
    let pairs = backend.candidate_pairs(&boundaries);
    let scored = backend.score(&pairs, params.pixel_radius)?;

    Ok(scored
        .iter()
        .map(|(a, b, value)| AdjacencyRecord::between(a, b, *value))
        .collect())
}

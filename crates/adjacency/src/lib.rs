//! Layer-adjacency processing pipeline.
//!
//! The crate is organized around a [`backend::Backend`] seam: a backend
//! supplies boundaries for a layer, pre-filters candidate pairs by bounding
//! box, and scores each candidate pair. On top of that seam sit the unit of
//! work ([`task::run_layer`]), the worker-pool scheduler
//! ([`scheduler::run_all`]), the durable result store
//! ([`store::ResultStore`]), and the thin run driver ([`driver::run`]) that
//! sequences reserve / schedule / commit.

pub mod backend;
pub mod driver;
pub mod scheduler;
pub mod store;
pub mod task;

use thiserror::Error;

pub use adjacency_common::{AdjacencyRecord, BoundaryInfo, LayerResult, MeasureParams};
pub use backend::{Backend, BackendFactory, ScoringError, SourceError};
pub use driver::{RunConfig, RunReport};
pub use store::{ResultDocument, ResultStore, StoreError};
pub use task::TaskError;

/// Top-level error for a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("scoring error: {0}")]
    Scoring(#[from] ScoringError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<TaskError> for PipelineError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Source(e) => PipelineError::Source(e),
            TaskError::Scoring(e) => PipelineError::Scoring(e),
        }
    }
}

use adjacency_common::BoundaryInfo;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read annotation document: {0}")]
    Document(String),
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    #[error("malformed geometry in layer {layer}: {detail}")]
    Geometry { layer: String, detail: String },
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("scorer rejected batch: {0}")]
    RejectedBatch(String),
}

/// A backend that can read layers and measure boundary adjacency.
///
/// One trait covers the three collaborator roles of a layer task:
/// the boundary source (`list_layers`, `boundaries_in_layer`), the
/// bounding-box overlap pre-filter (`candidate_pairs`), and the adjacency
/// scorer (`score`). A backend instance is owned by a single worker; it is
/// never shared across threads (see [`BackendFactory`]).
pub trait Backend {
    /// The backend's boundary representation. The pipeline only needs its
    /// name/index identity; geometry stays private to the backend.
    type Boundary: BoundaryInfo + Clone + Send;

    /// All layer names known to the annotation document, in document order
    fn list_layers(&self) -> Vec<String>;

    /// Boundaries in `layer` with area at least `area_threshold`, each
    /// carrying a bounding box scaled by `bbox_scale`
    fn boundaries_in_layer(
        &self,
        layer: &str,
        area_threshold: f64,
        bbox_scale: f64,
    ) -> Result<Vec<Self::Boundary>, SourceError>;

    /// Unordered pairs of boundaries whose scaled bounding boxes intersect
    fn candidate_pairs(
        &self,
        boundaries: &[Self::Boundary],
    ) -> Vec<(Self::Boundary, Self::Boundary)>;

    /// Score a whole batch of candidate pairs at the given pixel radius.
    ///
    /// Batching lets the scorer share precomputed spatial structures across
    /// the candidate set instead of re-deriving them per pair. Pairs that
    /// turn out not to be adjacent are omitted from the output; the output
    /// order is the scorer's native order and is preserved downstream.
    fn score(
        &self,
        pairs: &[(Self::Boundary, Self::Boundary)],
        pixel_radius: u32,
    ) -> Result<Vec<(Self::Boundary, Self::Boundary, f64)>, ScoringError>;
}

/// Opens an independent [`Backend`] per worker.
///
/// The annotation document is too large to share a single mutable parsed
/// representation across workers, so each worker re-acquires its own
/// read-only view through this factory.
pub trait BackendFactory: Sync {
    type Backend: Backend;

    fn open(&self) -> Result<Self::Backend, SourceError>;
}

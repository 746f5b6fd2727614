//! TrakEM2 backend for the layer-adjacency pipeline.
//!
//! Reads a TrakEM2 project file and implements the pipeline's backend seam:
//! listing layers, extracting thresholded area-list boundaries with scaled
//! bounding boxes, pre-filtering candidate pairs by box overlap, and scoring
//! adjacency by counting boundary points within a pixel radius.

pub mod boundary;
pub mod document;
pub mod scorer;

use std::path::{Path, PathBuf};

use adjacency::{Backend, BackendFactory, ScoringError, SourceError};
use geo::Intersects;
use thiserror::Error;

pub use boundary::AreaBoundary;
pub use document::Trakem2Document;

pub type Result<T> = std::result::Result<T, Trakem2Error>;

#[derive(Error, Debug)]
pub enum Trakem2Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("project file is not well-formed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("bad attribute in project file: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("<{element}> is missing the {attribute} attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("bad transform attribute: {0}")]
    BadTransform(String),

    #[error("bad path data: {0}")]
    BadPath(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("boundary {name}[{index}] has an empty outline")]
    EmptyOutline { name: String, index: u32 },
}

/// A parsed TrakEM2 project acting as boundary source, overlap filter, and
/// adjacency scorer for one worker
pub struct Trakem2Backend {
    doc: Trakem2Document,
}

impl Trakem2Backend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            doc: Trakem2Document::open(path)?,
        })
    }

    pub fn from_xml(content: &str) -> Result<Self> {
        Ok(Self {
            doc: Trakem2Document::from_xml(content)?,
        })
    }

    pub fn document(&self) -> &Trakem2Document {
        &self.doc
    }
}

impl Backend for Trakem2Backend {
    type Boundary = AreaBoundary;

    fn list_layers(&self) -> Vec<String> {
        self.doc.layer_names()
    }

    fn boundaries_in_layer(
        &self,
        layer: &str,
        area_threshold: f64,
        bbox_scale: f64,
    ) -> std::result::Result<Vec<AreaBoundary>, SourceError> {
        self.doc
            .boundaries_in_layer(layer, area_threshold, bbox_scale)
            .map_err(|err| match err {
                Trakem2Error::UnknownLayer(name) => SourceError::UnknownLayer(name),
                other => SourceError::Geometry {
                    layer: layer.to_string(),
                    detail: other.to_string(),
                },
            })
    }

    fn candidate_pairs(
        &self,
        boundaries: &[AreaBoundary],
    ) -> Vec<(AreaBoundary, AreaBoundary)> {
        let mut pairs = Vec::new();
        for i in 0..boundaries.len() {
            for j in (i + 1)..boundaries.len() {
                if boundaries[i].bbox.intersects(&boundaries[j].bbox) {
                    pairs.push((boundaries[i].clone(), boundaries[j].clone()));
                }
            }
        }
        pairs
    }

    fn score(
        &self,
        pairs: &[(AreaBoundary, AreaBoundary)],
        pixel_radius: u32,
    ) -> std::result::Result<Vec<(AreaBoundary, AreaBoundary, f64)>, ScoringError> {
        scorer::score_batch(pairs, pixel_radius)
            .map_err(|err| ScoringError::RejectedBatch(err.to_string()))
    }
}

/// Opens an independent backend per worker; each worker re-parses the
/// project file rather than sharing parsed state
pub struct Trakem2Factory {
    path: PathBuf,
}

impl Trakem2Factory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackendFactory for Trakem2Factory {
    type Backend = Trakem2Backend;

    fn open(&self) -> std::result::Result<Trakem2Backend, SourceError> {
        Trakem2Backend::open(&self.path).map_err(|err| SourceError::Document(err.to_string()))
    }
}

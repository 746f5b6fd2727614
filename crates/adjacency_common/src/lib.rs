//! # Adjacency Common - Shared Types for the Adjacency Toolkit
//!
//! A foundational library providing the shared data model used by the
//! layer-adjacency pipeline and its backends.
//!
//! ## Example
//!
//! ```rust
//! use adjacency_common::{AdjacencyRecord, MeasureParams};
//!
//! // Measurement parameters with the conventional defaults
//! let params = MeasureParams::default();
//! assert_eq!(params.pixel_radius, 10);
//!
//! // One unit of output: two named boundaries and their adjacency score
//! let record = AdjacencyRecord {
//!     cell1: "ADAL".to_string(),
//!     cell2: "AVAR".to_string(),
//!     index1: 0,
//!     index2: 1,
//!     adjacency: 3.5,
//! };
//! println!("{} | {} -> {}", record.cell1, record.cell2, record.adjacency);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for data-model operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Validation errors for the shared data model
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("bounding box scale must be positive, got {scale}")]
    InvalidBoundingBoxScale { scale: f64 },

    #[error("area threshold must be non-negative, got {threshold}")]
    InvalidAreaThreshold { threshold: f64 },
}

/// Identity of a boundary ("area list") within a layer.
///
/// Names are anatomical labels and may repeat within a layer; the index
/// disambiguates boundaries sharing a name.
pub trait BoundaryInfo {
    fn name(&self) -> &str;
    fn index(&self) -> u32;
}

/// One unit of output: a pair of boundaries and their adjacency score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyRecord {
    /// Name of boundary A
    pub cell1: String,
    /// Name of boundary B
    pub cell2: String,
    /// Index of boundary A within its layer
    pub index1: u32,
    /// Index of boundary B within its layer
    pub index2: u32,
    /// Numeric adjacency measure between the two boundaries
    pub adjacency: f64,
}

impl AdjacencyRecord {
    /// Build a record from the two boundaries of a scored pair
    pub fn between<B: BoundaryInfo>(a: &B, b: &B, adjacency: f64) -> Self {
        Self {
            cell1: a.name().to_string(),
            cell2: b.name().to_string(),
            index1: a.index(),
            index2: b.index(),
            adjacency,
        }
    }
}

/// All adjacency records for one layer, in scorer output order
pub type LayerResult = Vec<AdjacencyRecord>;

/// Measurement parameters shared by every layer task in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureParams {
    /// Boundaries separated by at most this many pixels count as adjacent
    pub pixel_radius: u32,
    /// Area lists smaller than this (in px^2) are excluded from processing
    pub area_threshold: f64,
    /// Bounding boxes are scaled by this factor before the overlap pre-filter
    pub bbox_scale: f64,
}

impl MeasureParams {
    /// Create validated measurement parameters
    pub fn new(pixel_radius: u32, area_threshold: f64, bbox_scale: f64) -> Result<Self> {
        if !(bbox_scale > 0.0) {
            return Err(CommonError::InvalidBoundingBoxScale { scale: bbox_scale });
        }
        if !(area_threshold >= 0.0) {
            return Err(CommonError::InvalidAreaThreshold {
                threshold: area_threshold,
            });
        }
        Ok(Self {
            pixel_radius,
            area_threshold,
            bbox_scale,
        })
    }
}

impl Default for MeasureParams {
    fn default() -> Self {
        Self {
            pixel_radius: 10,
            area_threshold: 200.0,
            bbox_scale: 1.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedBoundary {
        name: String,
        index: u32,
    }

    impl BoundaryInfo for NamedBoundary {
        fn name(&self) -> &str {
            &self.name
        }
        fn index(&self) -> u32 {
            self.index
        }
    }

    #[test]
    fn record_between_carries_both_identities() {
        let a = NamedBoundary {
            name: "ADAL".to_string(),
            index: 0,
        };
        let b = NamedBoundary {
            name: "AVAR".to_string(),
            index: 2,
        };

        let record = AdjacencyRecord::between(&a, &b, 3.5);
        assert_eq!(record.cell1, "ADAL");
        assert_eq!(record.cell2, "AVAR");
        assert_eq!(record.index1, 0);
        assert_eq!(record.index2, 2);
        assert_eq!(record.adjacency, 3.5);
    }

    #[test]
    fn params_default_matches_conventions() {
        let params = MeasureParams::default();
        assert_eq!(params.pixel_radius, 10);
        assert_eq!(params.area_threshold, 200.0);
        assert_eq!(params.bbox_scale, 1.1);
    }

    #[test]
    fn params_reject_nonpositive_scale() {
        assert!(MeasureParams::new(10, 200.0, 0.0).is_err());
        assert!(MeasureParams::new(10, 200.0, -1.0).is_err());
        assert!(MeasureParams::new(10, 200.0, f64::NAN).is_err());
    }

    #[test]
    fn params_reject_negative_threshold() {
        assert!(MeasureParams::new(10, -5.0, 1.1).is_err());
        assert!(MeasureParams::new(10, 0.0, 1.1).is_ok());
    }
}

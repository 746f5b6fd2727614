use adjacency_common::BoundaryInfo;
use geo::Area;
use geo_types::{Coord, LineString, Polygon, Rect, coord};

/// One closed area-list outline within a layer.
///
/// The name is the anatomical label of the owning area list; the index
/// disambiguates multiple outlines sharing a name within one layer. The
/// bounding box is the (possibly scaled) axis-aligned box used by the
/// overlap pre-filter.
#[derive(Debug, Clone)]
pub struct AreaBoundary {
    pub name: String,
    pub index: u32,
    pub outline: Vec<Coord<f64>>,
    pub bbox: Rect<f64>,
}

impl BoundaryInfo for AreaBoundary {
    fn name(&self) -> &str {
        &self.name
    }
    fn index(&self) -> u32 {
        self.index
    }
}

impl AreaBoundary {
    /// Build a boundary from a non-empty outline, with a tight bounding box
    pub fn from_outline(name: String, index: u32, outline: Vec<Coord<f64>>) -> Option<Self> {
        let bbox = tight_bbox(&outline)?;
        Some(Self {
            name,
            index,
            outline,
            bbox,
        })
    }

    /// Convert to a geo-types polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::new(self.outline.clone()), vec![])
    }

    /// Enclosed area of the outline in px^2
    pub fn area(&self) -> f64 {
        self.to_geo_polygon().unsigned_area()
    }
}

/// Tight axis-aligned bounding box of a point set; `None` when empty
pub fn tight_bbox(points: &[Coord<f64>]) -> Option<Rect<f64>> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: max_y },
    ))
}

/// Scale a rectangle about its center.
///
/// Factors above 1 expand the search box so adjacent boundaries are not
/// missed by the overlap pre-filter.
pub fn scale_rect(rect: &Rect<f64>, factor: f64) -> Rect<f64> {
    let center = rect.center();
    let half_width = rect.width() / 2.0 * factor;
    let half_height = rect.height() / 2.0 * factor;
    Rect::new(
        coord! { x: center.x - half_width, y: center.y - half_height },
        coord! { x: center.x + half_width, y: center.y + half_height },
    )
}

use std::collections::HashMap;

use geo_types::Coord;

use crate::boundary::AreaBoundary;
use crate::{Result, Trakem2Error};

/// Outline points sorted by x, built once per boundary and shared across
/// every pair in a batch
struct SortedOutline {
    points: Vec<Coord<f64>>,
}

impl SortedOutline {
    fn new(outline: &[Coord<f64>]) -> Self {
        let mut points = outline.to_vec();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { points }
    }

    /// Is any point of the outline within `radius` of `p`?
    fn has_point_near(&self, p: &Coord<f64>, radius: f64) -> bool {
        let lo = self
            .points
            .partition_point(|q| q.x < p.x - radius);
        for q in &self.points[lo..] {
            if q.x > p.x + radius {
                break;
            }
            let (dx, dy) = (q.x - p.x, q.y - p.y);
            if dx * dx + dy * dy <= radius * radius {
                return true;
            }
        }
        false
    }
}

/// Count the points of `outline` lying within `radius` of `near`
fn directed_count(outline: &[Coord<f64>], near: &SortedOutline, radius: f64) -> u32 {
    outline
        .iter()
        .filter(|p| near.has_point_near(p, radius))
        .count() as u32
}

/// Score a batch of candidate pairs at the given pixel radius.
///
/// The adjacency of a pair is the larger of the two directed counts of
/// boundary points within `pixel_radius` of the other outline. Pairs with
/// no points in range are omitted; output order follows input order.
pub fn score_batch(
    pairs: &[(AreaBoundary, AreaBoundary)],
    pixel_radius: u32,
) -> Result<Vec<(AreaBoundary, AreaBoundary, f64)>> {
    let radius = f64::from(pixel_radius);

    let mut sorted: HashMap<(&str, u32), SortedOutline> = HashMap::new();
    for (a, b) in pairs {
        for boundary in [a, b] {
            if boundary.outline.is_empty() {
                return Err(Trakem2Error::EmptyOutline {
                    name: boundary.name.clone(),
                    index: boundary.index,
                });
            }
            sorted
                .entry((boundary.name.as_str(), boundary.index))
                .or_insert_with(|| SortedOutline::new(&boundary.outline));
        }
    }

    let mut scored = Vec::new();
    for (a, b) in pairs {
        let near_b = &sorted[&(b.name.as_str(), b.index)];
        let near_a = &sorted[&(a.name.as_str(), a.index)];
        let forward = directed_count(&a.outline, near_b, radius);
        let backward = directed_count(&b.outline, near_a, radius);
        let adjacency = forward.max(backward);
        if adjacency > 0 {
            scored.push((a.clone(), b.clone(), f64::from(adjacency)));
        }
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    fn square(name: &str, x0: f64, size: f64) -> AreaBoundary {
        let outline = vec![
            coord! { x: x0, y: 0.0 },
            coord! { x: x0 + size, y: 0.0 },
            coord! { x: x0 + size, y: size },
            coord! { x: x0, y: size },
        ];
        AreaBoundary::from_outline(name.to_string(), 0, outline).unwrap()
    }

    #[test]
    fn nearby_outlines_are_adjacent() {
        // Right edge of A at x=20, left edge of B at x=25: gap of 5
        let a = square("A", 0.0, 20.0);
        let b = square("B", 25.0, 20.0);
        let scored = score_batch(&[(a, b)], 10).unwrap();
        assert_eq!(scored.len(), 1);
        // Two corner points on each facing edge are within range
        assert_eq!(scored[0].2, 2.0);
    }

    #[test]
    fn distant_outlines_are_omitted() {
        let a = square("A", 0.0, 20.0);
        let b = square("B", 100.0, 20.0);
        assert!(score_batch(&[(a, b)], 10).unwrap().is_empty());
    }

    #[test]
    fn adjacency_is_the_larger_directed_count() {
        // A dense edge against a sparse one: counts differ per direction
        let dense = AreaBoundary::from_outline(
            "DENSE".to_string(),
            0,
            (0..=10)
                .map(|i| coord! { x: 0.0, y: f64::from(i) })
                .collect(),
        )
        .unwrap();
        let sparse = AreaBoundary::from_outline(
            "SPARSE".to_string(),
            0,
            vec![coord! { x: 3.0, y: 0.0 }, coord! { x: 3.0, y: 10.0 }],
        )
        .unwrap();

        let scored = score_batch(&[(dense, sparse)], 6).unwrap();
        assert_eq!(scored.len(), 1);
        // All 11 dense points sit within 6 px of a sparse point, while only
        // 2 sparse points sit near the dense edge
        assert_eq!(scored[0].2, 11.0);
    }

    #[test]
    fn empty_outline_rejects_the_batch() {
        let a = square("A", 0.0, 20.0);
        let mut b = square("B", 25.0, 20.0);
        b.outline.clear();
        assert!(score_batch(&[(a, b)], 10).is_err());
    }

    #[test]
    fn scorer_output_is_deterministic_and_ordered() {
        let a = square("A", 0.0, 20.0);
        let b = square("B", 25.0, 20.0);
        let c = square("C", 50.0, 20.0);
        let pairs = vec![(a.clone(), b.clone()), (b.clone(), c.clone()), (a, c)];

        let scored = score_batch(&pairs, 10).unwrap();
        let names: Vec<(&str, &str)> = scored
            .iter()
            .map(|(x, y, _)| (x.name.as_str(), y.name.as_str()))
            .collect();
        // A-C is out of range and dropped; the rest keep input order
        assert_eq!(names, [("A", "B"), ("B", "C")]);
    }
}

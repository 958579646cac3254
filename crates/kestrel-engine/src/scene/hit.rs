//! 2D hit-test helpers on the XY plane.

use crate::coords::{Rect, Vec2};

/// Separating-axis test between a convex polygon and an axis-aligned rect.
///
/// Touching edges count as overlap. Polygons with fewer than three points
/// degrade to a point or segment test.
pub fn polygon_overlaps_rect(polygon: &[Vec2], rect: Rect) -> bool {
    if polygon.is_empty() || rect.is_empty() {
        return false;
    }

    let corners = rect.corners();
    let axes = [Vec2::X, Vec2::Y].into_iter().chain(edge_normals(polygon));

    for axis in axes {
        let (a_min, a_max) = project(polygon, axis);
        let (b_min, b_max) = project(&corners, axis);
        if a_max < b_min || b_max < a_min {
            return false;
        }
    }
    true
}

fn edge_normals(polygon: &[Vec2]) -> impl Iterator<Item = Vec2> + '_ {
    let n = polygon.len();
    (0..n).filter_map(move |i| {
        let edge = polygon[(i + 1) % n] - polygon[i];
        let normal = edge.perp();
        (normal.length_squared() > f32::EPSILON).then_some(normal)
    })
}

fn project(points: &[Vec2], axis: Vec2) -> (f32, f32) {
    points.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

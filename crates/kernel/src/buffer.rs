//! # Polygon/linestring buffering (§4.6)
//!
//! Hand-rolled Minkowski offset: convex corners rounded (≥4 segments,
//! implementer's choice), concave corners mitered up to a miter limit of
//! `2·delta`, beveled beyond. No buffering crate in the corpus implements
//! this exact asymmetric join policy, so this is built directly over
//! `glam::Vec2`, structured the way
//! `eustress-geo::vector_render::generate_tube_mesh` accumulates
//! per-segment geometry in a loop rather than via a generic algorithm
//! crate.

use glam::Vec2;

/// Global epsilon for collinearity/containment tests (§4.6's numeric policy).
pub const EPSILON: f32 = 1e-4;

const ROUND_SEGMENTS: usize = 8;

fn outward_normal_ccw(edge: Vec2) -> Vec2 {
    // For a CCW ring, the interior is to the left of each edge; the
    // outward normal is the edge direction rotated -90°.
    Vec2::new(edge.y, -edge.x).normalize_or_zero()
}

fn ring_signed_area(ring: &[Vec2]) -> f32 {
    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

/// Ensure a ring winds CCW (outer) or CW (hole), flipping if necessary,
/// per §4.6's "kernel flips inputs that violate this" rule.
pub fn ensure_winding(ring: &[Vec2], ccw: bool) -> Vec<Vec2> {
    let area = ring_signed_area(ring);
    let is_ccw = area > 0.0;
    if is_ccw == ccw {
        ring.to_vec()
    } else {
        ring.iter().rev().copied().collect()
    }
}

fn round_arc(center: Vec2, from: Vec2, to: Vec2, radius: f32, segments: usize) -> Vec<Vec2> {
    let angle_from = from.y.atan2(from.x);
    let mut angle_to = to.y.atan2(to.x);
    let mut delta = angle_to - angle_from;
    // Take the short way around.
    while delta > std::f32::consts::PI {
        delta -= std::f32::consts::TAU;
    }
    while delta < -std::f32::consts::PI {
        delta += std::f32::consts::TAU;
    }
    angle_to = angle_from + delta;

    let steps = segments.max(4);
    (0..=steps)
        .map(|i| {
            let t = i as f32 / steps as f32;
            let angle = angle_from + (angle_to - angle_from) * t;
            center + Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

/// `polygonBuffer(ring, delta) -> polygon(s)`. Returns a single outer
/// ring; self-intersections that can arise from buffering a non-convex
/// polygon are not repaired (§1 Non-goals: no general CSG engine).
pub fn polygon_buffer(ring: &[Vec2], delta: f32) -> Vec<Vec2> {
    if delta <= 0.0 {
        return ring.to_vec();
    }
    let ring = ensure_winding(ring, true);
    let n = ring.len();
    if n < 3 {
        return ring;
    }

    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];

        let edge_in = cur - prev;
        let edge_out = next - cur;
        let normal_in = outward_normal_ccw(edge_in);
        let normal_out = outward_normal_ccw(edge_out);

        let offset_in = cur + normal_in * delta;
        let offset_out = cur + normal_out * delta;

        let cross = edge_in.x * edge_out.y - edge_in.y * edge_out.x;

        if cross > EPSILON {
            // Convex corner: the two offset edges diverge, fill with a
            // round arc.
            out.extend(round_arc(cur, normal_in, normal_out, delta, ROUND_SEGMENTS));
        } else if cross < -EPSILON {
            // Concave corner: miter, bevel past the miter limit.
            let bisector = (normal_in + normal_out).normalize_or_zero();
            let theta = normal_in.dot(normal_out).clamp(-1.0, 1.0).acos();
            let cos_half = (theta / 2.0).cos();
            let miter_len = if cos_half.abs() > EPSILON { delta / cos_half } else { f32::INFINITY };
            if miter_len <= 2.0 * delta && bisector.length_squared() > EPSILON {
                out.push(cur + bisector * miter_len);
            } else {
                out.push(offset_in);
                out.push(offset_out);
            }
        } else {
            out.push(offset_in);
        }
    }
    out
}

/// `linestringBuffer(line, radius) -> polygon`. Flat-cap symmetric
/// buffer per-segment, joined by round caps of the same radius: every
/// segment widens to a rectangle of width `2·radius`; consecutive
/// rectangles and the two line ends are joined with round arcs so the
/// whole buffer is a single outline polygon.
pub fn linestring_buffer(points: &[Vec2], radius: f32) -> Vec<Vec2> {
    if points.len() < 2 || radius <= 0.0 {
        return Vec::new();
    }

    let left = offset_side(points, radius);
    let reversed: Vec<Vec2> = points.iter().rev().copied().collect();
    let right = offset_side(&reversed, radius);

    let mut outline = Vec::with_capacity(left.len() + right.len() + ROUND_SEGMENTS * 2);
    outline.extend(left);
    outline.extend(end_cap(*points.last().unwrap(), points[points.len() - 2], radius));
    outline.extend(right);
    outline.extend(end_cap(points[0], points[1], radius));
    outline
}

/// Offset one side of an open polyline (the "left" side given the
/// traversal direction), rounding convex joins and beveling concave ones
/// (a cheaper approximation than mitering, acceptable since a stroke's
/// inner joins are usually hidden by the opposite side's fill anyway).
fn offset_side(points: &[Vec2], radius: f32) -> Vec<Vec2> {
    let n = points.len();
    let mut out = Vec::new();

    for i in 0..n {
        let normal_prev = (i > 0).then(|| {
            let edge = points[i] - points[i - 1];
            Vec2::new(-edge.y, edge.x).normalize_or_zero()
        });
        let normal_next = (i + 1 < n).then(|| {
            let edge = points[i + 1] - points[i];
            Vec2::new(-edge.y, edge.x).normalize_or_zero()
        });

        match (normal_prev, normal_next) {
            (None, Some(n_next)) => out.push(points[i] + n_next * radius),
            (Some(n_prev), None) => out.push(points[i] + n_prev * radius),
            (Some(n_prev), Some(n_next)) => {
                let edge_in = points[i] - points[i - 1];
                let edge_out = points[i + 1] - points[i];
                let cross = edge_in.x * edge_out.y - edge_in.y * edge_out.x;
                if cross > EPSILON {
                    out.extend(round_arc(points[i], n_prev, n_next, radius, ROUND_SEGMENTS));
                } else {
                    out.push(points[i] + n_prev * radius);
                    out.push(points[i] + n_next * radius);
                }
            }
            (None, None) => {}
        }
    }
    out
}

/// Half-circle cap at a line endpoint, swinging from the left-side
/// normal to the right-side normal of the terminal segment.
fn end_cap(end_point: Vec2, neighbor: Vec2, radius: f32) -> Vec<Vec2> {
    let edge = end_point - neighbor;
    let left_normal = Vec2::new(-edge.y, edge.x).normalize_or_zero();
    let right_normal = -left_normal;
    round_arc(end_point, left_normal, right_normal, radius, ROUND_SEGMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn zero_delta_is_identity() {
        let sq = square();
        let buffered = polygon_buffer(&sq, 0.0);
        assert_eq!(buffered, sq);
    }

    #[test]
    fn positive_delta_expands_bounding_box() {
        let sq = square();
        let buffered = polygon_buffer(&sq, 2.0);
        let min_x = buffered.iter().map(|v| v.x).fold(f32::INFINITY, f32::min);
        let max_x = buffered.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max);
        assert!(min_x < -1.9);
        assert!(max_x > 11.9);
    }

    #[test]
    fn linestring_buffer_produces_nonempty_outline_for_two_points() {
        let line = vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)];
        let outline = linestring_buffer(&line, 2.0);
        assert!(!outline.is_empty());
        let max_y = outline.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max);
        let min_y = outline.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
        assert!(max_y > 1.9);
        assert!(min_y < -1.9);
    }

    #[test]
    fn ensure_winding_flips_when_needed() {
        let sq = square();
        let reversed: Vec<Vec2> = sq.iter().rev().copied().collect();
        let ccw = ensure_winding(&reversed, true);
        assert!(ring_signed_area(&ccw) > 0.0);
    }
}

//! # Triangulation (§4.6)
//!
//! `triangulatePolygon(outer, holes?) -> indices`, via the `earcutr`
//! crate — the direct idiomatic upgrade from
//! `eustress-geo::vector_render`'s fan-triangulation, whose own doc
//! comment flagged it as "only correct for convex polygons". `earcutr`
//! handles holes and collinear points without producing zero-area
//! triangles.

use glam::Vec2;

use tile3d_common::Error;

/// `triangulatePolygon(outer, holes?) -> indices`. Vertices are flattened
/// in ring order (outer first, then each hole) and indices refer to that
/// flattened order.
pub fn triangulate_polygon(outer: &[Vec2], holes: &[Vec<Vec2>]) -> Result<(Vec<Vec2>, Vec<u32>), Error> {
    if outer.len() < 3 {
        return Err(Error::layer_processing_failed("geometry-kernel", "polygon outer ring has fewer than 3 vertices"));
    }

    let mut flat = Vec::with_capacity((outer.len() + holes.iter().map(|h| h.len()).sum::<usize>()) * 2);
    let mut hole_indices = Vec::with_capacity(holes.len());
    let mut vertices = Vec::with_capacity(outer.len());

    for v in outer {
        flat.push(v.x as f64);
        flat.push(v.y as f64);
        vertices.push(*v);
    }
    for hole in holes {
        if hole.len() < 3 {
            continue;
        }
        hole_indices.push(vertices.len());
        for v in hole {
            flat.push(v.x as f64);
            flat.push(v.y as f64);
            vertices.push(*v);
        }
    }

    let triangle_indices = earcutr::earcut(&flat, &hole_indices, 2)
        .map_err(|e| Error::layer_processing_failed("geometry-kernel", format!("triangulation failed: {e:?}")))?;

    let indices: Vec<u32> = triangle_indices.into_iter().map(|i| i as u32).collect();
    Ok((vertices, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangulates_simple_square() {
        let outer = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let (vertices, indices) = triangulate_polygon(&outer, &[]).unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices.len() % 3, 0);
        assert!(!indices.is_empty());
    }

    #[test]
    fn triangulates_polygon_with_hole() {
        let outer = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let hole = vec![
            Vec2::new(3.0, 3.0),
            Vec2::new(3.0, 6.0),
            Vec2::new(6.0, 6.0),
            Vec2::new(6.0, 3.0),
        ];
        let (vertices, indices) = triangulate_polygon(&outer, &[hole]).unwrap();
        assert_eq!(vertices.len(), 8);
        assert!(!indices.is_empty());
    }

    #[test]
    fn rejects_degenerate_outer_ring() {
        let outer = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert!(triangulate_polygon(&outer, &[]).is_err());
    }
}

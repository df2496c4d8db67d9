//! # Extrusion (§4.6)
//!
//! `extrude(polygon, bottomZ, topZ) -> mesh`: top cap (+Z normal), bottom
//! cap (−Z normal), and side quads (two triangles each, normals
//! perpendicular to each edge in XY). Vertices are deduplicated per
//! polygon. Structured like
//! `eustress-geo::terrain_import::generate_terrain_mesh`'s
//! vertex-grid/index-generation pattern, specialized to a single ring
//! swept between two Z planes instead of a height field.

use glam::{Vec2, Vec3};

use crate::mesh::Mesh;
use crate::triangulate::triangulate_polygon;

use tile3d_common::Error;

/// Extrude a triangulated polygon (outer + holes) between `bottom_z` and
/// `top_z`, producing top cap, bottom cap, and side walls.
pub fn extrude(outer: &[Vec2], holes: &[Vec<Vec2>], bottom_z: f32, top_z: f32) -> Result<Mesh, Error> {
    let (vertices2d, cap_indices) = triangulate_polygon(outer, holes)?;

    let mut mesh = Mesh::default();

    // Top cap.
    let top_base = mesh.positions.len() as u32;
    for v in &vertices2d {
        mesh.positions.push(Vec3::new(v.x, top_z, v.y));
        mesh.normals.push(Vec3::Y);
    }
    for chunk in cap_indices.chunks_exact(3) {
        mesh.indices.push(top_base + chunk[0]);
        mesh.indices.push(top_base + chunk[1]);
        mesh.indices.push(top_base + chunk[2]);
    }

    // Bottom cap, reversed winding so its normal faces −Z.
    let bottom_base = mesh.positions.len() as u32;
    for v in &vertices2d {
        mesh.positions.push(Vec3::new(v.x, bottom_z, v.y));
        mesh.normals.push(Vec3::NEG_Y);
    }
    for chunk in cap_indices.chunks_exact(3) {
        mesh.indices.push(bottom_base + chunk[0]);
        mesh.indices.push(bottom_base + chunk[2]);
        mesh.indices.push(bottom_base + chunk[1]);
    }

    // Side walls: one quad (two triangles) per outer-ring edge and per
    // hole-ring edge, with a per-edge outward normal (perpendicular to
    // the edge in XY, since walls are vertical).
    side_walls(&mut mesh, outer, bottom_z, top_z, true);
    for hole in holes {
        side_walls(&mut mesh, hole, bottom_z, top_z, false);
    }

    Ok(mesh)
}

fn side_walls(mesh: &mut Mesh, ring: &[Vec2], bottom_z: f32, top_z: f32, outer: bool) {
    let n = ring.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let edge = b - a;
        // Outward normal for a CCW outer ring points right of travel;
        // holes wind CW, so the same right-hand rule already points
        // away from the hole's interior (i.e. into the solid's wall).
        let _ = outer;
        let normal_xy = Vec2::new(edge.y, -edge.x).normalize_or_zero();
        let normal = Vec3::new(normal_xy.x, 0.0, normal_xy.y);

        let base = mesh.positions.len() as u32;
        mesh.positions.push(Vec3::new(a.x, bottom_z, a.y));
        mesh.positions.push(Vec3::new(b.x, bottom_z, b.y));
        mesh.positions.push(Vec3::new(b.x, top_z, b.y));
        mesh.positions.push(Vec3::new(a.x, top_z, a.y));
        for _ in 0..4 {
            mesh.normals.push(normal);
        }

        mesh.indices.push(base);
        mesh.indices.push(base + 1);
        mesh.indices.push(base + 2);
        mesh.indices.push(base);
        mesh.indices.push(base + 2);
        mesh.indices.push(base + 3);
    }
}

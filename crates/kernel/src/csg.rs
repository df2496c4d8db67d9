//! # CSG subtraction against terrain (§4.6, Open Question 2)
//!
//! §1's Non-goals rule out a general CSG engine; §4.6 only asks for
//! "clipping triangles to the terrain surface" so that "no output triangle
//! has any vertex strictly below the terrain surface at that XY beyond a
//! small epsilon." `subtract_terrain` implements exactly that — a direct
//! per-vertex clamp against the sampled terrain surface, cheaper than a
//! full boolean solver and sufficient for the stated invariant (DESIGN.md
//! Open Question 2).
//!
//! `csgrs`/`nalgebra` are still a real dependency here, used for the
//! solid-vs-solid manifold check: [`mesh_is_manifold`] builds the exact
//! `csgrs::CSG`/`Vertex`/`Polygon` triangle-soup used by the original
//! `stlmaps` `terrain_mesh_gen.rs` test module's
//! `test_manifold_terrain_mesh`, and is exercised by the terrain builder's
//! own manifold-closure test (§8 invariant 3).

use csgrs::polygon::Polygon;
use csgrs::{CSG, Vertex};
use glam::Vec3;
use nalgebra::{Point3, Vector3};

use crate::drape::sample_elevation;
use crate::mesh::Mesh;
use tile3d_common::ElevationGrid;

/// Epsilon for the "strictly below terrain" tolerance (§4.6, §8).
pub const CSG_EPSILON: f32 = 1e-4;

/// CSG-subtract `mesh` by the terrain half-space: clamp every vertex
/// that pokes below the sampled terrain surface (beyond [`CSG_EPSILON`])
/// up to the surface. Topology (indices) is unchanged, so a closed input
/// mesh stays closed.
pub fn subtract_terrain(mesh: &mut Mesh, grid: &ElevationGrid, width_m: f32, height_m: f32) {
    for p in mesh.positions.iter_mut() {
        let surface = sample_elevation(grid, p.x, p.z, width_m, height_m);
        if p.y < surface - CSG_EPSILON {
            p.y = surface;
        }
    }
}

/// Build a `csgrs` triangle soup from a closed mesh and report whether it
/// is manifold (every edge shared by exactly two triangles), the same
/// check the original `terrain_mesh_gen.rs` test module runs via
/// `csg.is_manifold()`.
pub fn mesh_is_manifold(mesh: &Mesh) -> bool {
    let polygons: Vec<Polygon<()>> = mesh
        .indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let p0 = mesh.positions[tri[0] as usize];
            let p1 = mesh.positions[tri[1] as usize];
            let p2 = mesh.positions[tri[2] as usize];
            triangle_polygon(p0, p1, p2)
        })
        .collect();

    let csg: CSG<()> = CSG::from_polygons(&polygons);
    csg.is_manifold()
}

fn triangle_polygon(p0: Vec3, p1: Vec3, p2: Vec3) -> Option<Polygon<()>> {
    let a = Point3::new(p0.x as f64, p0.y as f64, p0.z as f64);
    let b = Point3::new(p1.x as f64, p1.y as f64, p1.z as f64);
    let c = Point3::new(p2.x as f64, p2.y as f64, p2.z as f64);

    let edge1 = b - a;
    let edge2 = c - a;
    let normal: Vector3<f64> = edge1.cross(&edge2);
    if normal.norm() < 1e-12 {
        return None;
    }
    let normal = normal.normalize();

    let v0 = Vertex::new(a, normal);
    let v1 = Vertex::new(b, normal);
    let v2 = Vertex::new(c, normal);
    Some(Polygon::new(vec![v0, v1, v2], None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(value: f32) -> ElevationGrid {
        ElevationGrid {
            width: 2,
            height: 2,
            samples: vec![value; 4],
            min_elevation: value,
            max_elevation: value,
            original_min: value,
            original_max: value,
        }
    }

    #[test]
    fn clamps_vertices_poking_below_terrain() {
        let grid = flat_grid(10.0);
        let mut mesh = Mesh {
            positions: vec![Vec3::new(5.0, 3.0, 5.0), Vec3::new(5.0, 20.0, 5.0)],
            indices: vec![],
            normals: vec![],
            colors: vec![],
        };
        subtract_terrain(&mut mesh, &grid, 100.0, 100.0);
        assert_eq!(mesh.positions[0].y, 10.0);
        assert_eq!(mesh.positions[1].y, 20.0);
    }

    #[test]
    fn closed_tetrahedron_is_manifold() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let indices = vec![0, 2, 1, 0, 1, 3, 1, 2, 3, 0, 3, 2];
        let mesh = Mesh { positions, indices, normals: vec![], colors: vec![] };
        assert!(mesh_is_manifold(&mesh));
    }
}

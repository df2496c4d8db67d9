//! # Terrain draping (§4.6)
//!
//! `sampleElevation(grid, x, y)` bilinear lookup and `drape(mesh, grid) ->
//! mesh`: "replace each vertex z with sampleElevation(grid, x, y) +
//! originalZ". World XY uses the same meters-from-bbox-SW-corner frame as
//! `tile3d_geo::tilemath` (`worldX` = east, `worldY` = north); the grid's
//! row 0 is the north edge per §3, so sampling inverts the row axis.
//! Structured the same way `eustress-geo::terrain_import::HgtTile`'s
//! `elevation_at`/`elevation_at_latlon` bilinear lookup works, generalized
//! from a single HGT tile to the world-meters elevation grid.

use glam::Vec3;

use tile3d_common::ElevationGrid;

/// Bilinearly sample `grid` at world-meters `(x, y)`, where `(0,0)` is the
/// bbox SW corner and `(width_m, height_m)` is the NE corner.
pub fn sample_elevation(grid: &ElevationGrid, x: f32, y: f32, width_m: f32, height_m: f32) -> f32 {
    let u = (x / width_m.max(1e-6)).clamp(0.0, 1.0);
    // row 0 = north edge = max y; v is the row-space coordinate.
    let v = 1.0 - (y / height_m.max(1e-6)).clamp(0.0, 1.0);

    let fx = u * (grid.width - 1).max(1) as f32;
    let fy = v * (grid.height - 1).max(1) as f32;

    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(grid.width - 1);
    let y1 = (y0 + 1).min(grid.height - 1);

    let tx = fx.fract();
    let ty = fy.fract();

    let e00 = grid.get(x0, y0);
    let e10 = grid.get(x1, y0);
    let e01 = grid.get(x0, y1);
    let e11 = grid.get(x1, y1);

    let top = e00 * (1.0 - tx) + e10 * tx;
    let bot = e01 * (1.0 - tx) + e11 * tx;
    top * (1.0 - ty) + bot * ty
}

/// `drape(mesh, grid) -> mesh`, in place: every vertex's Y (our up axis,
/// see `tile3d_kernel::extrude`'s `Vec3::new(x, z, y)` convention) is
/// offset by the terrain elevation sampled at its XZ position.
pub fn drape_positions(positions: &mut [Vec3], grid: &ElevationGrid, width_m: f32, height_m: f32) {
    for p in positions.iter_mut() {
        let elevation = sample_elevation(grid, p.x, p.z, width_m, height_m);
        p.y += elevation;
    }
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
    fn samples_flat_grid_everywhere() {
        let grid = flat_grid(42.0);
        assert_eq!(sample_elevation(&grid, 0.0, 0.0, 100.0, 100.0), 42.0);
        assert_eq!(sample_elevation(&grid, 50.0, 50.0, 100.0, 100.0), 42.0);
        assert_eq!(sample_elevation(&grid, 100.0, 100.0, 100.0, 100.0), 42.0);
    }

    #[test]
    fn drape_offsets_vertices_by_sampled_elevation() {
        let grid = flat_grid(10.0);
        let mut positions = vec![Vec3::new(10.0, 5.0, 10.0)];
        drape_positions(&mut positions, &grid, 100.0, 100.0);
        assert_eq!(positions[0].y, 15.0);
    }

    #[test]
    fn sw_corner_samples_southwest_grid_cell() {
        // row 0 = north edge, so the SW corner (world y=0) reads the last row.
        let grid = ElevationGrid {
            width: 2,
            height: 2,
            samples: vec![1.0, 2.0, 3.0, 4.0],
            min_elevation: 1.0,
            max_elevation: 4.0,
            original_min: 1.0,
            original_max: 4.0,
        };
        assert_eq!(sample_elevation(&grid, 0.0, 0.0, 10.0, 10.0), 3.0);
        assert_eq!(sample_elevation(&grid, 0.0, 10.0, 10.0, 10.0), 1.0);
    }
}

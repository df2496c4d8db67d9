//! # Elevation Grid Builder (§4.4)
//!
//! Assembles fetched Terrain-RGB tiles into a regular W×H grid clipped to
//! a bbox. Bilinear sampling and hole-fill follow the same structure as
//! `eustress-geo::terrain_import::HgtTile::elevation_at_latlon`, generalized
//! from a single HGT tile to a mosaic of raster tiles addressed by
//! [`crate::tilemath::tiles_covering`].

use std::collections::HashMap;

use tile3d_common::{BBox, ElevationGrid, Error};

use crate::raster::RasterTile;
use crate::tilemath::{self, TileCoord};

/// One fetched raster tile plus enough context to sample a lng/lat inside
/// it: the tile's own bounds in lng/lat.
struct TileSample<'a> {
    tile: &'a RasterTile,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl TileSample<'_> {
    fn sample(&self, lng: f64, lat: f64) -> Option<f32> {
        if lng < self.west || lng > self.east || lat < self.south || lat > self.north {
            return None;
        }
        let u = (lng - self.west) / (self.east - self.west);
        let v = (self.north - lat) / (self.north - self.south); // row 0 = north

        let fx = u * (self.tile.width - 1) as f64;
        let fy = v * (self.tile.height - 1) as f64;

        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.tile.width - 1);
        let y1 = (y0 + 1).min(self.tile.height - 1);

        let tx = fx.fract() as f32;
        let ty = fy.fract() as f32;

        let e00 = self.tile.elevation_at_pixel(x0, y0);
        let e10 = self.tile.elevation_at_pixel(x1, y0);
        let e01 = self.tile.elevation_at_pixel(x0, y1);
        let e11 = self.tile.elevation_at_pixel(x1, y1);

        let top = e00 * (1.0 - tx) + e10 * tx;
        let bot = e01 * (1.0 - tx) + e11 * tx;
        Some(top * (1.0 - ty) + bot * ty)
    }
}

fn tile_lnglat_bounds(tile: TileCoord) -> (f64, f64, f64, f64) {
    let n = 2f64.powi(tile.z as i32);
    let west = tile.x as f64 / n * 360.0 - 180.0;
    let east = (tile.x + 1) as f64 / n * 360.0 - 180.0;
    let lat_deg = |ty: f64| {
        let y = std::f64::consts::PI * (1.0 - 2.0 * ty / n);
        y.sinh().atan().to_degrees()
    };
    let north = lat_deg(tile.y as f64);
    let south = lat_deg((tile.y + 1) as f64);
    (west, south, east, north)
}

/// Build an `ElevationGrid` for `bbox` at `resolution`×`resolution` from a
/// set of decoded raster tiles keyed by their `TileCoord`.
pub fn build_elevation_grid(
    bbox: &BBox,
    resolution: u32,
    tiles: &HashMap<TileCoord, RasterTile>,
    vertical_exaggeration: f32,
    base_height: f32,
) -> Result<ElevationGrid, Error> {
    let w = resolution as usize;
    let h = resolution as usize;

    let samples_list: Vec<TileSample> = tiles
        .iter()
        .map(|(coord, tile)| {
            let (west, south, east, north) = tile_lnglat_bounds(*coord);
            TileSample { tile, west, south, east, north }
        })
        .collect();

    let mut raw = vec![f32::NAN; w * h];

    for row in 0..h {
        for col in 0..w {
            // row 0 = north edge, column 0 = west edge
            let u = col as f64 / (w - 1).max(1) as f64;
            let v = row as f64 / (h - 1).max(1) as f64;
            let lng = bbox.west + u * (bbox.east - bbox.west);
            let lat = bbox.north - v * (bbox.north - bbox.south);

            let sample = samples_list.iter().find_map(|s| s.sample(lng, lat));
            if let Some(value) = sample {
                raw[row * w + col] = value;
            }
        }
    }

    fill_holes(&mut raw, w, h)?;

    let original_min = raw.iter().copied().fold(f32::INFINITY, f32::min);
    let original_max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let adjusted: Vec<f32> = raw
        .iter()
        .map(|&s| (s - original_min) * vertical_exaggeration + base_height)
        .collect();

    let min_elevation = adjusted.iter().copied().fold(f32::INFINITY, f32::min);
    let max_elevation = adjusted.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    for &s in &adjusted {
        if !s.is_finite() {
            return Err(Error::terrain_processing_failed("non-finite sample after exaggeration/base-height shift"));
        }
    }

    Ok(ElevationGrid {
        width: w,
        height: h,
        samples: adjusted,
        min_elevation,
        max_elevation,
        original_min,
        original_max,
    })
}

/// Fill `NaN` holes with the nearest valid neighbor (expanding ring
/// search); fails with `TerrainProcessingFailed` if the grid has no valid
/// samples at all.
fn fill_holes(grid: &mut [f32], w: usize, h: usize) -> Result<(), Error> {
    if grid.iter().all(|v| v.is_nan()) {
        return Err(Error::terrain_processing_failed("no valid elevation samples in covering tiles"));
    }

    let idx = |r: usize, c: usize| r * w + c;
    let holes: Vec<usize> = (0..grid.len()).filter(|&i| grid[i].is_nan()).collect();

    for i in holes {
        let (row, col) = (i / w, i % w);
        let mut radius = 1usize;
        let found = loop {
            let r0 = row.saturating_sub(radius);
            let r1 = (row + radius).min(h - 1);
            let c0 = col.saturating_sub(radius);
            let c1 = (col + radius).min(w - 1);

            let mut best: Option<(f32, usize)> = None;
            for r in r0..=r1 {
                for c in c0..=c1 {
                    let v = grid[idx(r, c)];
                    if v.is_nan() {
                        continue;
                    }
                    let dist = (r as isize - row as isize).pow(2) + (c as isize - col as isize).pow(2);
                    let dist = dist as usize;
                    if best.map(|(_, d)| dist < d).unwrap_or(true) {
                        best = Some((v, dist));
                    }
                }
            }

            if let Some((v, _)) = best {
                break Some(v);
            }
            if r0 == 0 && c0 == 0 && r1 == h - 1 && c1 == w - 1 {
                break None;
            }
            radius += 1;
        };

        grid[i] = found.expect("validated non-empty grid above");
    }

    Ok(())
}

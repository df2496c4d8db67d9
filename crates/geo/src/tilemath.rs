//! # Tile Coord Math
//!
//! Pure functions, no I/O: Web-Mercator tile addressing, the bbox→covering
//! tile set, and tile-pixel→world-meters mapping. Generalizes the purity
//! of `eustress-geo::coords::equirectangular_to_local` (a single-point
//! lat/lon→local-meters projection) to tile-indexed addressing.
//!
//! World-unit convention: meters, XY-plane, origin at the bbox SW corner
//! (`worldX` = east, `worldY` = north). The terrain builder and every
//! layer processor share this convention so draping/CSG never needs a
//! frame conversion.

use std::f64::consts::PI;

use tile3d_common::BBox;

/// Earth radius in meters (WGS84 mean), same constant `eustress-geo::coords`
/// uses for its equirectangular fallback.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Integer Web-Mercator tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// `tileX = floor((lng+180)/360·2^z)`
pub fn lng_to_tile_x(lng: f64, z: u32) -> u32 {
    let n = 2f64.powi(z as i32);
    (((lng + 180.0) / 360.0) * n).floor().clamp(0.0, n - 1.0) as u32
}

/// `tileY = floor((1 − ln(tan(π/4+latRad/2))/π)/2 · 2^z)`
pub fn lat_to_tile_y(lat: f64, z: u32) -> u32 {
    let n = 2f64.powi(z as i32);
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    y.floor().clamp(0.0, n - 1.0) as u32
}

fn tile_count_covering(bbox: &BBox, z: u32) -> usize {
    let x0 = lng_to_tile_x(bbox.west, z);
    let x1 = lng_to_tile_x(bbox.east, z);
    let y0 = lat_to_tile_y(bbox.north, z);
    let y1 = lat_to_tile_y(bbox.south, z);
    ((x1 - x0 + 1) as usize) * ((y1 - y0 + 1) as usize)
}

/// Choose a zoom level for `bbox` by halving `z` from 12 until the
/// covered-tile count is `<= 4`.
pub fn choose_zoom(bbox: &BBox) -> u32 {
    let mut z = 12u32;
    while z > 0 && tile_count_covering(bbox, z) > 4 {
        z /= 2;
    }
    z
}

/// `tilesCovering(bbox, z) -> set<(x,y,z)>`
pub fn tiles_covering(bbox: &BBox, z: u32) -> Vec<TileCoord> {
    let x0 = lng_to_tile_x(bbox.west, z);
    let x1 = lng_to_tile_x(bbox.east, z);
    let y0 = lat_to_tile_y(bbox.north, z);
    let y1 = lat_to_tile_y(bbox.south, z);

    let mut tiles = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            tiles.push(TileCoord { x, y, z });
        }
    }
    tiles
}

/// Width of the bbox in meters at its mean latitude (equirectangular
/// approximation, same formula `eustress-geo::coords::equirectangular_to_local`
/// uses for its fallback path — accurate to ~0.5% under 500km).
pub fn bbox_size_meters(bbox: &BBox) -> (f64, f64) {
    let mean_lat_rad = ((bbox.south + bbox.north) / 2.0).to_radians();
    let width = (bbox.east - bbox.west).to_radians() * EARTH_RADIUS_M * mean_lat_rad.cos();
    let height = (bbox.north - bbox.south).to_radians() * EARTH_RADIUS_M;
    (width.abs(), height.abs())
}

/// Convert a lng/lat (inside or near `bbox`) to world meters relative to
/// the bbox SW corner: `worldX` = east, `worldY` = north.
pub fn lnglat_to_world(lng: f64, lat: f64, bbox: &BBox) -> (f32, f32) {
    let mean_lat_rad = ((bbox.south + bbox.north) / 2.0).to_radians();
    let x = (lng - bbox.west).to_radians() * EARTH_RADIUS_M * mean_lat_rad.cos();
    let y = (lat - bbox.south).to_radians() * EARTH_RADIUS_M;
    (x as f32, y as f32)
}

/// `pixelToWorld((x,y,z), (px,py), bbox) -> (worldX, worldY)`. `extent` is
/// the MVT tile's declared pixel-space divisor (default 4096 per §4.3).
pub fn pixel_to_world(tile: TileCoord, px: f64, py: f64, extent: u32, bbox: &BBox) -> (f32, f32) {
    let n = 2f64.powi(tile.z as i32);
    let tile_frac_x = tile.x as f64 + px / extent as f64;
    let tile_frac_y = tile.y as f64 + py / extent as f64;

    let lng = tile_frac_x / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * tile_frac_y / n)).sinh().atan();
    let lat = lat_rad.to_degrees();

    lnglat_to_world(lng, lat, bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_halves_until_covered_by_four_tiles() {
        let tiny = BBox::new(0.0, 0.0, 0.001, 0.001).unwrap();
        assert_eq!(choose_zoom(&tiny), 12);

        let huge = BBox::new(-170.0, -80.0, 170.0, 80.0).unwrap();
        let z = choose_zoom(&huge);
        assert!(tile_count_covering(&huge, z) <= 4);
    }

    #[test]
    fn tiles_covering_is_nonempty_rectangle() {
        let bbox = BBox::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        let tiles = tiles_covering(&bbox, 4);
        assert!(!tiles.is_empty());
        let xs: Vec<_> = tiles.iter().map(|t| t.x).collect();
        let ys: Vec<_> = tiles.iter().map(|t| t.y).collect();
        assert!(xs.iter().max().unwrap() >= xs.iter().min().unwrap());
        assert!(ys.iter().max().unwrap() >= ys.iter().min().unwrap());
    }

    #[test]
    fn sw_corner_maps_to_world_origin() {
        let bbox = BBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
        let (x, y) = lnglat_to_world(bbox.west, bbox.south, &bbox);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn bbox_size_is_positive_for_nondegenerate_box() {
        let bbox = BBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
        let (w, h) = bbox_size_meters(&bbox);
        assert!(w > 0.0);
        assert!(h > 0.0);
    }
}

//! # Raster Tile Client (§4.2)
//!
//! Fetches Terrain-RGB DEM tiles with retry/backoff/timeout, decoding the
//! PNG payload into elevation samples. Retry loop is hand-written over
//! `tokio::time::sleep` rather than pulled from a crate: the policy
//! (`backoffMs · 2^attempt`, fixed `maxRetries`) is fully pinned and no
//! crate in the corpus owns this exact shape. PNG decode via `image`,
//! already an `eustress-common` optional dependency for GeoTIFF work.

use tile3d_common::{Error, Stage};

/// A decoded raster tile: RGBA pixel buffer plus dimensions.
#[derive(Debug, Clone)]
pub struct RasterTile {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterTile {
    /// Terrain-RGB decode: `elevMeters = -10000 + (R*65536 + G*256 + B) * 0.1`.
    pub fn elevation_at_pixel(&self, px: u32, py: u32) -> f32 {
        let idx = ((py * self.width + px) * 4) as usize;
        let r = self.rgba[idx] as f64;
        let g = self.rgba[idx + 1] as f64;
        let b = self.rgba[idx + 2] as f64;
        (-10000.0 + (r * 65536.0 + g * 256.0 + b) * 0.1) as f32
    }
}

/// Fetch/retry/validate tuning, matching §4.2's `cfg`.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub backoff_ms: u64,
    pub validate_content: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig { max_retries: 3, timeout_ms: 10_000, backoff_ms: 250, validate_content: true }
    }
}

/// `fetchRasterTile(url, cfg) -> {w, h, rgba[]}`.
pub async fn fetch_raster_tile(
    client: &reqwest::Client,
    url: &str,
    cfg: FetchConfig,
    stage: Stage,
) -> Result<RasterTile, Error> {
    let mut last_err = String::new();

    for attempt in 0..=cfg.max_retries {
        if attempt > 0 {
            let delay_ms = cfg.backoff_ms * 2u64.pow(attempt - 1);
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        let attempt_result = tokio::time::timeout(
            std::time::Duration::from_millis(cfg.timeout_ms),
            client.get(url).send(),
        )
        .await;

        let response = match attempt_result {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                last_err = e.to_string();
                continue;
            }
            Err(_) => {
                last_err = "request timed out".to_string();
                continue;
            }
        };

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                last_err = e.to_string();
                continue;
            }
        };

        if cfg.validate_content && bytes.is_empty() {
            last_err = "empty response body".to_string();
            continue;
        }

        return decode_png(&bytes)
            .map_err(|e| Error::terrain_processing_failed(format!("decoding raster tile {url}: {e}")));
    }

    Err(Error::network_timeout(
        stage,
        format!("fetching {url} after {} retries: {last_err}", cfg.max_retries),
    ))
}

fn decode_png(bytes: &[u8]) -> Result<RasterTile, image::ImageError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = img.dimensions();
    Ok(RasterTile { width, height, rgba: img.into_raw() })
}

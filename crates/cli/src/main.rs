//! # tile3d — headless CLI wrapper around `tile3d_orchestrator::Engine`
//!
//! Reads `{bbox, terrain, layers}` from a JSON file, runs one
//! `generate()` call, and writes `{terrainGeometry, perLayerGeometries}`
//! to an output JSON file. Exists only to give the core library the exit
//! codes the core spec's §6 "Exit behavior" names when "wrapped in a
//! standalone tool" — the library itself exposes no CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use tile3d_common::{BBox, Error, LayerConfig, Progress, ProgressCallback, TerrainSettings};
use tile3d_orchestrator::engine::{Engine, TileEndpoints};
use tile3d_orchestrator::RunInputs;

#[derive(Parser, Debug)]
#[command(name = "tile3d", about = "Generate a 3D scene from a bbox, terrain settings, and vector-tile layer configs")]
struct Args {
    /// Path to a JSON file shaped `{"bbox": ..., "terrain": ..., "layers": [...]}`.
    #[arg(long)]
    input: PathBuf,

    /// Where to write the `{terrainGeometry, perLayerGeometries}` JSON output.
    #[arg(long)]
    output: PathBuf,

    /// Raster (Terrain-RGB) DEM tile URL template, containing `{z}/{x}/{y}`.
    #[arg(long, env = "TILE3D_RASTER_URL_TEMPLATE")]
    raster_url_template: String,

    /// Vector (MVT) tile URL template, containing `{z}/{x}/{y}`.
    #[arg(long, env = "TILE3D_VECTOR_URL_TEMPLATE")]
    vector_url_template: String,

    /// Optional `EngineConfig` TOML file overriding pool size, retries, debounce, etc.
    #[arg(long)]
    engine_config: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateInput {
    bbox: BBox,
    #[serde(default)]
    terrain: TerrainSettings,
    #[serde(default)]
    layers: Vec<LayerConfig>,
}

#[derive(Debug, serde::Serialize)]
struct GenerateOutput {
    terrain_geometry: tile3d_common::Geometry,
    per_layer_geometries: Vec<LayerOutputJson>,
}

#[derive(Debug, serde::Serialize)]
struct LayerOutputJson {
    label: String,
    geometry: tile3d_common::Geometry,
    skipped_count: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tile3d_common::logging::init();

    match run().await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("error: {err}");
            if !err.context().is_empty() {
                eprintln!("  detail: {:?}", err.context());
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run() -> Result<(), Error> {
    let args = Args::parse();

    let input_text = std::fs::read_to_string(&args.input)
        .map_err(|e| Error::invalid_input(format!("reading {}: {e}", args.input.display())))?;
    let input: GenerateInput = serde_json::from_str(&input_text)
        .map_err(|e| Error::invalid_input(format!("parsing {}: {e}", args.input.display())))?;

    let engine_config = match &args.engine_config {
        Some(path) => tile3d_common::EngineConfig::load(path)?,
        None => tile3d_common::EngineConfig::default(),
    };
    let endpoints = TileEndpoints {
        raster_url_template: args.raster_url_template,
        vector_url_template: args.vector_url_template,
    };
    let engine = Arc::new(Engine::new(engine_config, endpoints));

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let bar_for_cb = bar.clone();
    let progress: ProgressCallback = Box::new(move |p: Progress| {
        bar_for_cb.set_position(p.pct as u64);
        bar_for_cb.set_message(format!("{}: {}", p.stage, p.message));
    });

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let run_inputs = RunInputs { bbox: input.bbox, terrain: input.terrain, layers: input.layers };
    let result = engine.generate(run_inputs, progress, cancel).await;
    bar.finish_and_clear();

    let output = result?;
    let json = GenerateOutput {
        terrain_geometry: output.terrain_geometry.clone(),
        per_layer_geometries: output
            .per_layer_geometries
            .iter()
            .map(|l| LayerOutputJson {
                label: l.label.clone(),
                geometry: l.geometry.clone(),
                skipped_count: output.skipped_counts.get(&l.label).copied().unwrap_or(0),
            })
            .collect(),
    };

    let out_text = serde_json::to_string_pretty(&json)
        .map_err(|e| Error::internal(format!("serializing output: {e}")))?;
    std::fs::write(&args.output, out_text)
        .map_err(|e| Error::internal(format!("writing {}: {e}", args.output.display())))?;

    println!("wrote {}", args.output.display());
    Ok(())
}

//! Translate a set of stage-positioned tiles into a consistent mosaic layout.
//!
//! The job file lists the tiles and, optionally, a configuration:
//!
//! ```yaml
//! tiles:
//!   - image_path: tiles/000.png
//!     origin: [0.0, 0.0]
//!     size: [2048.0, 2048.0]
//!   - image_path: tiles/001.png
//!     origin: [1843.0, 0.0]
//!     size: [2048.0, 2048.0]
//! config:
//!   solver: greedy_then_relax
//! ```
//!
//! Relative image paths are resolved against the job file's directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin mosaic-translate -- job.yaml [positions.json]
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use common::log_setup::setup_logging;
use common::parallel::RayonScheduler;
use glam::DVec2;
use mosaic::{
    translate_tiles, FileImageSource, MosaicConfig, MosaicLayout, Rect, SolverReport,
    StageTransform, TileId, TileTransform,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct Job {
    tiles: Vec<JobTile>,
    #[serde(default)]
    config: MosaicConfig,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct JobTile {
    image_path: PathBuf,
    origin: DVec2,
    size: DVec2,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Serialize)]
struct Output {
    image_scale: f64,
    solver: SolverReport,
    tiles: Vec<PlacedTile>,
}

#[derive(Debug, Serialize)]
struct PlacedTile {
    id: TileId,
    image_path: PathBuf,
    /// Solved center in volume space.
    position: DVec2,
    /// Solved position minus nominal position.
    translation: DVec2,
    /// Solved extent with the mosaic shifted to start at (0, 0).
    bbox: Rect,
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <job.yaml|job.json> [output.json]", args[0]);
        std::process::exit(1);
    }

    let job_path = Path::new(&args[1]);
    let output_path = args.get(2).map(PathBuf::from);

    let job: Job = common::deserialize_file(job_path)
        .with_context(|| format!("Failed to read job file {}", job_path.display()))?;

    setup_logging(&job.log_level, Path::new("logs"), "mosaic-translate")
        .context("Failed to set up logging")?;

    if job.tiles.is_empty() {
        bail!("Job file lists no tiles");
    }

    let base_dir = job_path.parent().unwrap_or(Path::new("."));
    let (transforms, image_paths): (Vec<Arc<dyn TileTransform>>, Vec<PathBuf>) = job
        .tiles
        .iter()
        .map(|tile| {
            let transform: Arc<dyn TileTransform> =
                Arc::new(StageTransform::new(tile.origin, tile.size));
            (transform, base_dir.join(&tile.image_path))
        })
        .unzip();

    let scheduler = scheduler_for(&job.config)?;

    tracing::info!("Translating {} tiles from {}", job.tiles.len(), job_path.display());
    let layout = translate_tiles(
        transforms,
        image_paths,
        &job.config,
        &FileImageSource,
        &scheduler,
    )?;

    if !layout.solver.converged {
        tracing::warn!(
            "Layout did not converge: tension {:?} after {} passes",
            layout.solver.tension,
            layout.solver.iterations
        );
    }

    let json = serde_json::to_string_pretty(&output(&layout))?;
    match output_path {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Positions written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Validates `config` first: a zero concurrency limit is rejected, not built.
fn scheduler_for(config: &MosaicConfig) -> Result<RayonScheduler> {
    config.validate()?;
    Ok(match config.max_concurrent_alignments {
        Some(limit) => RayonScheduler::new().with_max_concurrent(limit),
        None => RayonScheduler::new(),
    })
}

fn output(layout: &MosaicLayout) -> Output {
    let placements = layout.normalized_placements();
    let tiles = layout
        .catalog
        .iter()
        .filter_map(|tile| {
            Some(PlacedTile {
                id: tile.id(),
                image_path: tile.image_path().to_path_buf(),
                position: *layout.positions.get(&tile.id())?,
                translation: layout.translation(tile.id())?,
                bbox: *placements.get(&tile.id())?,
            })
        })
        .collect();

    Output {
        image_scale: layout.image_scale,
        solver: layout.solver.clone(),
        tiles,
    }
}

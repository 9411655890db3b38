//! End-to-end translation of tiles: catalog, overlaps, alignment, layout.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use common::parallel::TaskScheduler;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::alignment::{align_edges, AlignedEdge};
use crate::config::{MosaicConfig, RelaxConfig, SolverStrategy};
use crate::error::MosaicError;
use crate::features::{prune_edges, score_overlaps};
use crate::image_io::ImageSource;
use crate::layout::{
    highest_weight_first, normalize_to_origin, relax_from, relax_layout, LayoutGraph,
};
use crate::math::Rect;
use crate::overlap::{build_overlap_graph, OverlapEdge};
use crate::tile::{TileCatalog, TileId};
use crate::transform::TileTransform;

/// How the layout solver finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub strategy: SolverStrategy,
    /// Final relaxation tension; `None` when relaxation did not run.
    pub tension: Option<f64>,
    pub iterations: usize,
    /// Always true for the greedy strategy.
    pub converged: bool,
    /// Groups of tiles joined by usable edges.
    pub components: usize,
    /// Tiles with no usable edge, left at their nominal positions.
    pub isolated_tiles: Vec<TileId>,
    /// Weight of edges the greedy placement could not use; `None` when it
    /// did not run.
    pub redundant_weight: Option<f64>,
}

/// Result of [`translate_tiles`].
#[derive(Debug)]
pub struct MosaicLayout {
    /// Final center of every tile in volume space.
    pub positions: BTreeMap<TileId, DVec2>,
    pub catalog: TileCatalog,
    /// Working resolution the overlaps were aligned at.
    pub image_scale: f64,
    pub edges: Vec<OverlapEdge>,
    pub alignments: Vec<AlignedEdge>,
    pub solver: SolverReport,
}

impl MosaicLayout {
    /// Correction to apply to a tile's nominal placement.
    pub fn translation(&self, id: TileId) -> Option<DVec2> {
        let tile = self.catalog.get(id)?;
        let position = self.positions.get(&id)?;
        Some(*position - tile.control_bbox().center())
    }

    /// Every tile's control box moved to its solved position.
    pub fn placements(&self) -> BTreeMap<TileId, Rect> {
        self.catalog
            .iter()
            .filter_map(|tile| {
                let translation = self.translation(tile.id())?;
                Some((tile.id(), tile.control_bbox().translate(translation)))
            })
            .collect()
    }

    /// [`placements`](Self::placements) shifted so the mosaic starts at (0, 0).
    pub fn normalized_placements(&self) -> BTreeMap<TileId, Rect> {
        normalize_to_origin(&self.placements())
    }
}

/// Computes consistent positions for the tiles described by `transforms` and
/// `image_paths` (equal length, matched by index).
///
/// Structural problems with the input fail immediately. Everything after
/// that is best effort: missing images drop their tile, per-pair faults
/// become zero-weight edges and the solver reports instead of failing.
/// Concurrency of the alignment step is whatever `scheduler` provides.
pub fn translate_tiles(
    transforms: Vec<Arc<dyn TileTransform>>,
    image_paths: Vec<PathBuf>,
    config: &MosaicConfig,
    source: &dyn ImageSource,
    scheduler: &impl TaskScheduler,
) -> Result<MosaicLayout, MosaicError> {
    config.validate()?;

    let catalog = TileCatalog::build(transforms, image_paths, source)?;
    if catalog.is_empty() {
        return Err(MosaicError::NoTiles);
    }

    let image_scale = match config.image_scale {
        Some(scale) => scale,
        None => {
            let scale = catalog.most_common_scale(source);
            tracing::info!("Using image scale {scale}");
            scale
        }
    };

    let mut edges = build_overlap_graph(&catalog, image_scale, &config.overlap);
    if config.features.enabled {
        let scores = score_overlaps(&catalog, &edges, source, &config.features);
        edges = prune_edges(edges, &scores, config.features.min_score);
    }

    let alignments = align_edges(
        &catalog,
        &edges,
        source,
        &config.correlation,
        image_scale,
        scheduler,
    );

    let graph = LayoutGraph::from_alignments(&catalog, &alignments, image_scale);
    let (positions, solver) = solve_layout(&graph, config.solver, &config.relax);

    Ok(MosaicLayout {
        positions,
        catalog,
        image_scale,
        edges,
        alignments,
        solver,
    })
}

/// Runs the chosen solver over `graph`.
pub fn solve_layout(
    graph: &LayoutGraph,
    strategy: SolverStrategy,
    relax: &RelaxConfig,
) -> (BTreeMap<TileId, DVec2>, SolverReport) {
    let components = graph.connected_components();
    let isolated_tiles: Vec<TileId> = components
        .iter()
        .filter(|c| c.len() == 1)
        .map(|c| c[0])
        .collect();
    if components.len() > 1 {
        tracing::info!(
            "Layout has {} disconnected groups, {} isolated tiles",
            components.len(),
            isolated_tiles.len()
        );
    }

    let mut report = SolverReport {
        strategy,
        tension: None,
        iterations: 0,
        converged: true,
        components: components.len(),
        isolated_tiles,
        redundant_weight: None,
    };

    let positions = match strategy {
        SolverStrategy::Relax => {
            let outcome = relax_layout(graph, relax);
            report.tension = Some(outcome.tension);
            report.iterations = outcome.iterations;
            report.converged = outcome.converged;
            outcome.positions
        }
        SolverStrategy::HighestWeightFirst => {
            let greedy = highest_weight_first(graph);
            report.redundant_weight = Some(greedy.redundant_weight);
            greedy.positions
        }
        SolverStrategy::GreedyThenRelax => {
            let greedy = highest_weight_first(graph);
            report.redundant_weight = Some(greedy.redundant_weight);
            let outcome = relax_from(graph, &greedy.positions, relax);
            report.tension = Some(outcome.tension);
            report.iterations = outcome.iterations;
            report.converged = outcome.converged;
            outcome.positions
        }
    };

    (positions, report)
}

//! Texture scoring of overlap regions.
//!
//! Blank background correlates with itself at any offset and produces
//! confident nonsense. Scoring each tile's unpadded overlap regions lets the
//! pipeline drop such edges before spending an FFT on them.


use std::collections::BTreeMap;

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;
use crate::image_io::{crop_masked, ImageSource};
use crate::math::Rect;
use crate::overlap::{EdgeSide, OverlapEdge};
use crate::tile::{TileCatalog, TileId};

/// Texture score of one side of one overlap edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionScore {
    /// Index into the edge list that was scored.
    pub edge: usize,
    pub tile: TileId,
    pub neighbor: TileId,
    pub side: EdgeSide,
    /// In `[0, 1]`; 0 for a constant region.
    pub score: f64,
}

/// Histogram entropy of `region` normalized by `ln(bins)`.
///
/// The histogram spans the region's own value range, so the score measures
/// how evenly values spread rather than their absolute contrast.
pub fn entropy_score(region: &Buffer2<f32>, bins: usize) -> f64 {
    let Some((min, max)) = region.min_max() else {
        return 0.0;
    };
    if !(min < max) || bins < 2 {
        return 0.0;
    }

    let span = (max - min) as f64;
    let mut histogram = vec![0usize; bins];
    let mut total = 0usize;
    for &value in region.pixels() {
        if value.is_nan() {
            continue;
        }
        let bin = (((value - min) as f64 / span) * bins as f64) as usize;
        histogram[bin.min(bins - 1)] += 1;
        total += 1;
    }

    let total = total as f64;
    let entropy: f64 = histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.ln()
        })
        .sum();

    (entropy / (bins as f64).ln()).clamp(0.0, 1.0)
}

/// Scores both regions of every edge.
///
/// Regions are grouped by tile so each tile image is read once. A tile that
/// cannot be read scores 0 on all its regions.
pub fn score_overlaps(
    catalog: &TileCatalog,
    edges: &[OverlapEdge],
    source: &dyn ImageSource,
    config: &FeatureConfig,
) -> Vec<RegionScore> {
    let mut by_tile: BTreeMap<TileId, Vec<(usize, TileId, EdgeSide, Rect)>> = BTreeMap::new();
    for (index, edge) in edges.iter().enumerate() {
        by_tile
            .entry(edge.a)
            .or_default()
            .push((index, edge.b, EdgeSide::A, edge.rect_a));
        by_tile
            .entry(edge.b)
            .or_default()
            .push((index, edge.a, EdgeSide::B, edge.rect_b));
    }

    let mut scores = Vec::with_capacity(edges.len() * 2);
    for (tile, regions) in by_tile {
        let image = match catalog.image(tile, source) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!("Cannot score overlaps of tile {tile}: {err}");
                None
            }
        };

        for (edge, neighbor, side, rect) in regions {
            let score = image
                .as_ref()
                .map(|image| entropy_score(&crop_masked(image, &rect), config.bins))
                .unwrap_or(0.0);
            scores.push(RegionScore {
                edge,
                tile,
                neighbor,
                side,
                score,
            });
        }
    }

    scores.sort_by_key(|s| (s.edge, s.side == EdgeSide::B));
    scores
}

/// Keeps the edges whose two regions both score at least `min_score`.
///
/// `scores` must come from [`score_overlaps`] over the same `edges`.
pub fn prune_edges(
    edges: Vec<OverlapEdge>,
    scores: &[RegionScore],
    min_score: f64,
) -> Vec<OverlapEdge> {
    let mut keep = vec![true; edges.len()];
    for score in scores {
        if score.score < min_score {
            if let Some(flag) = keep.get_mut(score.edge) {
                *flag = false;
            }
        }
    }

    let before = edges.len();
    let kept: Vec<OverlapEdge> = edges
        .into_iter()
        .zip(keep)
        .filter_map(|(edge, keep)| keep.then_some(edge))
        .collect();

    if kept.len() < before {
        tracing::info!(
            "Pruned {} of {before} overlaps with too little texture",
            before - kept.len()
        );
    }
    kept
}

//! Overlap graph: which tiles share enough area to be aligned, and where.
//!
//! For every pair of tiles whose control-space boxes overlap by at least
//! [`OverlapConfig::min_overlap_fraction`], an [`OverlapEdge`] records the
//! shared region as seen from each tile's image, at working resolution.
//!
//! Both per-tile rectangles of an edge always have identical width and height.
//! B's rectangle is re-derived from A's rounded size instead of being rounded
//! on its own, since independent rounding can differ by a pixel and bias the
//! phase correlation.

#[cfg(test)]
mod tests;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::OverlapConfig;
use crate::math::{overlap_fraction, Rect};
use crate::tile::{Tile, TileCatalog, TileId};

/// Below this many tiles the all-pairs scan is used instead of the sweep.
const SWEEP_MIN_TILES: usize = 16;

/// Two overlapping tiles and their shared region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapEdge {
    /// Lower tile id of the pair.
    pub a: TileId,
    /// Higher tile id of the pair.
    pub b: TileId,
    /// Shared area as a fraction of the smaller tile.
    pub overlap_fraction: f64,
    /// Shared region in A's image, working resolution.
    pub rect_a: Rect,
    /// Shared region in B's image, working resolution, same size as `rect_a`.
    pub rect_b: Rect,
    /// `rect_a` grown by the excess scalar; what the aligner crops.
    pub padded_rect_a: Rect,
    /// `rect_b` grown by the excess scalar, same size as `padded_rect_a`.
    pub padded_rect_b: Rect,
    /// B's control center minus A's, at working resolution.
    pub nominal_offset: DVec2,
}

impl OverlapEdge {
    /// Derives the edge for a tile pair, or `None` if they do not overlap
    /// enough. `a` must have the lower id.
    pub fn between(a: &Tile, b: &Tile, image_scale: f64, config: &OverlapConfig) -> Option<Self> {
        debug_assert!(a.id() < b.id());

        let control_a = a.control_bbox();
        let control_b = b.control_bbox();
        let shared = control_a.intersection(&control_b)?;

        let fraction = overlap_fraction(&control_a, &control_b);
        if fraction < config.min_overlap_fraction {
            return None;
        }

        let rect_a = a.image_space_rect(&shared).scale(image_scale).round();
        let raw_b = b.image_space_rect(&shared).scale(image_scale).round();
        let rect_b = Rect::from_point_and_size(raw_b.min, rect_a.size());

        let padded_size = (rect_a.size() * config.excess_scalar)
            .round()
            .max(DVec2::ONE);
        let padded_rect_a = padded_around(&rect_a, padded_size);
        let padded_rect_b = padded_around(&rect_b, padded_size);

        let nominal_offset = (control_b.center() - control_a.center()) * image_scale;

        Some(Self {
            a: a.id(),
            b: b.id(),
            overlap_fraction: fraction,
            rect_a,
            rect_b,
            padded_rect_a,
            padded_rect_b,
            nominal_offset,
        })
    }

    #[inline]
    pub fn ids(&self) -> (TileId, TileId) {
        (self.a, self.b)
    }

    /// Rectangle and side for tile `id`, if it is an endpoint of this edge.
    pub fn rect_for(&self, id: TileId) -> Option<(Rect, EdgeSide)> {
        if id == self.a {
            Some((self.rect_a, EdgeSide::A))
        } else if id == self.b {
            Some((self.rect_b, EdgeSide::B))
        } else {
            None
        }
    }
}

/// Which endpoint of an edge a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeSide {
    A,
    B,
}

/// Integer-aligned rectangle of `size` centered (to the nearest pixel) on `rect`.
///
/// Halves always round up, so A and B regions that differ by an integer
/// translation stay the same translation apart after padding, whatever
/// their sign.
fn padded_around(rect: &Rect, size: DVec2) -> Rect {
    let origin = (rect.center() - size * 0.5 + 0.5).floor();
    Rect::from_point_and_size(origin, size)
}

/// Builds every overlap edge between tiles in `catalog`, sorted by `(a, b)`.
///
/// Pairs that only touch, or whose overlap is below the configured fraction,
/// produce no edge.
pub fn build_overlap_graph(
    catalog: &TileCatalog,
    image_scale: f64,
    config: &OverlapConfig,
) -> Vec<OverlapEdge> {
    let tiles = catalog.to_vec();
    let rects: Vec<Rect> = tiles.iter().map(|t| t.control_bbox()).collect();

    let candidates = if rects.len() < SWEEP_MIN_TILES {
        all_intersecting_pairs(&rects)
    } else {
        sweep_intersecting_pairs(&rects)
    };

    let mut edges: Vec<OverlapEdge> = candidates
        .into_iter()
        .filter_map(|(i, j)| {
            let (first, second) = if tiles[i].id() < tiles[j].id() {
                (tiles[i], tiles[j])
            } else {
                (tiles[j], tiles[i])
            };
            OverlapEdge::between(first, second, image_scale, config)
        })
        .collect();

    edges.sort_by_key(|e| e.ids());

    tracing::info!(
        "Overlap graph: {} edges between {} tiles",
        edges.len(),
        tiles.len()
    );
    edges
}

/// All index pairs `(i, j)`, `i < j`, whose rectangles intersect. O(n²).
pub(crate) fn all_intersecting_pairs(rects: &[Rect]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if rects[i].intersects(&rects[j]) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Same result as [`all_intersecting_pairs`], found with a sweep along x.
///
/// Rectangles are visited by ascending `min.x`; only rectangles still open on
/// the x axis are tested on y.
pub(crate) fn sweep_intersecting_pairs(rects: &[Rect]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by(|&i, &j| rects[i].min.x.total_cmp(&rects[j].min.x));

    let mut active: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();

    for &i in &order {
        let current = &rects[i];
        active.retain(|&j| rects[j].max.x > current.min.x);

        for &j in &active {
            if rects[j].intersects(current) {
                pairs.push((i.min(j), i.max(j)));
            }
        }
        active.push(i);
    }

    pairs.sort_unstable();
    pairs
}

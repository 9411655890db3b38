//! Global layout: reconciling pairwise offsets into one position per tile.
//!
//! A [`LayoutGraph`] holds every tile's position (its control-space center
//! before solving) and one undirected constraint per measured overlap. An
//! edge `a -> b` with offset `d` asks for `pos[b] - pos[a] == d`, and so
//! equally for `pos[a] - pos[b] == -d`.

mod greedy;
mod relax;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::alignment::AlignedEdge;
use crate::math::Rect;
use crate::tile::{TileCatalog, TileId};

pub use greedy::{highest_weight_first, GreedyLayout};
pub use relax::{relax_from, relax_layout, rescale_weights, RelaxOutcome};

/// One pairwise constraint in volume units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub a: TileId,
    pub b: TileId,
    /// Desired `pos[b] - pos[a]`.
    pub offset: DVec2,
    /// `>= 0`; zero-weight edges exert no force and connect nothing.
    pub weight: f64,
}

impl LayoutEdge {
    pub fn new(a: TileId, b: TileId, offset: DVec2, weight: f64) -> Self {
        Self {
            a,
            b,
            offset,
            weight,
        }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.weight > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutGraph {
    nodes: BTreeMap<TileId, DVec2>,
    edges: Vec<LayoutEdge>,
}

impl LayoutGraph {
    /// Edges naming an unknown tile, or joining a tile to itself, are dropped.
    pub fn new(nodes: BTreeMap<TileId, DVec2>, edges: Vec<LayoutEdge>) -> Self {
        let edges = edges
            .into_iter()
            .filter(|e| {
                let known = e.a != e.b && nodes.contains_key(&e.a) && nodes.contains_key(&e.b);
                if !known {
                    tracing::warn!("Dropping layout edge {} -> {}", e.a, e.b);
                }
                known
            })
            .collect();
        Self { nodes, edges }
    }

    /// Nodes at the tiles' control-space centers; edges from the measured
    /// offsets converted back to volume units.
    pub fn from_alignments(catalog: &TileCatalog, aligned: &[AlignedEdge], image_scale: f64) -> Self {
        let nodes = catalog
            .iter()
            .map(|tile| (tile.id(), tile.control_bbox().center()))
            .collect();
        let edges = aligned
            .iter()
            .map(|e| LayoutEdge::new(e.a, e.b, e.result.offset / image_scale, e.result.weight))
            .collect();
        Self::new(nodes, edges)
    }

    #[inline]
    pub fn nodes(&self) -> &BTreeMap<TileId, DVec2> {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[LayoutEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn position(&self, id: TileId) -> Option<DVec2> {
        self.nodes.get(&id).copied()
    }

    /// Largest `|pos[b] - pos[a] - offset|` over usable edges at `positions`.
    pub fn max_residual(&self, positions: &BTreeMap<TileId, DVec2>) -> f64 {
        self.edges
            .iter()
            .filter(|e| e.is_usable())
            .filter_map(|e| {
                let a = positions.get(&e.a)?;
                let b = positions.get(&e.b)?;
                Some((*b - *a - e.offset).length())
            })
            .fold(0.0, f64::max)
    }

    /// Groups of tiles joined by usable edges, each sorted by id, ordered by
    /// their smallest id. Isolated tiles form their own group.
    pub fn connected_components(&self) -> Vec<Vec<TileId>> {
        let mut adjacency: BTreeMap<TileId, Vec<TileId>> =
            self.nodes.keys().map(|&id| (id, Vec::new())).collect();
        for edge in self.edges.iter().filter(|e| e.is_usable()) {
            adjacency.entry(edge.a).or_default().push(edge.b);
            adjacency.entry(edge.b).or_default().push(edge.a);
        }

        let mut visited = BTreeSet::new();
        let mut components = Vec::new();
        for &start in self.nodes.keys() {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                for &next in adjacency.get(&id).into_iter().flatten() {
                    if visited.insert(next) {
                        component.push(next);
                        stack.push(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

/// Translates every placement so the union of all of them starts at (0, 0).
pub fn normalize_to_origin(placements: &BTreeMap<TileId, Rect>) -> BTreeMap<TileId, Rect> {
    let corners: Vec<DVec2> = placements.values().map(|r| r.min).collect();
    let Some(bounds) = Rect::from_points(&corners) else {
        return BTreeMap::new();
    };
    placements
        .iter()
        .map(|(&id, rect)| (id, rect.translate(-bounds.min)))
        .collect()
}

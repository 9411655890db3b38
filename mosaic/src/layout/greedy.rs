use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::LayoutGraph;
use crate::tile::TileId;

/// Placement built along the strongest edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreedyLayout {
    pub positions: BTreeMap<TileId, DVec2>,
    /// Indices of the graph edges that placed a tile, in placement order.
    pub spanning_edges: Vec<usize>,
    /// Sum of weights over `spanning_edges`.
    pub accepted_weight: f64,
    /// Sum of weights over usable edges between tiles that were already placed.
    pub redundant_weight: f64,
}

/// Places tiles along the highest-weight edges first.
///
/// Edges are ranked by descending weight, ties by ascending `(min id, max id)`.
/// The lower-id endpoint of the best edge of each connected component stays
/// at its nominal position, whichever way the edge points; from there the best edge reaching an unplaced tile
/// always places it next. Tiles without usable edges keep their nominal
/// positions.
pub fn highest_weight_first(graph: &LayoutGraph) -> GreedyLayout {
    let edges = graph.edges();

    let mut order: Vec<usize> = (0..edges.len()).filter(|&i| edges[i].is_usable()).collect();
    order.sort_by(|&i, &j| {
        let key = |k: usize| (edges[k].a.min(edges[k].b), edges[k].a.max(edges[k].b));
        edges[j]
            .weight
            .total_cmp(&edges[i].weight)
            .then_with(|| key(i).cmp(&key(j)))
    });

    let mut rank = vec![usize::MAX; edges.len()];
    let mut adjacency: BTreeMap<TileId, Vec<usize>> = BTreeMap::new();
    for (r, &e) in order.iter().enumerate() {
        rank[e] = r;
        adjacency.entry(edges[e].a).or_default().push(e);
        adjacency.entry(edges[e].b).or_default().push(e);
    }

    let mut placed: BTreeMap<TileId, DVec2> = BTreeMap::new();
    let mut queued = vec![false; edges.len()];
    let mut spanning_edges = Vec::new();
    let mut accepted_weight = 0.0;
    let mut redundant_weight = 0.0;

    // Min-heap on rank: best remaining edge first.
    let mut frontier: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    let mut push_adjacent = |id: TileId, frontier: &mut BinaryHeap<Reverse<usize>>| {
        for &e in adjacency.get(&id).into_iter().flatten() {
            if !queued[e] {
                queued[e] = true;
                frontier.push(Reverse(rank[e]));
            }
        }
    };

    for &seed in &order {
        let anchor = edges[seed].a.min(edges[seed].b);
        if placed.contains_key(&anchor) {
            continue;
        }
        let Some(nominal) = graph.position(anchor) else {
            continue;
        };
        placed.insert(anchor, nominal);
        push_adjacent(anchor, &mut frontier);

        while let Some(Reverse(r)) = frontier.pop() {
            let e = order[r];
            let edge = &edges[e];
            let next = match (placed.get(&edge.a), placed.get(&edge.b)) {
                (Some(_), Some(_)) => {
                    redundant_weight += edge.weight;
                    continue;
                }
                (Some(&a), None) => (edge.b, a + edge.offset),
                (None, Some(&b)) => (edge.a, b - edge.offset),
                (None, None) => continue,
            };

            placed.insert(next.0, next.1);
            spanning_edges.push(e);
            accepted_weight += edge.weight;
            push_adjacent(next.0, &mut frontier);
        }
    }

    let positions = graph
        .nodes()
        .iter()
        .map(|(&id, &nominal)| (id, placed.get(&id).copied().unwrap_or(nominal)))
        .collect();

    tracing::debug!(
        "Greedy placement: {} spanning edges, accepted weight {accepted_weight:.3}, redundant weight {redundant_weight:.3}",
        spanning_edges.len()
    );

    GreedyLayout {
        positions,
        spanning_edges,
        accepted_weight,
        redundant_weight,
    }
}

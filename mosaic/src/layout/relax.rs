use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::LayoutGraph;
use crate::config::RelaxConfig;
use crate::tile::TileId;

/// Final state of a relaxation run.
///
/// Hitting the iteration cap is not an error; `converged` and `tension` say
/// how far from consistent the returned positions are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxOutcome {
    pub positions: BTreeMap<TileId, DVec2>,
    /// Largest net force on any tile at the returned positions.
    pub tension: f64,
    /// Update passes applied.
    pub iterations: usize,
    pub converged: bool,
}

/// Maps weights to `[min_allowed, max_allowed]` by rank.
///
/// Zero weights stay zero and take no part in the ranking. Ranks are dense
/// over the distinct non-zero values: the lowest maps to `min_allowed`, the
/// highest to `max_allowed`, and equal weights share a rank. When all
/// non-zero weights are equal they map to `max_allowed`.
pub fn rescale_weights(weights: &[f64], min_allowed: f64, max_allowed: f64) -> Vec<f64> {
    let mut distinct: Vec<f64> = weights.iter().copied().filter(|&w| w > 0.0).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let steps = distinct.len().saturating_sub(1);
    weights
        .iter()
        .map(|&w| {
            if w.is_nan() || w <= 0.0 {
                return 0.0;
            }
            if steps == 0 {
                return max_allowed;
            }
            let rank = distinct.partition_point(|&d| d < w);
            let t = rank as f64 / steps as f64;
            min_allowed + (max_allowed - min_allowed) * t
        })
        .collect()
}

/// Spring relaxation starting from the graph's own node positions.
pub fn relax_layout(graph: &LayoutGraph, config: &RelaxConfig) -> RelaxOutcome {
    relax_from(graph, graph.nodes(), config)
}

/// Spring relaxation starting from `initial`.
///
/// Every usable edge pulls its endpoints toward `pos[b] - pos[a] == offset`
/// with its rescaled weight. Each pass computes all forces from the previous
/// positions, then moves every tile by `step` times its weight-normalized
/// force. Stops once tension drops below the cutoff or after
/// `max_iterations` passes. Tiles missing from `initial` start at their graph
/// position.
pub fn relax_from(
    graph: &LayoutGraph,
    initial: &BTreeMap<TileId, DVec2>,
    config: &RelaxConfig,
) -> RelaxOutcome {
    let ids: Vec<TileId> = graph.nodes().keys().copied().collect();
    let index: BTreeMap<TileId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut positions: Vec<DVec2> = graph
        .nodes()
        .iter()
        .map(|(id, &nominal)| initial.get(id).copied().unwrap_or(nominal))
        .collect();

    let raw: Vec<f64> = graph.edges().iter().map(|e| e.weight).collect();
    let weights = rescale_weights(&raw, config.min_allowed_weight, config.max_allowed_weight);

    let springs: Vec<(usize, usize, DVec2, f64)> = graph
        .edges()
        .iter()
        .zip(&weights)
        .filter(|&(_, &w)| w > 0.0)
        .filter_map(|(e, &w)| Some((*index.get(&e.a)?, *index.get(&e.b)?, e.offset, w)))
        .collect();

    let mut stiffness = vec![0.0f64; positions.len()];
    for &(a, b, _, w) in &springs {
        stiffness[a] += w;
        stiffness[b] += w;
    }

    let mut forces = vec![DVec2::ZERO; positions.len()];
    let mut iterations = 0;
    let mut tension;
    let converged = loop {
        forces.fill(DVec2::ZERO);
        for &(a, b, offset, w) in &springs {
            let discrepancy = (positions[b] - positions[a]) - offset;
            forces[a] += discrepancy * w;
            forces[b] -= discrepancy * w;
        }
        tension = forces.iter().map(|f| f.length()).fold(0.0, f64::max);

        if tension < config.max_tension_cutoff {
            break true;
        }
        if iterations >= config.max_iterations {
            break false;
        }

        for ((position, force), &k) in positions.iter_mut().zip(&forces).zip(&stiffness) {
            if k > 0.0 {
                *position += *force * (config.step / k);
            }
        }
        iterations += 1;
    };

    if converged {
        tracing::info!("Relaxation converged after {iterations} passes, tension {tension:.4}");
    } else {
        tracing::info!(
            "Relaxation stopped at {iterations} passes with tension {tension:.4} above cutoff {}",
            config.max_tension_cutoff
        );
    }

    RelaxOutcome {
        positions: ids.into_iter().zip(positions).collect(),
        tension,
        iterations,
        converged,
    }
}

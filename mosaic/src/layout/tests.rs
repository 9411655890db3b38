use std::collections::BTreeMap;

use glam::DVec2;

use super::*;
use crate::config::RelaxConfig;

const A: TileId = TileId(0);
const B: TileId = TileId(1);
const C: TileId = TileId(2);
const D: TileId = TileId(3);

fn nodes(positions: &[(TileId, DVec2)]) -> BTreeMap<TileId, DVec2> {
    positions.iter().copied().collect()
}

/// 2x2 grid of 100x100 tiles with 10% overlap, nodes at their centers.
fn grid_nodes() -> BTreeMap<TileId, DVec2> {
    nodes(&[
        (A, DVec2::new(50.0, 50.0)),
        (B, DVec2::new(140.0, 50.0)),
        (C, DVec2::new(50.0, 140.0)),
        (D, DVec2::new(140.0, 140.0)),
    ])
}

fn star_edges() -> Vec<LayoutEdge> {
    vec![
        LayoutEdge::new(A, B, DVec2::new(90.0, 0.0), 1.0),
        LayoutEdge::new(A, C, DVec2::new(0.0, 90.0), 1.0),
        LayoutEdge::new(A, D, DVec2::new(90.0, 90.0), 1.0),
    ]
}

fn tight() -> RelaxConfig {
    RelaxConfig {
        max_iterations: 1000,
        max_tension_cutoff: 1e-6,
        ..RelaxConfig::default()
    }
}

fn assert_relative(positions: &BTreeMap<TileId, DVec2>, from: TileId, to: TileId, expected: DVec2) {
    let actual = positions[&to] - positions[&from];
    assert!(
        (actual - expected).abs().max_element() <= 0.1,
        "{from} -> {to}: expected {expected:?}, got {actual:?}"
    );
}

#[test]
fn test_consistent_grid_needs_no_passes() {
    let graph = LayoutGraph::new(grid_nodes(), star_edges());
    let outcome = relax_layout(&graph, &RelaxConfig::default());

    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    assert!(outcome.tension < 1e-9);
    assert_eq!(outcome.positions, grid_nodes());
}

#[test]
fn test_grid_converges_from_perturbed_start() {
    let start = nodes(&[
        (A, DVec2::new(47.0, 52.0)),
        (B, DVec2::new(146.0, 44.0)),
        (C, DVec2::new(55.0, 133.0)),
        (D, DVec2::new(131.0, 149.0)),
    ]);
    let graph = LayoutGraph::new(start, star_edges());
    let outcome = relax_layout(&graph, &tight());

    assert!(outcome.converged, "tension {}", outcome.tension);
    assert!(outcome.tension < 1e-6);
    assert_relative(&outcome.positions, A, B, DVec2::new(90.0, 0.0));
    assert_relative(&outcome.positions, A, C, DVec2::new(0.0, 90.0));
    assert_relative(&outcome.positions, A, D, DVec2::new(90.0, 90.0));
    assert!(graph.max_residual(&outcome.positions) < 0.1);
}

#[test]
fn test_zero_weight_edge_resolved_transitively() {
    // Side edges of the grid; B -> D carries no signal.
    let edges = vec![
        LayoutEdge::new(A, B, DVec2::new(90.0, 0.0), 1.0),
        LayoutEdge::new(A, C, DVec2::new(0.0, 90.0), 1.0),
        LayoutEdge::new(B, D, DVec2::new(30.0, -50.0), 0.0),
        LayoutEdge::new(C, D, DVec2::new(90.0, 0.0), 1.0),
    ];
    let start = nodes(&[
        (A, DVec2::new(50.0, 50.0)),
        (B, DVec2::new(145.0, 48.0)),
        (C, DVec2::new(52.0, 137.0)),
        (D, DVec2::new(150.0, 150.0)),
    ]);
    let graph = LayoutGraph::new(start, edges);
    assert_eq!(graph.connected_components(), vec![vec![A, B, C, D]]);

    let outcome = relax_layout(&graph, &tight());

    assert!(outcome.converged);
    // B -> D follows from B -> A -> C -> D, not from the zero-weight edge.
    assert_relative(&outcome.positions, B, D, DVec2::new(0.0, 90.0));
    assert_relative(&outcome.positions, A, D, DVec2::new(90.0, 90.0));
}

#[test]
fn test_iteration_cap_is_respected() {
    let start = nodes(&[(A, DVec2::ZERO), (B, DVec2::new(500.0, 0.0))]);
    let edges = vec![LayoutEdge::new(A, B, DVec2::new(90.0, 0.0), 1.0)];
    let graph = LayoutGraph::new(start, edges);

    for max_iterations in [0, 1, 3] {
        let config = RelaxConfig {
            max_iterations,
            max_tension_cutoff: 1e-9,
            step: 0.2,
            ..RelaxConfig::default()
        };
        let outcome = relax_layout(&graph, &config);
        assert_eq!(outcome.iterations, max_iterations);
        assert!(!outcome.converged);
        assert!(outcome.tension > config.max_tension_cutoff);
    }
}

#[test]
fn test_contradictory_measurements_do_not_fail() {
    // A triangle whose offsets cannot all hold.
    let start = nodes(&[(A, DVec2::ZERO), (B, DVec2::new(90.0, 0.0)), (C, DVec2::new(0.0, 90.0))]);
    let edges = vec![
        LayoutEdge::new(A, B, DVec2::new(90.0, 0.0), 1.0),
        LayoutEdge::new(B, C, DVec2::new(-90.0, 90.0), 0.5),
        LayoutEdge::new(A, C, DVec2::new(20.0, 90.0), 0.2),
    ];
    let graph = LayoutGraph::new(start, edges);
    let config = RelaxConfig {
        max_iterations: 25,
        max_tension_cutoff: 1e-9,
        ..RelaxConfig::default()
    };
    let outcome = relax_layout(&graph, &config);
    assert_eq!(outcome.positions.len(), 3);
    assert!(outcome.iterations <= 25);
    assert!(outcome.positions.values().all(|p| p.is_finite()));
}

#[test]
fn test_rescale_weights_by_rank() {
    let weights = [0.0, 3.0, 10.0, 3.0, 7.0, 0.0];
    let rescaled = rescale_weights(&weights, 0.25, 1.0);

    assert_eq!(rescaled[0], 0.0, "zero stays zero");
    assert_eq!(rescaled[5], 0.0);
    assert_eq!(rescaled[1], 0.25, "minimum maps to the lower bound");
    assert_eq!(rescaled[3], 0.25, "ties share a rank");
    assert_eq!(rescaled[2], 1.0, "maximum maps to the upper bound");
    assert_eq!(rescaled[4], 0.625, "ranks count distinct values");
}

#[test]
fn test_rescale_tied_maximum_reaches_upper_bound() {
    assert_eq!(rescale_weights(&[1.0, 2.0, 2.0], 0.25, 1.0), vec![0.25, 1.0, 1.0]);
    assert_eq!(rescale_weights(&[2.0, 2.0, 1.0, 0.0], 0.25, 1.0), vec![1.0, 1.0, 0.25, 0.0]);
    assert_eq!(rescale_weights(&[3.0, 3.0], 0.25, 1.0), vec![1.0, 1.0]);
}

#[test]
fn test_rescale_weights_is_monotonic() {
    let weights = [5.0, 0.1, 2.0, 900.0, 2.5, 0.3, 44.0];
    let rescaled = rescale_weights(&weights, 0.25, 1.0);
    for i in 0..weights.len() {
        for j in 0..weights.len() {
            if weights[i] < weights[j] {
                assert!(rescaled[i] <= rescaled[j], "{i} vs {j}");
            }
        }
    }
}

#[test]
fn test_rescale_single_and_empty() {
    assert_eq!(rescale_weights(&[0.0, 4.0], 0.25, 1.0), vec![0.0, 1.0]);
    assert!(rescale_weights(&[], 0.25, 1.0).is_empty());
    assert_eq!(rescale_weights(&[0.0, 0.0], 0.25, 1.0), vec![0.0, 0.0]);
}

#[test]
fn test_greedy_chain_is_order_independent() {
    let start = nodes(&[
        (A, DVec2::new(0.0, 0.0)),
        (B, DVec2::new(95.0, 3.0)),
        (C, DVec2::new(185.0, -4.0)),
    ]);
    let ab = LayoutEdge::new(A, B, DVec2::new(90.0, 1.0), 5.0);
    let bc = LayoutEdge::new(B, C, DVec2::new(88.0, -2.0), 2.0);

    let forward = highest_weight_first(&LayoutGraph::new(start.clone(), vec![ab, bc]));
    let reversed = highest_weight_first(&LayoutGraph::new(start, vec![bc, ab]));

    assert_eq!(forward.positions, reversed.positions);
    assert_eq!(forward.positions[&A], DVec2::ZERO, "anchor stays nominal");
    assert_eq!(forward.positions[&B], DVec2::new(90.0, 1.0));
    assert_eq!(forward.positions[&C], DVec2::new(178.0, -1.0));
    assert_eq!(forward.spanning_edges, vec![0, 1]);
    assert_eq!(reversed.spanning_edges, vec![1, 0]);
    assert_eq!(forward.accepted_weight, 7.0);
    assert_eq!(forward.redundant_weight, 0.0);
}

#[test]
fn test_greedy_places_against_edge_direction() {
    // A is anchored by A -> C; B is then reached through B -> A.
    let start = nodes(&[
        (A, DVec2::new(10.0, 10.0)),
        (B, DVec2::new(-80.0, 10.0)),
        (C, DVec2::new(10.0, 100.0)),
    ]);
    let edges = vec![
        LayoutEdge::new(A, C, DVec2::new(0.0, 91.0), 2.0),
        LayoutEdge::new(B, A, DVec2::new(92.0, 0.0), 1.0),
    ];
    let layout = highest_weight_first(&LayoutGraph::new(start, edges));
    assert_eq!(layout.positions[&A], DVec2::new(10.0, 10.0));
    assert_eq!(layout.positions[&C], DVec2::new(10.0, 101.0));
    assert_eq!(layout.positions[&B], DVec2::new(-82.0, 10.0));
}

#[test]
fn test_greedy_anchor_ignores_edge_direction() {
    let start = nodes(&[
        (A, DVec2::new(0.0, 0.0)),
        (B, DVec2::new(95.0, 3.0)),
        (C, DVec2::new(0.0, 90.0)),
    ]);
    let forward = vec![
        LayoutEdge::new(A, B, DVec2::new(90.0, 1.0), 5.0),
        LayoutEdge::new(A, C, DVec2::new(-1.0, 88.0), 2.0),
    ];
    let reversed = vec![
        LayoutEdge::new(B, A, DVec2::new(-90.0, -1.0), 5.0),
        LayoutEdge::new(C, A, DVec2::new(1.0, -88.0), 2.0),
    ];

    let forward = highest_weight_first(&LayoutGraph::new(start.clone(), forward));
    let reversed = highest_weight_first(&LayoutGraph::new(start, reversed));

    assert_eq!(forward.positions[&A], DVec2::ZERO, "lower id is the anchor");
    assert_eq!(reversed.positions, forward.positions);
    assert_eq!(reversed.positions[&B], DVec2::new(90.0, 1.0));
    assert_eq!(reversed.positions[&C], DVec2::new(-1.0, 88.0));
}

#[test]
fn test_greedy_counts_redundant_edges_and_components() {
    let start = nodes(&[
        (A, DVec2::ZERO),
        (B, DVec2::new(90.0, 0.0)),
        (C, DVec2::new(0.0, 90.0)),
        (D, DVec2::new(1000.0, 1000.0)),
        (TileId(4), DVec2::new(1090.0, 1000.0)),
        (TileId(5), DVec2::new(-500.0, 0.0)),
    ]);
    let edges = vec![
        LayoutEdge::new(A, B, DVec2::new(91.0, 0.0), 3.0),
        LayoutEdge::new(A, C, DVec2::new(0.0, 89.0), 2.0),
        LayoutEdge::new(B, C, DVec2::new(-91.0, 89.0), 1.0),
        LayoutEdge::new(D, TileId(4), DVec2::new(88.0, 0.0), 0.5),
        LayoutEdge::new(A, TileId(5), DVec2::new(-500.0, 0.0), 0.0),
    ];
    let graph = LayoutGraph::new(start, edges);
    let layout = highest_weight_first(&graph);

    assert_eq!(layout.redundant_weight, 1.0);
    assert_eq!(layout.accepted_weight, 5.5);
    assert_eq!(layout.positions[&D], DVec2::new(1000.0, 1000.0), "second anchor");
    assert_eq!(layout.positions[&TileId(4)], DVec2::new(1088.0, 1000.0));
    assert_eq!(layout.positions[&TileId(5)], DVec2::new(-500.0, 0.0), "no usable edge");

    assert_eq!(
        graph.connected_components(),
        vec![vec![A, B, C], vec![D, TileId(4)], vec![TileId(5)]]
    );
}

#[test]
fn test_relax_from_greedy_seed() {
    let graph = LayoutGraph::new(grid_nodes(), star_edges());
    let greedy = highest_weight_first(&graph);
    let outcome = relax_from(&graph, &greedy.positions, &RelaxConfig::default());
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
}

#[test]
fn test_graph_drops_unknown_endpoints() {
    let graph = LayoutGraph::new(
        nodes(&[(A, DVec2::ZERO), (B, DVec2::ONE)]),
        vec![
            LayoutEdge::new(A, B, DVec2::ONE, 1.0),
            LayoutEdge::new(A, D, DVec2::ONE, 1.0),
            LayoutEdge::new(B, B, DVec2::ZERO, 1.0),
        ],
    );
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn test_normalize_to_origin() {
    let placements: BTreeMap<TileId, Rect> = [
        (A, Rect::from_bounds(-12.0, 5.0, 88.0, 105.0)),
        (B, Rect::from_bounds(78.0, -3.0, 178.0, 97.0)),
    ]
    .into_iter()
    .collect();
    let normalized = normalize_to_origin(&placements);
    assert_eq!(normalized[&A], Rect::from_bounds(0.0, 8.0, 100.0, 108.0));
    assert_eq!(normalized[&B], Rect::from_bounds(90.0, 0.0, 190.0, 100.0));
    assert!(normalize_to_origin(&BTreeMap::new()).is_empty());
}

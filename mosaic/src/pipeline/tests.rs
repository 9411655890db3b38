use std::collections::BTreeMap;

use common::parallel::SequentialScheduler;
use common::Buffer2;

use super::*;
use crate::alignment::AlignmentStatus;
use crate::image_io::{FillPolicy, MemoryImageSource};
use crate::layout::LayoutEdge;
use crate::transform::StageTransform;

fn stage(x: f64, y: f64) -> Arc<dyn TileTransform> {
    Arc::new(StageTransform::new(DVec2::new(x, y), DVec2::splat(100.0)))
}

fn chain_graph() -> LayoutGraph {
    let nodes: BTreeMap<TileId, DVec2> = [
        (TileId(0), DVec2::new(50.0, 50.0)),
        (TileId(1), DVec2::new(140.0, 50.0)),
        (TileId(2), DVec2::new(230.0, 50.0)),
        (TileId(3), DVec2::new(900.0, 900.0)),
    ]
    .into_iter()
    .collect();
    let edges = vec![
        LayoutEdge::new(TileId(0), TileId(1), DVec2::new(92.0, 1.0), 4.0),
        LayoutEdge::new(TileId(1), TileId(2), DVec2::new(89.0, 0.0), 2.0),
    ];
    LayoutGraph::new(nodes, edges)
}

#[test]
fn test_solve_layout_strategies() {
    let graph = chain_graph();
    let relax = RelaxConfig {
        max_tension_cutoff: 1e-6,
        max_iterations: 500,
        ..RelaxConfig::default()
    };

    let (greedy, report) = solve_layout(&graph, SolverStrategy::HighestWeightFirst, &relax);
    assert_eq!(greedy[&TileId(1)], DVec2::new(142.0, 51.0));
    assert_eq!(greedy[&TileId(2)], DVec2::new(231.0, 51.0));
    assert_eq!(report.tension, None);
    assert_eq!(report.redundant_weight, Some(0.0));
    assert_eq!(report.components, 2);
    assert_eq!(report.isolated_tiles, vec![TileId(3)]);

    let (relaxed, report) = solve_layout(&graph, SolverStrategy::Relax, &relax);
    assert!(report.converged);
    assert!(report.tension.is_some());
    let step = relaxed[&TileId(1)] - relaxed[&TileId(0)];
    assert!((step - DVec2::new(92.0, 1.0)).length() < 0.01);
    assert_eq!(relaxed[&TileId(3)], DVec2::new(900.0, 900.0));

    let (seeded, report) = solve_layout(&graph, SolverStrategy::GreedyThenRelax, &relax);
    assert!(report.converged);
    assert_eq!(report.iterations, 0, "greedy placement of a tree is already consistent");
    assert_eq!(seeded, greedy);
}

#[test]
fn test_rejects_bad_input_before_work() {
    let source = MemoryImageSource::new();

    let result = translate_tiles(
        vec![stage(0.0, 0.0)],
        vec![],
        &MosaicConfig::default(),
        &source,
        &SequentialScheduler,
    );
    assert!(matches!(result, Err(MosaicError::LengthMismatch { .. })));

    let mut config = MosaicConfig::default();
    config.relax.step = 0.0;
    let result = translate_tiles(
        vec![stage(0.0, 0.0)],
        vec!["a.png".into()],
        &config,
        &source,
        &SequentialScheduler,
    );
    assert!(matches!(result, Err(MosaicError::InvalidConfig(_))));
}

#[test]
fn test_all_images_missing_is_no_tiles() {
    let result = translate_tiles(
        vec![stage(0.0, 0.0), stage(90.0, 0.0)],
        vec!["a.png".into(), "b.png".into()],
        &MosaicConfig::default(),
        &MemoryImageSource::new(),
        &SequentialScheduler,
    );
    assert!(matches!(result, Err(MosaicError::NoTiles)));
}

#[test]
fn test_blank_tiles_stay_nominal() {
    let mut source = MemoryImageSource::new();
    source.insert("a.png", Buffer2::new_filled(100, 100, 0.0));
    source.insert("b.png", Buffer2::new_filled(100, 100, 0.0));

    let layout = translate_tiles(
        vec![stage(0.0, 0.0), stage(90.0, 0.0)],
        vec!["a.png".into(), "b.png".into()],
        &MosaicConfig::default(),
        &source,
        &SequentialScheduler,
    )
    .unwrap();

    assert_eq!(layout.image_scale, 1.0);
    assert_eq!(layout.edges.len(), 1);
    assert_eq!(layout.alignments[0].result.weight, 0.0);
    assert_eq!(layout.translation(TileId(0)), Some(DVec2::ZERO));
    assert_eq!(layout.translation(TileId(1)), Some(DVec2::ZERO));
    assert_eq!(layout.solver.isolated_tiles, vec![TileId(0), TileId(1)]);

    let placements = layout.normalized_placements();
    assert_eq!(placements[&TileId(1)], Rect::from_bounds(90.0, 0.0, 190.0, 100.0));
}

#[test]
fn test_flat_grey_tiles_stay_nominal() {
    let mut source = MemoryImageSource::new();
    source.insert("a.png", Buffer2::new_filled(100, 100, 0.2));
    source.insert("b.png", Buffer2::new_filled(100, 100, 0.2));

    for fill in [FillPolicy::Zero, FillPolicy::Random { seed: 5 }] {
        let mut config = MosaicConfig::default();
        config.correlation.fill = fill;

        let layout = translate_tiles(
            vec![stage(0.0, 0.0), stage(90.0, 0.0)],
            vec!["a.png".into(), "b.png".into()],
            &config,
            &source,
            &SequentialScheduler,
        )
        .unwrap();

        let result = layout.alignments[0].result;
        assert_eq!(result.status, AlignmentStatus::Degenerate, "{fill:?}");
        assert_eq!(result.weight, 0.0);
        assert_eq!(result.offset, layout.alignments[0].nominal_offset);
        assert_eq!(layout.translation(TileId(1)), Some(DVec2::ZERO));
        assert_eq!(layout.solver.isolated_tiles, vec![TileId(0), TileId(1)]);
    }
}

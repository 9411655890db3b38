use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::math::Rect;
use crate::tile::TileRecord;
use crate::transform::StageTransform;

fn catalog_of(placements: &[(f64, f64, f64, f64)]) -> TileCatalog {
    let records = placements
        .iter()
        .enumerate()
        .map(|(i, &(x, y, w, h))| TileRecord {
            id: TileId(i as u32),
            image_path: format!("tile_{i}.png").into(),
            transform: StageTransform::new(DVec2::new(x, y), DVec2::new(w, h)),
        })
        .collect();
    TileCatalog::from_records(records).unwrap()
}

fn grid_2x2() -> TileCatalog {
    catalog_of(&[
        (0.0, 0.0, 100.0, 100.0),
        (90.0, 0.0, 100.0, 100.0),
        (0.0, 90.0, 100.0, 100.0),
        (90.0, 90.0, 100.0, 100.0),
    ])
}

#[test]
fn test_grid_side_overlaps_only() {
    let edges = build_overlap_graph(&grid_2x2(), 1.0, &OverlapConfig::default());

    let ids: Vec<(u32, u32)> = edges.iter().map(|e| (e.a.0, e.b.0)).collect();
    // Diagonal pairs overlap by 1% and fall below the 5% default.
    assert_eq!(ids, vec![(0, 1), (0, 2), (1, 3), (2, 3)]);

    for edge in &edges {
        assert!((edge.overlap_fraction - 0.1).abs() < 1e-12);
    }
}

#[test]
fn test_low_threshold_admits_diagonals() {
    let config = OverlapConfig {
        min_overlap_fraction: 0.01,
        ..OverlapConfig::default()
    };
    let edges = build_overlap_graph(&grid_2x2(), 1.0, &config);
    assert_eq!(edges.len(), 6);
}

#[test]
fn test_touching_tiles_have_no_edge() {
    let catalog = catalog_of(&[(0.0, 0.0, 100.0, 100.0), (100.0, 0.0, 100.0, 100.0)]);
    let config = OverlapConfig {
        min_overlap_fraction: 0.0,
        ..OverlapConfig::default()
    };
    assert!(build_overlap_graph(&catalog, 1.0, &config).is_empty());
}

#[test]
fn test_edge_regions() {
    let edges = build_overlap_graph(&grid_2x2(), 1.0, &OverlapConfig::default());
    let right = &edges[0];
    assert_eq!(right.ids(), (TileId(0), TileId(1)));

    // Right strip of A, left strip of B.
    assert_eq!(right.rect_a, Rect::from_bounds(90.0, 0.0, 100.0, 100.0));
    assert_eq!(right.rect_b, Rect::from_bounds(0.0, 0.0, 10.0, 100.0));
    assert_eq!(right.nominal_offset, DVec2::new(90.0, 0.0));

    // Padded by 1.5 around the same centers.
    assert_eq!(right.padded_rect_a.size(), DVec2::new(15.0, 150.0));
    let drift = (right.padded_rect_a.center() - right.rect_a.center()).abs();
    assert!(drift.max_element() <= 0.5);
    assert_eq!(right.padded_rect_b.size(), right.padded_rect_a.size());

    assert_eq!(right.rect_for(TileId(1)).map(|(_, side)| side), Some(EdgeSide::B));
    assert_eq!(right.rect_for(TileId(3)), None);
}

#[test]
fn test_image_scale_shrinks_regions() {
    let edges = build_overlap_graph(&grid_2x2(), 0.5, &OverlapConfig::default());
    let right = &edges[0];
    assert_eq!(right.rect_a, Rect::from_bounds(45.0, 0.0, 50.0, 50.0));
    assert_eq!(right.nominal_offset, DVec2::new(45.0, 0.0));
    assert!((right.overlap_fraction - 0.1).abs() < 1e-12);
}

#[test]
fn test_fractional_placement_keeps_equal_sizes() {
    let mut rng = StdRng::seed_from_u64(17);
    let placements: Vec<(f64, f64, f64, f64)> = (0..12)
        .map(|i| {
            let col = (i % 4) as f64;
            let row = (i / 4) as f64;
            (
                col * 87.3 + rng.random_range(-3.0..3.0),
                row * 88.9 + rng.random_range(-3.0..3.0),
                100.0,
                100.0,
            )
        })
        .collect();
    let catalog = catalog_of(&placements);

    for scale in [1.0, 0.37, 0.5] {
        let edges = build_overlap_graph(&catalog, scale, &OverlapConfig::default());
        assert!(!edges.is_empty());
        for edge in &edges {
            assert_eq!(edge.rect_a.size(), edge.rect_b.size(), "{edge:?}");
            assert_eq!(edge.padded_rect_a.size(), edge.padded_rect_b.size(), "{edge:?}");
            assert!(edge.a < edge.b);
            assert!(edge.overlap_fraction >= 0.05);
        }
    }
}

#[test]
fn test_sweep_matches_all_pairs() {
    let mut rng = StdRng::seed_from_u64(5);
    let rects: Vec<Rect> = (0..200)
        .map(|_| {
            let origin = DVec2::new(rng.random_range(0.0..1000.0), rng.random_range(0.0..1000.0));
            let size = DVec2::new(rng.random_range(5.0..80.0), rng.random_range(5.0..80.0));
            Rect::from_point_and_size(origin, size)
        })
        .collect();

    assert_eq!(sweep_intersecting_pairs(&rects), all_intersecting_pairs(&rects));
}

#[test]
fn test_large_grid_uses_same_edges() {
    // 6x6 grid: above the sweep threshold.
    let placements: Vec<(f64, f64, f64, f64)> = (0..36)
        .map(|i| ((i % 6) as f64 * 90.0, (i / 6) as f64 * 90.0, 100.0, 100.0))
        .collect();
    let catalog = catalog_of(&placements);
    let edges = build_overlap_graph(&catalog, 1.0, &OverlapConfig::default());

    // 6 rows of 5 horizontal pairs plus 6 columns of 5 vertical pairs.
    assert_eq!(edges.len(), 60);
    assert!(edges.windows(2).all(|w| w[0].ids() < w[1].ids()));
}

#[test]
fn test_empty_catalog() {
    let catalog = TileCatalog::default();
    assert!(build_overlap_graph(&catalog, 1.0, &OverlapConfig::default()).is_empty());
}

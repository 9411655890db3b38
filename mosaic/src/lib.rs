//! Mosaic - tile alignment for large image mosaics.
//!
//! Given tiles with approximate stage positions, this crate:
//! - Finds which tiles overlap and where
//! - Measures each overlap's true offset by phase correlation
//! - Reconciles all offsets into one consistent position per tile
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mosaic::{translate_tiles, FileImageSource, MosaicConfig, StageTransform};
//! use common::parallel::RayonScheduler;
//!
//! let layout = translate_tiles(
//!     transforms,
//!     image_paths,
//!     &MosaicConfig::default(),
//!     &FileImageSource,
//!     &RayonScheduler::new(),
//! )?;
//!
//! for (id, position) in &layout.positions {
//!     println!("{id}: {position}");
//! }
//! ```

pub mod alignment;
pub mod config;
pub mod error;
pub mod features;
pub mod image_io;
pub mod layout;
pub mod math;
pub mod overlap;
pub mod pipeline;
pub mod tile;
pub mod transform;

#[cfg(feature = "bench")]
pub mod bench;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{
    FeatureConfig, MosaicConfig, OverlapConfig, PhaseCorrelationConfig, RelaxConfig,
    SolverStrategy, SubpixelMethod,
};
pub use error::{AlignmentError, ImageError, MosaicError};

// ============================================================================
// Tiles and geometry
// ============================================================================

pub use image_io::{
    crop, crop_masked, fill_missing, FileImageSource, FillPolicy, ImageSource, MemoryImageSource,
};
pub use math::{overlap_fraction, Rect};
pub use tile::{ImageCache, Tile, TileCatalog, TileId, TileRecord};
pub use transform::{StageTransform, TileTransform};

// ============================================================================
// Stages
// ============================================================================

pub use alignment::{
    align_edges, align_regions, normalized_cross_correlation, AlignedEdge, AlignmentResult,
    AlignmentStatus, PhaseCorrelator,
};
pub use features::{entropy_score, prune_edges, score_overlaps, RegionScore};
pub use layout::{
    highest_weight_first, normalize_to_origin, relax_layout, GreedyLayout, LayoutEdge,
    LayoutGraph, RelaxOutcome,
};
pub use overlap::{build_overlap_graph, OverlapEdge};
pub use pipeline::{solve_layout, translate_tiles, MosaicLayout, SolverReport};

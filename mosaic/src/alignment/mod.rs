//! Pairwise alignment of overlap regions.
//!
//! [`align_regions`] measures one pair. [`align_edges`] crops every edge's
//! padded regions and measures them through a [`TaskScheduler`], absorbing
//! per-pair faults into zero-weight results.
//!
//! Regions may carry NaN for pixels outside their tile. Phase correlation
//! runs on a filled copy and only proposes integer shifts; each proposal is
//! scored by normalized cross-correlation over the pixels both tiles really
//! have, and the winner is refined on that score surface.
//!
//! Degenerate input is classified before any correlation runs: a constant
//! region returns [`AlignmentStatus::Degenerate`], a range too small to
//! normalize returns [`AlignmentStatus::Underflow`]. Only a fault during
//! correlation itself is an error.

mod ncc;
mod phase_correlation;


use common::float_ext::FloatExt;
use common::parallel::TaskScheduler;
use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::PhaseCorrelationConfig;
use crate::error::AlignmentError;
use crate::image_io::{crop_masked, fill_missing, ImageSource};
use crate::overlap::OverlapEdge;
use crate::tile::{TileCatalog, TileId};

use ncc::ShiftScorer;

pub use ncc::normalized_cross_correlation;
pub use phase_correlation::{hann_window, tukey_window, Correlation, PhaseCorrelator};

/// How an [`AlignmentResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// A verified correlation peak produced the offset.
    Measured,
    /// No correlation peak survived verification; nominal offset kept.
    Unmatched,
    /// A region was constant; nominal offset kept.
    Degenerate,
    /// A region's value range was too small to normalize; nominal offset kept.
    Underflow,
    /// Correlation raised a numeric fault or the pixels could not be read;
    /// nominal offset kept.
    Failed,
}

/// Measured displacement of B relative to A and the confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// In the same frame as the edge's nominal offset.
    pub offset: DVec2,
    /// `>= 0`; zero means "no usable signal".
    pub weight: f64,
    pub status: AlignmentStatus,
}

impl AlignmentResult {
    /// Zero-weight result that keeps the nominal offset.
    pub fn fallback(nominal_offset: DVec2, status: AlignmentStatus) -> Self {
        Self {
            offset: nominal_offset,
            weight: 0.0,
            status,
        }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.weight > 0.0
    }
}

/// Alignment result of one overlap edge, with diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedEdge {
    pub a: TileId,
    pub b: TileId,
    pub nominal_offset: DVec2,
    pub result: AlignmentResult,
    /// Distance between measured and nominal offset, in volume units.
    pub deviation: f64,
}

/// Measures the shift between two equally sized regions.
///
/// `b`'s content is expected near `a`'s, displaced by `nominal_offset` in the
/// frame of the caller. The returned offset is `nominal_offset` plus the
/// measured shift, so perfectly placed regions report exactly the nominal
/// offset. NaN pixels are treated as unknown; the weight is the normalized
/// cross-correlation at the chosen shift, clamped to `>= 0`.
pub fn align_regions(
    a: &Buffer2<f32>,
    b: &Buffer2<f32>,
    nominal_offset: DVec2,
    config: &PhaseCorrelationConfig,
) -> Result<AlignmentResult, AlignmentError> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(AlignmentError::SizeMismatch {
            a_width: a.width(),
            a_height: a.height(),
            b_width: b.width(),
            b_height: b.height(),
        });
    }

    let (Some(range_a), Some(range_b)) = (value_range(a), value_range(b)) else {
        tracing::debug!("Degenerate region pair, keeping nominal offset");
        return Ok(AlignmentResult::fallback(
            nominal_offset,
            AlignmentStatus::Degenerate,
        ));
    };

    let (Some(norm_a), Some(norm_b)) = (normalize_unit(a, range_a)?, normalize_unit(b, range_b)?)
    else {
        tracing::debug!("Region range underflows, keeping nominal offset");
        return Ok(AlignmentResult::fallback(
            nominal_offset,
            AlignmentStatus::Underflow,
        ));
    };

    let mut filled_a = norm_a.clone();
    fill_missing(&mut filled_a, config.fill.reseeded(0));
    let mut filled_b = norm_b.clone();
    fill_missing(&mut filled_b, config.fill.reseeded(1));

    let correlator = PhaseCorrelator::new(a.width(), a.height(), *config);
    let candidates = correlator.candidate_shifts(&filled_a, &filled_b, config.candidate_peaks)?;

    let mut scorer = ShiftScorer::new(&norm_a, &norm_b, config.min_verified_overlap);
    let Some((start, start_score)) = scorer.best_of(&candidates) else {
        tracing::debug!(
            "None of {} correlation peaks verified, keeping nominal offset",
            candidates.len()
        );
        return Ok(AlignmentResult::fallback(
            nominal_offset,
            AlignmentStatus::Unmatched,
        ));
    };
    let (peak, score) = scorer.climb(start, start_score);
    let shift = scorer.refine(peak, score, config.subpixel);

    Ok(AlignmentResult {
        offset: nominal_offset + shift,
        weight: score.max(0.0),
        status: AlignmentStatus::Measured,
    })
}

/// `(min, max)` of the known pixels, or `None` if there are none or they are
/// constant.
fn value_range(image: &Buffer2<f32>) -> Option<(f32, f32)> {
    let (min, max) = image.min_max()?;
    (min < max).then_some((min, max))
}

/// Rescales to `[0, 1]`, keeping NaN.
///
/// `Ok(None)` when the range is subnormal; a non-finite range is a fault.
fn normalize_unit(
    image: &Buffer2<f32>,
    (min, max): (f32, f32),
) -> Result<Option<Buffer2<f32>>, AlignmentError> {
    let span = max - min;
    if !span.is_finite() {
        return Err(AlignmentError::NumericFault {
            what: "non-finite region range",
        });
    }
    if !span.is_usable() {
        return Ok(None);
    }

    let pixels = image.pixels().iter().map(|&v| (v - min) / span).collect();
    Ok(Some(Buffer2::new(image.width(), image.height(), pixels)))
}

/// Crops and aligns every edge, one scheduler task per edge.
///
/// Results are in edge order. Any per-edge failure (unreadable image,
/// numeric fault) becomes a zero-weight [`AlignmentStatus::Failed`] result
/// with a warning; the batch always completes. `image_scale` converts the
/// deviation diagnostic back to volume units.
pub fn align_edges(
    catalog: &TileCatalog,
    edges: &[OverlapEdge],
    source: &dyn ImageSource,
    config: &PhaseCorrelationConfig,
    image_scale: f64,
    scheduler: &impl TaskScheduler,
) -> Vec<AlignedEdge> {
    let aligned = scheduler.map(edges, |edge| {
        let result = match align_edge(catalog, edge, source, config) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("Alignment of tiles {} and {} failed: {err}", edge.a, edge.b);
                AlignmentResult::fallback(edge.nominal_offset, AlignmentStatus::Failed)
            }
        };

        let deviation = (result.offset - edge.nominal_offset).length() / image_scale;
        tracing::debug!(
            "Tiles {} -> {}: predicted {:?}, measured {:?}, deviation {:.2}, weight {:.3}",
            edge.a,
            edge.b,
            edge.nominal_offset,
            result.offset,
            deviation,
            result.weight
        );

        AlignedEdge {
            a: edge.a,
            b: edge.b,
            nominal_offset: edge.nominal_offset,
            result,
            deviation,
        }
    });

    let measured = aligned
        .iter()
        .filter(|e| e.result.status == AlignmentStatus::Measured)
        .count();
    tracing::info!("Aligned {measured} of {} overlaps", aligned.len());

    aligned
}

/// Crops both padded regions of `edge` and aligns them.
///
/// An edge whose overlap is constant on either tile is degenerate no matter
/// what the padding brings in. Random fill is reseeded per edge.
pub fn align_edge(
    catalog: &TileCatalog,
    edge: &OverlapEdge,
    source: &dyn ImageSource,
    config: &PhaseCorrelationConfig,
) -> Result<AlignmentResult, AlignmentError> {
    let image_a = catalog.image(edge.a, source)?;
    let image_b = catalog.image(edge.b, source)?;

    let overlap_a = crop_masked(&image_a, &edge.rect_a);
    let overlap_b = crop_masked(&image_b, &edge.rect_b);
    if value_range(&overlap_a).is_none() || value_range(&overlap_b).is_none() {
        tracing::debug!(
            "Overlap of tiles {} and {} is constant, keeping nominal offset",
            edge.a,
            edge.b
        );
        return Ok(AlignmentResult::fallback(
            edge.nominal_offset,
            AlignmentStatus::Degenerate,
        ));
    }

    let region_a = crop_masked(&image_a, &edge.padded_rect_a);
    let region_b = crop_masked(&image_b, &edge.padded_rect_b);

    let salt = ((edge.a.0 as u64) << 32) | edge.b.0 as u64;
    let config = PhaseCorrelationConfig {
        fill: config.fill.reseeded(salt),
        ..*config
    };
    align_regions(&region_a, &region_b, edge.nominal_offset, &config)
}

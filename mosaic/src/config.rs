//! Configuration types for the mosaic pipeline.
//!
//! All tuning parameters are consolidated here. Every struct deserializes with
//! defaults for missing fields, so a job file only lists what it overrides.

use serde::{Deserialize, Serialize};

use crate::error::MosaicError;
use crate::image_io::FillPolicy;

// =============================================================================
// Overlap graph
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// Pairs whose overlap (fraction of the smaller tile) is below this are dropped.
    pub min_overlap_fraction: f64,
    /// Crop regions are grown by this factor around their center to tolerate
    /// misplacement near the crop boundary.
    pub excess_scalar: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            min_overlap_fraction: 0.05,
            excess_scalar: 1.5,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> Result<(), MosaicError> {
        if !(0.0..=1.0).contains(&self.min_overlap_fraction) {
            return Err(MosaicError::InvalidConfig(format!(
                "min_overlap_fraction must be in [0, 1], got {}",
                self.min_overlap_fraction
            )));
        }
        if !self.excess_scalar.is_finite() || self.excess_scalar < 1.0 {
            return Err(MosaicError::InvalidConfig(format!(
                "excess_scalar must be >= 1, got {}",
                self.excess_scalar
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Feature scoring
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Run the scoring pre-pass and prune low-texture overlaps.
    pub enabled: bool,
    /// An edge is kept only if both sides score at least this (0..1).
    pub min_score: f64,
    /// Histogram bins for the entropy measure.
    pub bins: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 0.1,
            bins: 64,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), MosaicError> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(MosaicError::InvalidConfig(format!(
                "feature min_score must be in [0, 1], got {}",
                self.min_score
            )));
        }
        if self.bins < 2 {
            return Err(MosaicError::InvalidConfig(format!(
                "feature bins must be >= 2, got {}",
                self.bins
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Phase correlation
// =============================================================================

/// Sub-pixel interpolation of the correlation peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubpixelMethod {
    /// Integer peak only.
    None,
    /// Parabolic fit through the peak and its 4-neighbours.
    #[default]
    Parabolic,
    /// Parabolic fit on log values (Gaussian peak model).
    Gaussian,
    /// Weighted centroid of the 5x5 neighbourhood.
    Centroid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseCorrelationConfig {
    /// Taper each region's border before the FFT to suppress edge effects.
    pub use_windowing: bool,
    /// Fraction of each axis covered by the cosine taper (1.0 is a full Hann
    /// window). The middle stays flat so the window does not pull the peak
    /// toward zero shift.
    pub window_taper: f64,
    pub subpixel: SubpixelMethod,
    /// Correlation peaks tried as candidate shifts.
    pub candidate_peaks: usize,
    /// A candidate shift must overlap at least this fraction of the smaller
    /// region's in-bounds pixels to be verified.
    pub min_verified_overlap: f64,
    /// Fill for region pixels outside the tile image before the FFT.
    /// Verification only ever compares in-bounds pixels.
    pub fill: FillPolicy,
}

impl Default for PhaseCorrelationConfig {
    fn default() -> Self {
        Self {
            use_windowing: true,
            window_taper: 0.5,
            subpixel: SubpixelMethod::Parabolic,
            candidate_peaks: 5,
            min_verified_overlap: 0.2,
            fill: FillPolicy::Random { seed: 0 },
        }
    }
}

impl PhaseCorrelationConfig {
    pub fn validate(&self) -> Result<(), MosaicError> {
        if !(self.window_taper > 0.0 && self.window_taper <= 1.0) {
            return Err(MosaicError::InvalidConfig(format!(
                "window_taper must be in (0, 1], got {}",
                self.window_taper
            )));
        }
        if self.candidate_peaks == 0 {
            return Err(MosaicError::InvalidConfig(
                "candidate_peaks must be > 0".to_string(),
            ));
        }
        if !(self.min_verified_overlap > 0.0 && self.min_verified_overlap <= 1.0) {
            return Err(MosaicError::InvalidConfig(format!(
                "min_verified_overlap must be in (0, 1], got {}",
                self.min_verified_overlap
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Layout solving
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxConfig {
    /// Hard cap on relaxation passes.
    pub max_iterations: usize,
    /// Stop once the largest net force on any tile drops below this.
    pub max_tension_cutoff: f64,
    /// Rescaled weight of the lowest-ranked non-zero edge.
    pub min_allowed_weight: f64,
    /// Rescaled weight of the highest-ranked edge.
    pub max_allowed_weight: f64,
    /// Fraction of the weight-normalized force applied per pass (0..=1].
    pub step: f64,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            max_tension_cutoff: 1.0,
            min_allowed_weight: 0.25,
            max_allowed_weight: 1.0,
            step: 0.5,
        }
    }
}

impl RelaxConfig {
    pub fn validate(&self) -> Result<(), MosaicError> {
        if !(self.max_tension_cutoff >= 0.0) {
            return Err(MosaicError::InvalidConfig(format!(
                "max_tension_cutoff must be >= 0, got {}",
                self.max_tension_cutoff
            )));
        }
        if !(self.min_allowed_weight > 0.0 && self.min_allowed_weight <= self.max_allowed_weight)
        {
            return Err(MosaicError::InvalidConfig(format!(
                "allowed weight range must satisfy 0 < min <= max, got [{}, {}]",
                self.min_allowed_weight, self.max_allowed_weight
            )));
        }
        if !(self.step > 0.0 && self.step <= 1.0) {
            return Err(MosaicError::InvalidConfig(format!(
                "relaxation step must be in (0, 1], got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// How pairwise measurements are reconciled into tile positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStrategy {
    /// Spring relaxation from nominal positions.
    #[default]
    Relax,
    /// Greedy placement along the highest-weight edges.
    HighestWeightFirst,
    /// Greedy placement used as the starting point for relaxation.
    GreedyThenRelax,
}

// =============================================================================
// Whole run
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub overlap: OverlapConfig,
    /// Working resolution relative to the transforms' image space.
    /// `None` derives it from the image files.
    pub image_scale: Option<f64>,
    pub features: FeatureConfig,
    pub correlation: PhaseCorrelationConfig,
    pub relax: RelaxConfig,
    pub solver: SolverStrategy,
    /// Cap on alignment tasks in flight. `None` lets the scheduler decide.
    pub max_concurrent_alignments: Option<usize>,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapConfig::default(),
            image_scale: None,
            features: FeatureConfig::default(),
            correlation: PhaseCorrelationConfig::default(),
            relax: RelaxConfig::default(),
            solver: SolverStrategy::default(),
            max_concurrent_alignments: None,
        }
    }
}

impl MosaicConfig {
    pub fn validate(&self) -> Result<(), MosaicError> {
        self.overlap.validate()?;
        self.features.validate()?;
        self.correlation.validate()?;
        self.relax.validate()?;
        if let Some(scale) = self.image_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(MosaicError::InvalidConfig(format!(
                    "image_scale must be positive, got {scale}"
                )));
            }
        }
        if self.max_concurrent_alignments == Some(0) {
            return Err(MosaicError::InvalidConfig(
                "max_concurrent_alignments must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

//! Phase correlation for translation between two equally sized regions.
//!
//! 1. Zero-pad both regions into a square power-of-two grid, with their
//!    borders tapered.
//! 2. Take the 2D FFT of each and form the normalized cross-power spectrum.
//! 3. The inverse FFT is a correlation surface with a peak at the shift.
//! 4. Either refine the top peak to sub-pixel accuracy, or hand the strongest
//!    local maxima on as candidate shifts.

use std::sync::Arc;

use common::Buffer2;
use glam::{DVec2, IVec2};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::{PhaseCorrelationConfig, SubpixelMethod};
use crate::error::AlignmentError;

/// Cross-power terms below this magnitude carry no phase and are zeroed.
const MIN_CROSS_POWER: f32 = 1e-10;

/// Correlation peak of a region pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    /// Shift `d` such that `target(x) ≈ reference(x + d)`.
    pub shift: DVec2,
    /// Height of the correlation peak.
    pub peak_value: f64,
    /// Peak-to-sidelobe ratio, `(peak - mean) / std` over the surface, >= 0.
    pub weight: f64,
}

/// Phase correlator planned for one region size.
pub struct PhaseCorrelator {
    config: PhaseCorrelationConfig,
    width: usize,
    height: usize,
    fft_size: usize,
    forward_fft: Arc<dyn Fft<f32>>,
    inverse_fft: Arc<dyn Fft<f32>>,
    window_x: Vec<f32>,
    window_y: Vec<f32>,
}

impl PhaseCorrelator {
    pub fn new(width: usize, height: usize, config: PhaseCorrelationConfig) -> Self {
        let fft_size = width.max(height).max(1).next_power_of_two();

        let mut planner = FftPlanner::new();
        let forward_fft = planner.plan_fft_forward(fft_size);
        let inverse_fft = planner.plan_fft_inverse(fft_size);

        let (window_x, window_y) = if config.use_windowing {
            (
                tukey_window(width, config.window_taper),
                tukey_window(height, config.window_taper),
            )
        } else {
            (vec![1.0; width], vec![1.0; height])
        };

        Self {
            config,
            width,
            height,
            fft_size,
            forward_fft,
            inverse_fft,
            window_x,
            window_y,
        }
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Estimates the shift of `target` relative to `reference` from the
    /// highest correlation peak.
    ///
    /// Both buffers must match the size the correlator was planned for.
    /// A non-finite value anywhere in the computation is a
    /// [`AlignmentError::NumericFault`].
    pub fn correlate(
        &self,
        reference: &Buffer2<f32>,
        target: &Buffer2<f32>,
    ) -> Result<Correlation, AlignmentError> {
        let correlation = self.surface(reference, target)?;

        let (peak_x, peak_y, peak_value) = self.find_peak(&correlation);
        let coarse = DVec2::new(self.unwrap(peak_x), self.unwrap(peak_y));

        let shift = match self.config.subpixel {
            SubpixelMethod::None => coarse,
            SubpixelMethod::Parabolic => {
                coarse + self.subpixel_parabolic(&correlation, peak_x, peak_y, |v| v as f64)
            }
            SubpixelMethod::Gaussian => {
                coarse
                    + self.subpixel_parabolic(&correlation, peak_x, peak_y, |v| {
                        (v.max(1e-10) as f64).ln()
                    })
            }
            SubpixelMethod::Centroid => {
                coarse + self.subpixel_centroid(&correlation, peak_x, peak_y)
            }
        };

        let weight = peak_to_sidelobe(&correlation, peak_value);

        Ok(Correlation {
            shift,
            peak_value: peak_value as f64,
            weight,
        })
    }

    /// Integer shifts suggested by the `count` strongest local maxima of the
    /// correlation surface, strongest first.
    ///
    /// A peak index is ambiguous modulo the FFT size, so each one yields
    /// every signed reading that still leaves the regions overlapping.
    pub fn candidate_shifts(
        &self,
        reference: &Buffer2<f32>,
        target: &Buffer2<f32>,
        count: usize,
    ) -> Result<Vec<IVec2>, AlignmentError> {
        let correlation = self.surface(reference, target)?;

        let mut shifts = Vec::new();
        for (peak_x, peak_y) in self.local_maxima(&correlation, count) {
            for x in self.aliases(peak_x, self.width) {
                for y in self.aliases(peak_y, self.height) {
                    let shift = IVec2::new(x, y);
                    if !shifts.contains(&shift) {
                        shifts.push(shift);
                    }
                }
            }
        }
        Ok(shifts)
    }

    /// Real correlation surface of the two regions, `fft_size` squared.
    fn surface(
        &self,
        reference: &Buffer2<f32>,
        target: &Buffer2<f32>,
    ) -> Result<Vec<f32>, AlignmentError> {
        for image in [reference, target] {
            if image.width() != self.width || image.height() != self.height {
                return Err(AlignmentError::SizeMismatch {
                    a_width: self.width,
                    a_height: self.height,
                    b_width: image.width(),
                    b_height: image.height(),
                });
            }
            if image.pixels().iter().any(|v| !v.is_finite()) {
                return Err(AlignmentError::NumericFault {
                    what: "non-finite input pixel",
                });
            }
        }

        let ref_fft = self.fft_2d(self.prepare_image(reference));
        let tar_fft = self.fft_2d(self.prepare_image(target));
        let cross_power = cross_power_spectrum(&ref_fft, &tar_fft);
        let correlation = self.ifft_2d(cross_power);

        if correlation.iter().any(|v| !v.is_finite()) {
            return Err(AlignmentError::NumericFault {
                what: "non-finite correlation surface",
            });
        }
        Ok(correlation)
    }

    /// Copies `image` into the top-left of an FFT grid, zero-mean and windowed.
    fn prepare_image(&self, image: &Buffer2<f32>) -> Vec<Complex<f32>> {
        let n = self.fft_size;
        let mean = image.pixels().iter().sum::<f32>() / image.len().max(1) as f32;

        let mut padded = vec![Complex::new(0.0, 0.0); n * n];
        for y in 0..self.height {
            let wy = self.window_y[y];
            for (x, &value) in image.row(y).iter().enumerate() {
                padded[y * n + x] = Complex::new((value - mean) * self.window_x[x] * wy, 0.0);
            }
        }
        padded
    }

    /// 2D FFT by row-column decomposition.
    fn fft_2d(&self, mut data: Vec<Complex<f32>>) -> Vec<Complex<f32>> {
        self.process_2d(&mut data, self.forward_fft.as_ref());
        data
    }

    /// Inverse 2D FFT, normalized, real part only.
    fn ifft_2d(&self, mut data: Vec<Complex<f32>>) -> Vec<f32> {
        self.process_2d(&mut data, self.inverse_fft.as_ref());
        let norm = 1.0 / (self.fft_size * self.fft_size) as f32;
        data.iter().map(|c| c.re * norm).collect()
    }

    fn process_2d(&self, data: &mut [Complex<f32>], fft: &dyn Fft<f32>) {
        let n = self.fft_size;
        for row in data.chunks_exact_mut(n) {
            fft.process(row);
        }
        transpose_inplace(data, n);
        for row in data.chunks_exact_mut(n) {
            fft.process(row);
        }
        transpose_inplace(data, n);
    }

    fn find_peak(&self, correlation: &[f32]) -> (usize, usize, f32) {
        let n = self.fft_size;
        let mut max_val = f32::NEG_INFINITY;
        let mut max_idx = 0;
        for (idx, &val) in correlation.iter().enumerate() {
            if val > max_val {
                max_val = val;
                max_idx = idx;
            }
        }
        (max_idx % n, max_idx / n, max_val)
    }

    /// Indices of the `count` highest points that are not below any of their
    /// 8 wrapped neighbours.
    fn local_maxima(&self, correlation: &[f32], count: usize) -> Vec<(usize, usize)> {
        let n = self.fft_size as isize;
        let mut maxima: Vec<(f32, usize, usize)> = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let value = self.sample(correlation, x, y);
                let is_max = (-1..=1)
                    .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                    .filter(|&offset| offset != (0, 0))
                    .all(|(dx, dy)| self.sample(correlation, x + dx, y + dy) <= value);
                if is_max {
                    maxima.push((value, x as usize, y as usize));
                }
            }
        }
        maxima.sort_by(|a, b| b.0.total_cmp(&a.0));
        maxima
            .into_iter()
            .take(count)
            .map(|(_, x, y)| (x, y))
            .collect()
    }

    /// Signed shifts congruent to `peak` modulo the FFT size that keep some
    /// overlap along an axis of length `extent`.
    fn aliases(&self, peak: usize, extent: usize) -> impl Iterator<Item = i32> {
        let n = self.fft_size as i64;
        let peak = peak as i64;
        [peak, peak - n]
            .into_iter()
            .filter(move |shift| shift.abs() < extent as i64)
            .map(|shift| shift as i32)
    }

    /// Peak index to signed shift; indices past the middle wrap to negative.
    #[inline]
    fn unwrap(&self, peak: usize) -> f64 {
        if peak > self.fft_size / 2 {
            peak as f64 - self.fft_size as f64
        } else {
            peak as f64
        }
    }

    #[inline]
    fn sample(&self, correlation: &[f32], x: isize, y: isize) -> f32 {
        let n = self.fft_size as isize;
        let xx = x.rem_euclid(n) as usize;
        let yy = y.rem_euclid(n) as usize;
        correlation[yy * self.fft_size + xx]
    }

    /// Three-point fit along each axis. `map` selects parabolic (identity)
    /// or Gaussian (log) peak model.
    fn subpixel_parabolic(
        &self,
        correlation: &[f32],
        peak_x: usize,
        peak_y: usize,
        map: impl Fn(f32) -> f64,
    ) -> DVec2 {
        let px = peak_x as isize;
        let py = peak_y as isize;

        let c = map(self.sample(correlation, px, py));
        let l = map(self.sample(correlation, px - 1, py));
        let r = map(self.sample(correlation, px + 1, py));
        let t = map(self.sample(correlation, px, py - 1));
        let b = map(self.sample(correlation, px, py + 1));

        DVec2::new(vertex_offset(l, c, r), vertex_offset(t, c, b))
    }

    /// Weighted centroid of the positive values in the 5x5 neighbourhood.
    fn subpixel_centroid(&self, correlation: &[f32], peak_x: usize, peak_y: usize) -> DVec2 {
        const RADIUS: isize = 2;
        let px = peak_x as isize;
        let py = peak_y as isize;

        let mut sum = DVec2::ZERO;
        let mut sum_w = 0.0f64;
        for dy in -RADIUS..=RADIUS {
            for dx in -RADIUS..=RADIUS {
                let w = self.sample(correlation, px + dx, py + dy).max(0.0) as f64;
                sum += DVec2::new(dx as f64, dy as f64) * w;
                sum_w += w;
            }
        }

        if sum_w > 1e-10 {
            sum / sum_w
        } else {
            DVec2::ZERO
        }
    }
}

/// Vertex of the parabola through `(-1, before)`, `(0, center)`, `(1, after)`,
/// limited to half a pixel.
pub(super) fn vertex_offset(before: f64, center: f64, after: f64) -> f64 {
    let denom = 2.0 * (before + after - 2.0 * center);
    if denom.abs() > 1e-10 {
        ((before - after) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// `F1 * conj(F2) / |F1 * conj(F2)|`.
fn cross_power_spectrum(fft1: &[Complex<f32>], fft2: &[Complex<f32>]) -> Vec<Complex<f32>> {
    fft1.iter()
        .zip(fft2)
        .map(|(&a, &b)| {
            let product = a * b.conj();
            let magnitude = product.norm();
            if magnitude > MIN_CROSS_POWER {
                product / magnitude
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect()
}

fn peak_to_sidelobe(correlation: &[f32], peak_value: f32) -> f64 {
    let count = correlation.len() as f64;
    let mean = correlation.iter().map(|&v| v as f64).sum::<f64>() / count;
    let variance = correlation
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count;
    let std = variance.sqrt();

    if std > 0.0 {
        ((peak_value as f64 - mean) / std).max(0.0)
    } else {
        0.0
    }
}

/// 1D Hann window, zero at the first sample.
pub fn hann_window(size: usize) -> Vec<f32> {
    tukey_window(size, 1.0)
}

/// 1D Tukey window: cosine ramps over `taper / 2` of the length at each end,
/// flat in between. `taper == 1` is the Hann window.
pub fn tukey_window(size: usize, taper: f64) -> Vec<f32> {
    use std::f64::consts::PI;
    let ramp = taper / 2.0;
    (0..size)
        .map(|i| {
            let x = i as f64 / size as f64;
            let edge = x.min(1.0 - x);
            if edge < ramp {
                (0.5 * (1.0 - (PI * edge / ramp).cos())) as f32
            } else {
                1.0
            }
        })
        .collect()
}

/// In-place square matrix transpose.
pub fn transpose_inplace(data: &mut [Complex<f32>], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

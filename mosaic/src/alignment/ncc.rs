//! Normalized cross-correlation of NaN-masked regions at integer shifts.
//!
//! Phase correlation proposes shifts; the score here decides between them
//! using only pixels that exist in both tiles, so crop padding never votes.

use std::collections::HashMap;

use common::Buffer2;
use glam::{DVec2, IVec2};

use super::phase_correlation::vertex_offset;
use crate::config::SubpixelMethod;

const MAX_CLIMB_STEPS: usize = 64;

/// Pearson correlation of `target(x, y)` against `reference(x + dx, y + dy)`
/// over the pixel pairs where neither side is NaN.
///
/// `None` when fewer than `min_pixels` pairs overlap or either side has no
/// variance over them. Both regions must be the same size.
pub fn normalized_cross_correlation(
    reference: &Buffer2<f32>,
    target: &Buffer2<f32>,
    shift: IVec2,
    min_pixels: usize,
) -> Option<f64> {
    let width = target.width() as i64;
    let height = target.height() as i64;
    let (dx, dy) = (shift.x as i64, shift.y as i64);

    let mut count = 0usize;
    let (mut sum_r, mut sum_t) = (0.0f64, 0.0f64);
    let (mut sum_rr, mut sum_tt, mut sum_rt) = (0.0f64, 0.0f64, 0.0f64);

    for y in 0.max(-dy)..height.min(height - dy) {
        let ref_row = reference.row((y + dy) as usize);
        let tar_row = target.row(y as usize);
        for x in 0.max(-dx)..width.min(width - dx) {
            let r = ref_row[(x + dx) as usize];
            let t = tar_row[x as usize];
            if r.is_nan() || t.is_nan() {
                continue;
            }
            let (r, t) = (r as f64, t as f64);
            count += 1;
            sum_r += r;
            sum_t += t;
            sum_rr += r * r;
            sum_tt += t * t;
            sum_rt += r * t;
        }
    }

    if count < min_pixels.max(2) {
        return None;
    }

    let n = count as f64;
    let covariance = sum_rt - sum_r * sum_t / n;
    let var_r = sum_rr - sum_r * sum_r / n;
    let var_t = sum_tt - sum_t * sum_t / n;
    if var_r <= 1e-12 || var_t <= 1e-12 {
        return None;
    }
    Some(covariance / (var_r * var_t).sqrt())
}

/// Memoized correlation scores over integer shifts of one region pair.
pub(crate) struct ShiftScorer<'a> {
    reference: &'a Buffer2<f32>,
    target: &'a Buffer2<f32>,
    min_pixels: usize,
    scores: HashMap<IVec2, Option<f64>>,
}

impl<'a> ShiftScorer<'a> {
    /// A shift counts only if it overlaps at least `min_overlap` of the
    /// smaller region's known pixels.
    pub fn new(reference: &'a Buffer2<f32>, target: &'a Buffer2<f32>, min_overlap: f64) -> Self {
        let known = |image: &Buffer2<f32>| image.pixels().iter().filter(|v| !v.is_nan()).count();
        let smaller = known(reference).min(known(target));
        let min_pixels = ((min_overlap * smaller as f64).ceil() as usize).max(2);

        Self {
            reference,
            target,
            min_pixels,
            scores: HashMap::new(),
        }
    }

    pub fn score(&mut self, shift: IVec2) -> Option<f64> {
        let (reference, target, min_pixels) = (self.reference, self.target, self.min_pixels);
        *self.scores.entry(shift).or_insert_with(|| {
            normalized_cross_correlation(reference, target, shift, min_pixels)
        })
    }

    /// Highest-scoring candidate; the earliest wins a tie.
    pub fn best_of(&mut self, candidates: &[IVec2]) -> Option<(IVec2, f64)> {
        let mut best: Option<(IVec2, f64)> = None;
        for &shift in candidates {
            let Some(score) = self.score(shift) else {
                continue;
            };
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((shift, score)),
            }
        }
        best
    }

    /// Moves to the best of the 8 neighbours until none improves.
    pub fn climb(&mut self, mut shift: IVec2, mut score: f64) -> (IVec2, f64) {
        for _ in 0..MAX_CLIMB_STEPS {
            let mut next = None;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let neighbour = shift + IVec2::new(dx, dy);
                    if let Some(s) = self.score(neighbour) {
                        if s > score {
                            score = s;
                            next = Some(neighbour);
                        }
                    }
                }
            }
            match next {
                Some(neighbour) => shift = neighbour,
                None => break,
            }
        }
        (shift, score)
    }

    /// Sub-pixel position of the score peak at `shift`.
    ///
    /// An axis whose neighbours cannot be scored stays on the integer.
    pub fn refine(&mut self, shift: IVec2, score: f64, method: SubpixelMethod) -> DVec2 {
        let coarse = shift.as_dvec2();
        match method {
            SubpixelMethod::None => coarse,
            SubpixelMethod::Parabolic => coarse + self.three_point(shift, score, |v| v),
            SubpixelMethod::Gaussian => {
                coarse + self.three_point(shift, score, |v| v.max(1e-10).ln())
            }
            SubpixelMethod::Centroid => coarse + self.centroid(shift),
        }
    }

    fn three_point(&mut self, shift: IVec2, score: f64, map: impl Fn(f64) -> f64) -> DVec2 {
        let mut axis = |step: IVec2| {
            match (self.score(shift - step), self.score(shift + step)) {
                (Some(before), Some(after)) => vertex_offset(map(before), map(score), map(after)),
                _ => 0.0,
            }
        };
        let x = axis(IVec2::X);
        let y = axis(IVec2::Y);
        DVec2::new(x, y)
    }

    /// Centroid of the 3x3 neighbourhood, weighted by score above its minimum.
    fn centroid(&mut self, shift: IVec2) -> DVec2 {
        let mut samples = Vec::with_capacity(9);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let offset = IVec2::new(dx, dy);
                if let Some(s) = self.score(shift + offset) {
                    samples.push((offset.as_dvec2(), s));
                }
            }
        }

        let floor = samples.iter().map(|&(_, s)| s).fold(f64::INFINITY, f64::min);
        let mut sum = DVec2::ZERO;
        let mut sum_w = 0.0;
        for (offset, s) in samples {
            let w = s - floor;
            sum += offset * w;
            sum_w += w;
        }

        if sum_w > 1e-10 {
            sum / sum_w
        } else {
            DVec2::ZERO
        }
    }
}

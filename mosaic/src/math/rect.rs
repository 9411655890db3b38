//! Axis-aligned rectangle in continuous coordinates.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle with `f64` bounds.
///
/// `min` is inclusive, `max` is exclusive for pixel purposes: a rectangle
/// from (0, 0) to (10, 4) covers 10 columns and 4 rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    #[inline]
    pub const fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: DVec2::new(min_x, min_y),
            max: DVec2::new(max_x, max_y),
        }
    }

    #[inline]
    pub fn from_point_and_size(origin: DVec2, size: DVec2) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    /// Rectangle of `size` centered on `center`.
    #[inline]
    pub fn from_center_and_size(center: DVec2, size: DVec2) -> Self {
        Self::from_point_and_size(center - size * 0.5, size)
    }

    /// Bounding box of a point set. `None` for an empty slice.
    pub fn from_points(points: &[DVec2]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Positive, finite width and height.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0 && self.min.is_finite() && self.max.is_finite()
    }

    /// Corners in the order min, (max.x, min.y), max, (min.x, max.y).
    pub fn corners(&self) -> [DVec2; 4] {
        [
            self.min,
            DVec2::new(self.max.x, self.min.y),
            self.max,
            DVec2::new(self.min.x, self.max.y),
        ]
    }

    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Strict overlap on both axes. Touching edges do not count.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Shared region, or `None` when the rectangles only touch or are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let rect = Rect {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        };
        rect.is_valid().then_some(rect)
    }

    /// Multiplies every coordinate by `factor` (change of resolution).
    #[inline]
    pub fn scale(&self, factor: f64) -> Rect {
        Rect {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    /// Grows or shrinks the rectangle by `factor` around its center.
    #[inline]
    pub fn scale_about_center(&self, factor: f64) -> Rect {
        Rect::from_center_and_size(self.center(), self.size() * factor)
    }

    #[inline]
    pub fn translate(&self, delta: DVec2) -> Rect {
        Rect {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Snaps both corners to the nearest integer.
    ///
    /// A dimension that would collapse to zero keeps one pixel, so a valid
    /// rectangle always rounds to a valid rectangle.
    pub fn round(&self) -> Rect {
        let min = self.min.round();
        let mut max = self.max.round();
        if max.x <= min.x {
            max.x = min.x + 1.0;
        }
        if max.y <= min.y {
            max.y = min.y + 1.0;
        }
        Rect { min, max }
    }
}

/// Overlap of two rectangles as a fraction of the smaller one's area.
///
/// Scale invariant: 0 for disjoint rectangles, 1 when one contains the other.
pub fn overlap_fraction(a: &Rect, b: &Rect) -> f64 {
    let Some(shared) = a.intersection(b) else {
        return 0.0;
    };
    let smaller = a.area().min(b.area());
    if smaller <= 0.0 {
        return 0.0;
    }
    shared.area() / smaller
}

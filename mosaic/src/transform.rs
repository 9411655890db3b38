//! Mapping between a tile's image space and the shared volume space.
//!
//! Full transform models (affine, mesh, RBF) live outside this crate and plug
//! in through [`TileTransform`]. [`StageTransform`] covers the common case of
//! tiles placed by stage coordinates.

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::math::Rect;

/// Maps points between a tile's image ("mapped") space and volume ("control") space.
pub trait TileTransform: Send + Sync + fmt::Debug {
    fn to_image_space(&self, point: DVec2) -> DVec2;

    fn to_volume_space(&self, point: DVec2) -> DVec2;

    /// Extent of the tile's image in image space.
    fn mapped_bbox(&self) -> Rect;

    /// Extent of the tile in volume space.
    fn control_bbox(&self) -> Rect {
        let corners = self
            .mapped_bbox()
            .corners()
            .map(|corner| self.to_volume_space(corner));
        bounding_rect(&corners)
    }

    /// Bounding box in image space of a region given in volume space.
    fn volume_rect_to_image_space(&self, rect: &Rect) -> Rect {
        let corners = rect.corners().map(|corner| self.to_image_space(corner));
        bounding_rect(&corners)
    }
}

fn bounding_rect(corners: &[DVec2; 4]) -> Rect {
    let (min, max) = corners[1..]
        .iter()
        .fold((corners[0], corners[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    Rect::new(min, max)
}

/// Pure translation: `volume = origin + image`.
///
/// Image pixels and volume units share one scale, which is the convention the
/// layout solver's offsets assume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTransform {
    /// Volume-space position of the image's (0, 0) pixel corner.
    pub origin: DVec2,
    /// Image size in pixels at full resolution.
    pub image_size: DVec2,
}

impl StageTransform {
    pub fn new(origin: DVec2, image_size: DVec2) -> Self {
        Self { origin, image_size }
    }
}

impl TileTransform for StageTransform {
    #[inline]
    fn to_image_space(&self, point: DVec2) -> DVec2 {
        point - self.origin
    }

    #[inline]
    fn to_volume_space(&self, point: DVec2) -> DVec2 {
        self.origin + point
    }

    fn mapped_bbox(&self) -> Rect {
        Rect::from_point_and_size(DVec2::ZERO, self.image_size)
    }
}

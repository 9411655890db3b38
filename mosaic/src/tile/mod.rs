//! Tiles and the catalog that owns them.
//!
//! A tile is an image path plus the transform that places it in volume space.
//! Pixels are never stored on the tile itself: the catalog's [`ImageCache`]
//! memoizes them by tile id, so a tile rebuilt from a [`TileRecord`] always
//! starts with a cold cache.

mod catalog;


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::math::Rect;
use crate::transform::TileTransform;

pub use catalog::{ImageCache, TileCatalog};

/// Stable tile identifier, unique within one catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TileId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// One captured image and its nominal placement.
#[derive(Debug, Clone)]
pub struct Tile {
    id: TileId,
    transform: Arc<dyn TileTransform>,
    image_path: PathBuf,
    control_bbox: Rect,
    mapped_bbox: Rect,
}

impl Tile {
    /// Returns `None` if either bounding box is empty or non-finite.
    pub fn new(
        id: TileId,
        transform: Arc<dyn TileTransform>,
        image_path: impl Into<PathBuf>,
    ) -> Option<Self> {
        let control_bbox = transform.control_bbox();
        let mapped_bbox = transform.mapped_bbox();
        if !control_bbox.is_valid() || !mapped_bbox.is_valid() {
            return None;
        }
        Some(Self {
            id,
            transform,
            image_path: image_path.into(),
            control_bbox,
            mapped_bbox,
        })
    }

    #[inline]
    pub fn id(&self) -> TileId {
        self.id
    }

    #[inline]
    pub fn transform(&self) -> &dyn TileTransform {
        self.transform.as_ref()
    }

    #[inline]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Nominal extent in volume space.
    #[inline]
    pub fn control_bbox(&self) -> Rect {
        self.control_bbox
    }

    /// Extent in the tile's own image space.
    #[inline]
    pub fn mapped_bbox(&self) -> Rect {
        self.mapped_bbox
    }

    /// Region of this tile's image covered by `volume_rect`.
    pub fn image_space_rect(&self, volume_rect: &Rect) -> Rect {
        self.transform.volume_rect_to_image_space(volume_rect)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.image_path.display())
    }
}

/// Persisted identity of a tile. Derived pixel data is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord<T> {
    pub id: TileId,
    pub image_path: PathBuf,
    pub transform: T,
}

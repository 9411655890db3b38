use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use common::parallel::TaskScheduler;
use common::Buffer2;
use parking_lot::RwLock;

use super::{Tile, TileId, TileRecord};
use crate::error::{ImageError, MosaicError};
use crate::image_io::ImageSource;
use crate::transform::TileTransform;

/// Memoized tile pixels keyed by tile id, populated on first access.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: RwLock<HashMap<TileId, Arc<Buffer2<f32>>>>,
}

impl ImageCache {
    pub fn get(&self, id: TileId) -> Option<Arc<Buffer2<f32>>> {
        self.images.read().get(&id).cloned()
    }

    pub fn get_or_load(
        &self,
        tile: &Tile,
        source: &dyn ImageSource,
    ) -> Result<Arc<Buffer2<f32>>, ImageError> {
        if let Some(image) = self.get(tile.id()) {
            return Ok(image);
        }

        // Load outside the lock; a racing loader for the same tile just loses.
        let image = Arc::new(source.load(tile.image_path())?);
        let mut images = self.images.write();
        Ok(images.entry(tile.id()).or_insert(image).clone())
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }

    pub fn clear(&self) {
        self.images.write().clear();
    }
}

/// Tiles of one run, iterated in ascending id order.
#[derive(Debug, Default)]
pub struct TileCatalog {
    tiles: BTreeMap<TileId, Tile>,
    cache: ImageCache,
}

impl TileCatalog {
    /// Builds a catalog from parallel lists of transforms and image paths.
    ///
    /// Tile ids are the input positions. A path that does not exist drops that
    /// tile with an error log; mismatched list lengths or an empty bounding box
    /// reject the whole call.
    pub fn build(
        transforms: Vec<Arc<dyn TileTransform>>,
        image_paths: Vec<PathBuf>,
        source: &dyn ImageSource,
    ) -> Result<Self, MosaicError> {
        if transforms.len() != image_paths.len() {
            return Err(MosaicError::LengthMismatch {
                transforms: transforms.len(),
                paths: image_paths.len(),
            });
        }

        let mut tiles = BTreeMap::new();
        for (index, (transform, path)) in transforms.into_iter().zip(image_paths).enumerate() {
            let id = TileId(index as u32);
            let tile = Tile::new(id, transform, path)
                .ok_or(MosaicError::InvalidTransform { index })?;

            if !source.exists(tile.image_path()) {
                tracing::error!("Missing tile: {}", tile.image_path().display());
                continue;
            }
            tiles.insert(id, tile);
        }

        tracing::debug!("Catalog built with {} tiles", tiles.len());

        Ok(Self {
            tiles,
            cache: ImageCache::default(),
        })
    }

    /// Rebuilds a catalog from persisted records. The image cache starts empty.
    pub fn from_records<T>(records: Vec<TileRecord<T>>) -> Result<Self, MosaicError>
    where
        T: TileTransform + 'static,
    {
        let mut tiles = BTreeMap::new();
        for (index, record) in records.into_iter().enumerate() {
            let transform: Arc<dyn TileTransform> = Arc::new(record.transform);
            let tile = Tile::new(record.id, transform, record.image_path)
                .ok_or(MosaicError::InvalidTransform { index })?;
            match tiles.entry(tile.id()) {
                Entry::Occupied(_) => return Err(MosaicError::DuplicateTileId(tile.id().0)),
                Entry::Vacant(slot) => {
                    slot.insert(tile);
                }
            }
        }
        Ok(Self {
            tiles,
            cache: ImageCache::default(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.contains_key(&id)
    }

    /// Tiles in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles.keys().copied()
    }

    /// Positional view for algorithms that index tiles by position.
    pub fn to_vec(&self) -> Vec<&Tile> {
        self.tiles.values().collect()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Pixels of tile `id`, loaded on first access and cached afterwards.
    pub fn image(
        &self,
        id: TileId,
        source: &dyn ImageSource,
    ) -> Result<Arc<Buffer2<f32>>, ImageError> {
        let tile = self.tiles.get(&id).ok_or_else(|| ImageError::NotFound {
            path: PathBuf::from(format!("<tile {id}>")),
        })?;
        self.cache.get_or_load(tile, source)
    }

    /// Loads every listed tile in parallel. Returns the tiles that failed.
    pub fn warm(
        &self,
        ids: &[TileId],
        source: &dyn ImageSource,
        scheduler: &impl TaskScheduler,
    ) -> Vec<(TileId, ImageError)> {
        scheduler
            .map(ids, |&id| self.image(id, source).err().map(|e| (id, e)))
            .into_iter()
            .flatten()
            .collect()
    }

    /// Ratio of on-disk image width to mapped width shared by most tiles.
    ///
    /// Ratios are compared at three decimals; ties go to the smaller ratio.
    /// Falls back to 1.0 when no tile's dimensions can be read.
    pub fn most_common_scale(&self, source: &dyn ImageSource) -> f64 {
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for tile in self.iter() {
            match source.dimensions(tile.image_path()) {
                Ok((width, _)) => {
                    let ratio = width as f64 / tile.mapped_bbox().width();
                    *counts.entry((ratio * 1000.0).round() as i64).or_default() += 1;
                }
                Err(err) => tracing::warn!("Cannot read size of tile {}: {err}", tile.id()),
            }
        }

        // max_by_key keeps the last maximum, so iterate largest key first.
        counts
            .iter()
            .rev()
            .max_by_key(|&(_, count)| *count)
            .map(|(&key, _)| key as f64 / 1000.0)
            .unwrap_or(1.0)
    }
}

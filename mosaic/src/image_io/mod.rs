//! Pixel access for tiles: loading and cropping.
//!
//! Tile images are read as single-channel `f32` buffers. [`ImageSource`] keeps
//! the loader swappable so alignment can run against in-memory images.


use std::collections::HashMap;
use std::path::{Path, PathBuf};

use common::Buffer2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;
use crate::math::Rect;

/// Source of tile pixels.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Buffer2<f32>, ImageError>;

    /// Width and height in pixels, without decoding the full image if possible.
    fn dimensions(&self, path: &Path) -> Result<(usize, usize), ImageError>;

    fn exists(&self, path: &Path) -> bool;
}

/// Reads images from disk with the `image` crate, converted to luma `f32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn load(&self, path: &Path) -> Result<Buffer2<f32>, ImageError> {
        let img = image::open(path)
            .map_err(|source| ImageError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma32f();
        let width = img.width() as usize;
        let height = img.height() as usize;
        Ok(Buffer2::new(width, height, img.into_raw()))
    }

    fn dimensions(&self, path: &Path) -> Result<(usize, usize), ImageError> {
        let (width, height) =
            image::image_dimensions(path).map_err(|source| ImageError::Dimensions {
                path: path.to_path_buf(),
                source,
            })?;
        Ok((width as usize, height as usize))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Images held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<PathBuf, Buffer2<f32>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, image: Buffer2<f32>) {
        self.images.insert(path.into(), image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageSource for MemoryImageSource {
    fn load(&self, path: &Path) -> Result<Buffer2<f32>, ImageError> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| ImageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn dimensions(&self, path: &Path) -> Result<(usize, usize), ImageError> {
        self.images
            .get(path)
            .map(|img| (img.width(), img.height()))
            .ok_or_else(|| ImageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.images.contains_key(path)
    }
}

/// Value used for crop pixels that fall outside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    #[default]
    Zero,
    Constant(f32),
    /// Each missing pixel copies a randomly chosen in-bounds pixel of the same
    /// crop, so the fill has the region's own value distribution but no
    /// spatial structure.
    Random { seed: u64 },
}

impl FillPolicy {
    /// Same policy with the random seed mixed with `salt`.
    ///
    /// Two crops filled with one seed share a noise sequence, which
    /// correlates. Callers derive one salt per crop.
    pub fn reseeded(self, salt: u64) -> Self {
        match self {
            FillPolicy::Random { seed } => FillPolicy::Random {
                seed: splitmix64(seed ^ splitmix64(salt)),
            },
            other => other,
        }
    }
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Copies the pixels under `rect` (rounded to whole pixels) into a new buffer.
///
/// The rectangle may extend past the image; those pixels follow `fill`.
pub fn crop(image: &Buffer2<f32>, rect: &Rect, fill: FillPolicy) -> Buffer2<f32> {
    let mut out = crop_masked(image, rect);
    fill_missing(&mut out, fill);
    out
}

/// Like [`crop`], but pixels outside the image are left as NaN.
pub fn crop_masked(image: &Buffer2<f32>, rect: &Rect) -> Buffer2<f32> {
    let rect = rect.round();
    let x0 = rect.min.x as i64;
    let y0 = rect.min.y as i64;
    let width = rect.width() as usize;
    let height = rect.height() as usize;

    let inside = |x: i64, y: i64| {
        x >= 0 && y >= 0 && (x as usize) < image.width() && (y as usize) < image.height()
    };

    Buffer2::from_fn(width, height, |x, y| {
        let sx = x0 + x as i64;
        let sy = y0 + y as i64;
        if inside(sx, sy) {
            *image.get(sx as usize, sy as usize)
        } else {
            f32::NAN
        }
    })
}

/// Replaces every NaN pixel of `region` according to `fill`.
pub fn fill_missing(region: &mut Buffer2<f32>, fill: FillPolicy) {
    match fill {
        FillPolicy::Zero => replace_nan(region, || 0.0),
        FillPolicy::Constant(value) => replace_nan(region, || value),
        FillPolicy::Random { seed } => {
            let known: Vec<f32> = region
                .pixels()
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            if known.is_empty() {
                replace_nan(region, || 0.0);
                return;
            }
            let mut rng = StdRng::seed_from_u64(seed);
            replace_nan(region, || known[rng.random_range(0..known.len())]);
        }
    }
}

fn replace_nan(region: &mut Buffer2<f32>, mut value: impl FnMut() -> f32) {
    for px in region.pixels_mut() {
        if px.is_nan() {
            *px = value();
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading tile images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to load image '{path}': {source}")]
    Open {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to read dimensions of '{path}': {source}")]
    Dimensions {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("No image registered for '{path}'")]
    NotFound { path: PathBuf },
}

/// Faults raised while correlating a non-degenerate pair of regions.
///
/// Degenerate regions are not errors; they produce a zero-weight
/// [`AlignmentResult`](crate::alignment::AlignmentResult).
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Region sizes differ: {a_width}x{a_height} vs {b_width}x{b_height}")]
    SizeMismatch {
        a_width: usize,
        a_height: usize,
        b_width: usize,
        b_height: usize,
    },

    #[error("Non-finite value in {what}")]
    NumericFault { what: &'static str },

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Top-level failures that reject a run before any work starts.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("{transforms} transforms but {paths} image paths")]
    LengthMismatch { transforms: usize, paths: usize },

    #[error("Tile {index} has an empty or non-finite bounding box")]
    InvalidTransform { index: usize },

    #[error("Duplicate tile id {0}")]
    DuplicateTileId(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tiles with readable images")]
    NoTiles,

    #[error(transparent)]
    Image(#[from] ImageError),
}

//! Geometry primitives shared by the overlap builder and the solvers.

mod rect;

pub use rect::{overlap_fraction, Rect};

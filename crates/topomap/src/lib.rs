//! Umbrella crate for the `topomap` workspace.
//!
//! Re-exports the planar map core, its foundational primitives and the
//! checkpointing pyramid.

pub use tm_core::{BoundingBox, Image, LabelLut, Point2d, PointIndex, Polygon, Vec2d};
pub use tm_map::*;
pub use tm_pyr::*;

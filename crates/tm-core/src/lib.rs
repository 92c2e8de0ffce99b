//! Foundational primitives for the topomap segmentation engine.
//!
//! ## Coordinates
//! All geometry is in f64 pixel-center coordinates: integer coordinates
//! refer to pixel centers, so pixel `(x, y)` covers the half-open square
//! `[x − 0.5, x + 0.5) × [y − 0.5, y + 0.5)`.
//!
//! ## Caching
//! `Polygon` caches its bounding box and signed partial area; caches are
//! invalidated on any mutation and recomputed on demand.

mod bbox;
mod error;
mod geom;
mod image;
mod labellut;
mod point_index;
mod polygon;

pub use bbox::BoundingBox;
pub use error::Error;
pub use geom::{Point2d, Vec2d};
pub use image::Image;
pub use labellut::{LabelLut, MergedIter};
pub use point_index::PointIndex;
pub use polygon::Polygon;

//! Planar map for topological image segmentation.
//!
//! A [`PlanarMap`] is a combinatorial map of nodes, edges and faces over a
//! pixel grid, built from polyline edge geometry. Darts (signed edge
//! labels) navigate it through the alpha/sigma/phi operators, and the
//! Euler operators (`remove_isolated_node`, `merge_edges`,
//! `remove_bridge`, `merge_faces` plus the composed `remove_edge` and
//! `remove_edge_with_ends`) edit it while keeping all incidences, caches
//! and the optional label image consistent.
//!
//! Construction runs in stages: populate cells (`add_node`/`add_edge` or
//! [`PlanarMap::from_parts`]), order the dart rings
//! (`sort_edges_directly` or `sort_edges_eventually`), find the face
//! contours (`init_contours`) and embed them (`embed_faces`).

mod build;
mod cell;
mod dart;
mod error;
mod euler;
mod hooks;
mod map;
mod raster;
mod simplify;

pub use cell::{
    ALL_PROTECTION, BORDER_PROTECTION, CONTOUR_PROTECTION, CUSTOM_PROTECTION, CellLabel,
    DartLabel, Edge, Face, Node, SCISSOR_PROTECTION, UNINITIALIZED_LABEL,
};
pub use dart::{ContourPoints, Dart, DartPoints};
pub use error::{CellKind, Error, Result};
pub use hooks::MapHook;
pub use map::PlanarMap;
pub use simplify::{
    CRUFT_MERGE_EDGES, CRUFT_MERGE_FACES, CRUFT_REMOVE_BRIDGES, CRUFT_REMOVE_ISOLATED,
};

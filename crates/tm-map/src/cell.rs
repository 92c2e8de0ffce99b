use std::cell::Cell;

use tm_core::{BoundingBox, Point2d, Polygon};

/// Non-negative cell label; stable for the lifetime of the map.
pub type CellLabel = u32;

/// Signed dart label: `|label|` is the edge label, the sign selects the
/// orientation (positive = from the edge's start node).
pub type DartLabel = i32;

/// Sentinel for face labels that have not been assigned yet during
/// construction.
pub const UNINITIALIZED_LABEL: CellLabel = CellLabel::MAX;

// edge protection flags
pub const BORDER_PROTECTION: u32 = 1;
pub const SCISSOR_PROTECTION: u32 = 2;
pub const CONTOUR_PROTECTION: u32 = 4;
pub const CUSTOM_PROTECTION: u32 = 8;
pub const ALL_PROTECTION: u32 =
    BORDER_PROTECTION | SCISSOR_PROTECTION | CONTOUR_PROTECTION | CUSTOM_PROTECTION;

/// A 0-cell: position plus the sigma-orbit of incident darts in
/// counter-clockwise order.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) label: CellLabel,
    pub(crate) position: Point2d,
    pub(crate) darts: Vec<DartLabel>,
}

impl Node {
    pub(crate) fn new(label: CellLabel, position: Point2d) -> Self {
        Self {
            label,
            position,
            darts: Vec::new(),
        }
    }

    pub fn label(&self) -> CellLabel {
        self.label
    }

    pub fn position(&self) -> Point2d {
        self.position
    }

    /// Number of incident darts; a self-loop contributes two.
    pub fn degree(&self) -> usize {
        self.darts.len()
    }

    pub fn darts(&self) -> &[DartLabel] {
        &self.darts
    }

    /// First dart of the sigma-orbit; `None` for isolated nodes.
    pub fn anchor_label(&self) -> Option<DartLabel> {
        self.darts.first().copied()
    }
}

/// A 1-cell: polyline geometry between two nodes, with the labels of the
/// faces on either side of its positive dart.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) label: CellLabel,
    pub(crate) start_node: CellLabel,
    pub(crate) end_node: CellLabel,
    pub(crate) left_face: CellLabel,
    pub(crate) right_face: CellLabel,
    pub(crate) points: Polygon,
    pub(crate) flags: u32,
}

impl Edge {
    pub(crate) fn new(
        label: CellLabel,
        start_node: CellLabel,
        end_node: CellLabel,
        points: Polygon,
    ) -> Self {
        Self {
            label,
            start_node,
            end_node,
            left_face: UNINITIALIZED_LABEL,
            right_face: UNINITIALIZED_LABEL,
            points,
            flags: 0,
        }
    }

    pub fn label(&self) -> CellLabel {
        self.label
    }

    /// The positive dart of this edge.
    pub fn dart_label(&self) -> DartLabel {
        self.label as DartLabel
    }

    pub fn start_node_label(&self) -> CellLabel {
        self.start_node
    }

    pub fn end_node_label(&self) -> CellLabel {
        self.end_node
    }

    pub fn left_face_label(&self) -> CellLabel {
        self.left_face
    }

    pub fn right_face_label(&self) -> CellLabel {
        self.right_face
    }

    pub fn is_loop(&self) -> bool {
        self.start_node == self.end_node
    }

    pub fn is_bridge(&self) -> bool {
        self.left_face == self.right_face
    }

    pub fn points(&self) -> &Polygon {
        &self.points
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.points.bounding_box()
    }

    pub fn partial_area(&self) -> f64 {
        self.points.partial_area()
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn flag(&self, mask: u32) -> bool {
        self.flags & mask != 0
    }

    pub fn set_flag(&mut self, mask: u32, on: bool) {
        if on {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    pub fn is_protected(&self) -> bool {
        self.flag(ALL_PROTECTION)
    }
}

/// A 2-cell: one anchor dart per boundary component, with lazily cached
/// area and bounding box.
///
/// Label 0 is the infinite face; it carries hole anchors only and has no
/// bounding box.
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) label: CellLabel,
    pub(crate) anchors: Vec<DartLabel>,
    pub(crate) bbox: Cell<Option<BoundingBox>>,
    pub(crate) area: Cell<Option<f64>>,
    pub(crate) pixel_area: i64,
}

impl Face {
    pub(crate) fn new(label: CellLabel) -> Self {
        Self {
            label,
            anchors: Vec::new(),
            bbox: Cell::new(None),
            area: Cell::new(None),
            pixel_area: 0,
        }
    }

    pub fn label(&self) -> CellLabel {
        self.label
    }

    /// One anchor dart per boundary component.
    pub fn anchors(&self) -> &[DartLabel] {
        &self.anchors
    }

    pub fn pixel_area(&self) -> i64 {
        self.pixel_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_flags() {
        let mut e = Edge::new(1, 1, 2, Polygon::new());
        assert!(!e.is_protected());
        e.set_flag(BORDER_PROTECTION, true);
        e.set_flag(CUSTOM_PROTECTION, true);
        assert!(e.flag(BORDER_PROTECTION));
        assert!(e.is_protected());
        e.set_flag(BORDER_PROTECTION, false);
        assert!(!e.flag(BORDER_PROTECTION));
        assert!(e.is_protected());
        assert_eq!(e.flags(), CUSTOM_PROTECTION);
    }

    #[test]
    fn fresh_edge_has_unset_faces() {
        let e = Edge::new(3, 1, 1, Polygon::new());
        assert_eq!(e.left_face_label(), UNINITIALIZED_LABEL);
        assert_eq!(e.right_face_label(), UNINITIALIZED_LABEL);
        assert!(e.is_loop());
        assert!(e.is_bridge());
        assert_eq!(e.dart_label(), 3);
    }
}

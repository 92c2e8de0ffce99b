//! Euler operators: the four primitive edits plus the two composites.
//!
//! Every operator validates its preconditions and runs its veto-able
//! pre-hooks before the first mutation, keeps the sigma/phi invariants and
//! the cell counts intact, and synchronizes the label image where one is
//! attached.

use tm_core::Polygon;

use crate::cell::{CellLabel, DartLabel};
use crate::error::{Error, Result};
use crate::map::PlanarMap;
use crate::raster;

impl PlanarMap {
    /// Removes a node of degree 0.
    pub fn remove_isolated_node(&mut self, node: CellLabel) -> Result<()> {
        let n = self.require_node(node)?;
        if n.degree() != 0 {
            return Err(Error::precondition(
                "remove_isolated_node",
                format!("node {node} has degree {}", n.degree()),
            ));
        }
        if !self.notify_remove_node(node, true) {
            return Err(Error::HookVetoed {
                op: "remove_isolated_node",
            });
        }
        self.uninitialize_node(node);
        Ok(())
    }

    /// Node removal embedded in a larger operator: observers are told,
    /// but cannot veto the half-done surgery.
    fn cleanup_isolated_node(&mut self, node: CellLabel) {
        self.notify_remove_node(node, false);
        self.uninitialize_node(node);
    }

    /// Merges the next-sigma edge at the dart's start node into the
    /// dart's own edge, removing the shared degree-2 node. Returns the
    /// surviving edge label.
    pub fn merge_edges(&mut self, dart: DartLabel) -> Result<CellLabel> {
        let d1 = dart;
        self.dart_edge(d1)?;
        let d2 = self.sigma_next(d1)?;
        if d2.unsigned_abs() == d1.unsigned_abs() {
            return Err(Error::precondition(
                "merge_edges",
                format!("self-loop {} meets itself at the node", d1.unsigned_abs()),
            ));
        }
        if self.sigma_next(d2)? != d1 {
            let node = self.dart_start_node_label(d1)?;
            let degree = self.require_node(node)?.degree();
            return Err(Error::precondition(
                "merge_edges",
                format!("node {node} has degree {degree}, expected 2"),
            ));
        }
        debug_assert_eq!(
            self.dart_left_face_label(d1).ok(),
            self.dart_right_face_label(d2).ok()
        );
        debug_assert_eq!(
            self.dart_left_face_label(d2).ok(),
            self.dart_right_face_label(d1).ok()
        );

        let merged_node = self.dart_start_node_label(d1)?;
        let survivor_label = d1.unsigned_abs();
        let merged_label = d2.unsigned_abs();

        self.fire_pre("merge_edges", |hook, map| hook.pre_merge_edges(map, d1))?;
        if !self.notify_remove_node(merged_node, true) {
            return Err(Error::HookVetoed { op: "merge_edges" });
        }

        // face anchors sitting on the merged edge move one phi step on
        let faces = [
            self.dart_left_face_label(d1)?,
            self.dart_right_face_label(d1)?,
        ];
        for f in faces {
            let hit = self
                .require_face(f)?
                .anchors
                .iter()
                .position(|a| a.unsigned_abs() == merged_label);
            if let Some(i) = hit {
                let advanced = self.phi_next(self.require_face(f)?.anchors[i])?;
                self.face_mut(f).expect("checked above").anchors[i] = advanced;
            }
        }

        // the far end of the merged edge gets rewritten to the survivor
        let far_dart = -d2;
        let far_node = self.dart_start_node_label(far_dart)?;
        let far_index = self
            .require_node(far_node)?
            .darts
            .iter()
            .position(|&d| d == far_dart)
            .ok_or_else(|| {
                Error::invariant(format!(
                    "dart {far_dart} not found in ring of node {far_node}"
                ))
            })?;

        let merged_points = self.require_edge(merged_label)?.points.clone();
        let survivor_points_old = self.require_edge(survivor_label)?.points.clone();
        if self.label_image.is_some() {
            self.subtract_edge_raster(&merged_points);
            self.subtract_edge_raster(&survivor_points_old);
        }

        let mut merged_edge = self.edges[merged_label as usize]
            .take()
            .expect("validated above");
        self.edge_count -= 1;
        if merged_edge.start_node != merged_node {
            merged_edge.points.reverse();
        }

        let survivor = self
            .edge_mut(survivor_label)
            .expect("validated above");
        if survivor.start_node != merged_node {
            survivor.points.extend(&merged_edge.points);
            survivor.end_node = far_node;
        } else {
            survivor.points.reverse();
            survivor.points.extend(&merged_edge.points);
            survivor.points.reverse();
            survivor.start_node = far_node;
        }

        self.node_mut(far_node).expect("checked above").darts[far_index] = d1;

        if self.label_image.is_some() {
            let points = self.require_edge(survivor_label)?.points.clone();
            self.add_edge_raster(&points);
        }

        self.uninitialize_node(merged_node);

        self.fire_post(|hook, map| hook.post_merge_edges(map, survivor_label));
        Ok(survivor_label)
    }

    /// Removes a bridge edge, splitting its boundary component into two
    /// anchors of the same face. End nodes left isolated are removed.
    /// Returns the surviving face label.
    pub fn remove_bridge(&mut self, dart: DartLabel) -> Result<CellLabel> {
        let edge_label = dart.unsigned_abs();
        let face = self.dart_left_face_label(dart)?;
        if self.dart_right_face_label(dart)? != face {
            return Err(Error::precondition(
                "remove_bridge",
                format!("edge {edge_label} is not a bridge"),
            ));
        }
        let node1 = self.dart_start_node_label(dart)?;
        let node2 = self.dart_end_node_label(dart)?;
        if node1 == node2 {
            return Err(Error::precondition(
                "remove_bridge",
                format!("bridge edge {edge_label} is a self-loop"),
            ));
        }

        self.fire_pre("remove_bridge", |hook, map| {
            hook.pre_remove_bridge(map, dart)
        })?;

        let mut anchor1 = self.sigma_prev(dart)?;
        let mut anchor2 = self.sigma_prev(-dart)?;
        let contour_index = self.find_component_anchor(face, dart)?;

        self.detach_dart(node1, dart)?;
        self.detach_dart(node2, -dart)?;

        if contour_index == 0 {
            // keep the larger piece as the outer component
            let degenerate1 = anchor1.unsigned_abs() == edge_label;
            let degenerate2 = anchor2.unsigned_abs() == edge_label;
            if degenerate1
                || (!degenerate2 && self.contour_area(anchor1)? < self.contour_area(anchor2)?)
            {
                std::mem::swap(&mut anchor1, &mut anchor2);
            }
        }

        {
            let f = self.face_mut(face).expect("validated above");
            f.anchors[contour_index] = anchor1;
            f.anchors.push(anchor2);
        }

        let mut reclaimed = Vec::new();
        if self.label_image.is_some() {
            let points = self.require_edge(edge_label)?.points.clone();
            reclaimed = self.remove_edge_raster(&points, face as i32);
        }

        if anchor1.unsigned_abs() == edge_label {
            let n = self.dart_start_node_label(anchor1)?;
            self.cleanup_isolated_node(n);
            self.face_mut(face)
                .expect("validated above")
                .anchors
                .remove(contour_index);
        }
        if anchor2.unsigned_abs() == edge_label {
            let n = self.dart_start_node_label(anchor2)?;
            self.cleanup_isolated_node(n);
            self.face_mut(face).expect("validated above").anchors.pop();
        }

        self.uninitialize_edge(edge_label);

        self.fire_post(|hook, map| hook.post_remove_bridge(map, face));
        if !reclaimed.is_empty() {
            self.associate_pixels(face, &reclaimed);
        }
        Ok(face)
    }

    /// Merges the faces on both sides of a non-bridge edge. The face with
    /// the larger area survives; the infinite face always survives.
    /// Returns the surviving face label.
    pub fn merge_faces(&mut self, dart: DartLabel) -> Result<CellLabel> {
        let mut removed = dart;
        if self.face_area(self.dart_left_face_label(removed)?)?
            < self.face_area(self.dart_right_face_label(removed)?)?
        {
            removed = -removed;
        }
        if self.dart_right_face_label(removed)? == 0 {
            removed = -removed;
        }

        let merged_edge_label = removed.unsigned_abs();
        let survivor = self.dart_left_face_label(removed)?;
        let merged = self.dart_right_face_label(removed)?;
        if survivor == merged {
            return Err(Error::precondition(
                "merge_faces",
                format!("edge {merged_edge_label} is a bridge"),
            ));
        }
        let node1 = self.dart_start_node_label(removed)?;
        let node2 = self.dart_end_node_label(removed)?;

        let contour1 = self.find_component_anchor(survivor, removed)?;
        let contour2 = self.find_component_anchor(merged, -removed)?;

        self.fire_pre("merge_faces", |hook, map| hook.pre_merge_faces(map, dart))?;

        let survivor_area = self.face_area(survivor)?;
        let merged_area = self.face_area(merged)?;
        let merged_bbox = if survivor != 0 && self.require_face(survivor)?.bbox.get().is_some() {
            Some(self.face_bounding_box(merged)?)
        } else {
            None
        };

        // everything on the merged face's contours now lies left of the
        // survivor
        let merged_anchors = self.require_face(merged)?.anchors.clone();
        for &anchor in &merged_anchors {
            let mut d = anchor;
            let mut guard = self.orbit_guard();
            loop {
                self.set_dart_left_face_label(d, survivor)?;
                d = self.phi_next(d)?;
                if d == anchor {
                    break;
                }
                guard -= 1;
                if guard == 0 {
                    return Err(Error::invariant(format!(
                        "phi orbit of dart {anchor} does not close"
                    )));
                }
            }
        }

        // re-use an old anchor for the merged boundary component
        let mut anchor = self.require_face(survivor)?.anchors[contour1];
        if anchor.unsigned_abs() == merged_edge_label {
            anchor = self.phi_next(anchor)?;
            if anchor.unsigned_abs() == merged_edge_label {
                anchor = merged_anchors[contour2];
                if anchor.unsigned_abs() == merged_edge_label {
                    anchor = self.phi_next(anchor)?;
                }
            }
        }
        let degenerate = anchor.unsigned_abs() == merged_edge_label;
        if degenerate && node1 != node2 {
            return Err(Error::invariant(format!(
                "contour of edge {merged_edge_label} degenerated on a non-loop edge"
            )));
        }

        {
            let f = self.face_mut(survivor).expect("validated above");
            if degenerate {
                // a merged self-loop leaves an isolated node behind; its
                // boundary component disappears
                f.anchors.remove(contour1);
            } else {
                f.anchors[contour1] = anchor;
            }
            for (i, &a) in merged_anchors.iter().enumerate() {
                if i != contour2 {
                    f.anchors.push(a);
                }
            }
        }

        let mut reclaimed = Vec::new();
        if self.label_image.is_some() {
            self.face_label_lut.relabel(merged, survivor);
            let points = self.require_edge(merged_edge_label)?.points.clone();
            reclaimed = self.remove_edge_raster(&points, survivor as i32);
        }

        self.detach_dart(node1, removed)?;
        self.detach_dart(node2, -removed)?;

        let remove_node1 = self.require_node(node1)?.degree() == 0;
        if node2 != node1 && self.require_node(node2)?.degree() == 0 {
            self.cleanup_isolated_node(node2);
        }
        if remove_node1 {
            self.cleanup_isolated_node(node1);
        }

        let merged_pixel_area = self.require_face(merged)?.pixel_area;
        {
            let f = self.face_mut(survivor).expect("validated above");
            f.area.set(Some(survivor_area + merged_area));
            f.pixel_area += merged_pixel_area;
            if let (Some(bb), Some(mb)) = (f.bbox.get(), merged_bbox) {
                f.bbox.set(Some(bb.merged(&mb)));
            }
        }

        self.uninitialize_edge(merged_edge_label);
        self.uninitialize_face(merged);

        self.fire_post(|hook, map| hook.post_merge_faces(map, survivor));
        if !reclaimed.is_empty() {
            self.associate_pixels(survivor, &reclaimed);
        }
        Ok(survivor)
    }

    /// `remove_bridge` or `merge_faces`, depending on what the edge is.
    pub fn remove_edge(&mut self, dart: DartLabel) -> Result<CellLabel> {
        if self.dart_edge(dart)?.is_bridge() {
            self.remove_bridge(dart)
        } else {
            self.merge_faces(dart)
        }
    }

    /// `remove_edge`, then removal of each end node that is left
    /// isolated. A self-loop has only one end node to remove.
    pub fn remove_edge_with_ends(&mut self, dart: DartLabel) -> Result<CellLabel> {
        let edge = self.dart_edge(dart)?;
        let (node1, node2) = (edge.start_node, edge.end_node);

        let survivor = self.remove_edge(dart)?;

        if let Some(n) = self.node(node1)
            && n.degree() == 0
        {
            self.remove_isolated_node(node1)?;
        }
        if node2 != node1
            && let Some(n) = self.node(node2)
            && n.degree() == 0
        {
            self.remove_isolated_node(node2)?;
        }
        Ok(survivor)
    }

    // ----- label image helpers ----------------------------------------

    fn add_edge_raster(&mut self, points: &Polygon) {
        let pixels = raster::polyline_pixels(points.points());
        if let Some(img) = self.label_image.as_mut() {
            raster::add_edge_coverage(img, &pixels);
        }
    }

    fn subtract_edge_raster(&mut self, points: &Polygon) {
        let pixels = raster::polyline_pixels(points.points());
        let mut dropped = Vec::new();
        if let Some(img) = self.label_image.as_mut() {
            raster::remove_edge_coverage(img, &pixels, 0, &mut dropped);
        }
    }

    fn remove_edge_raster(&mut self, points: &Polygon, substitute: i32) -> Vec<(usize, usize)> {
        let pixels = raster::polyline_pixels(points.points());
        let mut reclaimed = Vec::new();
        if let Some(img) = self.label_image.as_mut() {
            raster::remove_edge_coverage(img, &pixels, substitute, &mut reclaimed);
        }
        reclaimed
    }
}

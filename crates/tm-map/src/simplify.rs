//! Composed cleanup operations built on top of the Euler operators.

use crate::cell::{CellLabel, DartLabel};
use crate::error::{Error, Result};
use crate::map::PlanarMap;

/// Bit for [`remove_cruft`]: merge faces across every non-bridge edge.
pub const CRUFT_MERGE_FACES: u32 = 8;
/// Bit for [`remove_cruft`]: remove every bridge edge.
pub const CRUFT_REMOVE_BRIDGES: u32 = 4;
/// Bit for [`remove_cruft`]: merge edges at degree-2 nodes.
pub const CRUFT_MERGE_EDGES: u32 = 2;
/// Bit for [`remove_cruft`]: remove isolated nodes.
pub const CRUFT_REMOVE_ISOLATED: u32 = 1;

impl PlanarMap {
    /// Removes *all* common edges of the two faces next to `dart`: the
    /// first by `merge_faces`, the rest (bridges by then) by
    /// `remove_bridge`. Nodes left isolated are removed, and nodes
    /// reduced to degree 2 are merged away when `remove_degree_2` is set.
    ///
    /// Returns `None` without touching the map if any common edge is
    /// protected.
    pub fn merge_faces_completely(
        &mut self,
        dart: DartLabel,
        remove_degree_2: bool,
    ) -> Result<Option<CellLabel>> {
        if self.dart_edge(dart)?.is_bridge() {
            return Err(Error::precondition(
                "merge_faces_completely",
                format!("edge {} is a bridge", dart.unsigned_abs()),
            ));
        }

        let right_label = self.dart_right_face_label(dart)?;
        let mut common: Vec<DartLabel> = Vec::new();
        let mut d = dart;
        let mut guard = self.orbit_guard();
        loop {
            if self.dart_right_face_label(d)? == right_label {
                if self.dart_edge(d)?.is_protected() {
                    return Ok(None);
                }
                common.push(d);
            }
            d = self.phi_next(d)?;
            if d == dart {
                break;
            }
            guard -= 1;
            if guard == 0 {
                return Err(Error::invariant(format!(
                    "phi orbit of dart {dart} does not close"
                )));
            }
        }

        let mut affected: Vec<CellLabel> = Vec::new();
        let mut survivor = None;
        for d in common {
            affected.push(self.dart_start_node_label(d)?);
            affected.push(self.dart_end_node_label(d)?);
            survivor = Some(match survivor {
                None => self.merge_faces(d)?,
                Some(s) => {
                    let f = self.remove_bridge(d)?;
                    debug_assert_eq!(f, s);
                    f
                }
            });
        }

        for node in affected {
            let Some(n) = self.node(node) else { continue };
            if n.degree() == 0 {
                self.remove_isolated_node(node)?;
            } else if remove_degree_2 && n.degree() == 2 {
                let anchor = n.anchor_label().expect("degree 2");
                if self.dart_end_node_label(anchor)? != node {
                    self.merge_edges(anchor)?;
                }
            }
        }

        Ok(survivor)
    }

    /// Sweeps the map with the operations selected in `what`
    /// (`CRUFT_*` bits), skipping protected edges. Hook vetoes skip the
    /// single operation; other errors propagate. Returns the number of
    /// operations performed.
    pub fn remove_cruft(&mut self, what: u32) -> Result<usize> {
        let mut performed = 0_usize;

        if what & CRUFT_MERGE_FACES != 0 {
            for label in self.live_edge_labels() {
                let Some(e) = self.edge(label) else { continue };
                if e.is_bridge() || e.is_protected() {
                    continue;
                }
                match self.merge_faces(label as DartLabel) {
                    Ok(_) => performed += 1,
                    Err(Error::HookVetoed { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if what & CRUFT_REMOVE_BRIDGES != 0 {
            for label in self.live_edge_labels() {
                let Some(e) = self.edge(label) else { continue };
                if !e.is_bridge() || e.is_protected() || e.is_loop() {
                    continue;
                }
                match self.remove_bridge(label as DartLabel) {
                    Ok(_) => performed += 1,
                    Err(Error::HookVetoed { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if what & CRUFT_MERGE_EDGES != 0 {
            for label in self.live_node_labels() {
                let Some(n) = self.node(label) else { continue };
                if n.degree() != 2 {
                    continue;
                }
                let anchor = n.anchor_label().expect("degree 2");
                if self.dart_end_node_label(anchor)? == label {
                    continue; // self-loop configuration
                }
                if self.dart_edge(anchor)?.is_protected()
                    || self.dart_edge(self.sigma_next(anchor)?)?.is_protected()
                {
                    continue;
                }
                match self.merge_edges(anchor) {
                    Ok(_) => performed += 1,
                    Err(Error::HookVetoed { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if what & CRUFT_REMOVE_ISOLATED != 0 {
            for label in self.live_node_labels() {
                let Some(n) = self.node(label) else { continue };
                if n.degree() != 0 {
                    continue;
                }
                match self.remove_isolated_node(label) {
                    Ok(()) => performed += 1,
                    Err(Error::HookVetoed { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(performed)
    }

    fn live_edge_labels(&self) -> Vec<CellLabel> {
        self.edges().map(|e| e.label()).collect()
    }

    fn live_node_labels(&self) -> Vec<CellLabel> {
        self.nodes().map(|n| n.label()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::BORDER_PROTECTION;
    use tm_core::Point2d;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    /// Two squares sharing the vertical edge 2: faces left and right of it.
    fn double_square() -> PlanarMap {
        let mut map = PlanarMap::new((16, 16));
        let n1 = map.add_node(p(1.0, 1.0));
        let n2 = map.add_node(p(5.0, 1.0));
        let n3 = map.add_node(p(9.0, 1.0));
        let n4 = map.add_node(p(9.0, 7.0));
        let n5 = map.add_node(p(5.0, 7.0));
        let n6 = map.add_node(p(1.0, 7.0));
        map.add_edge(n1, n2, vec![p(1.0, 1.0), p(5.0, 1.0)], None)
            .expect("edge");
        map.add_edge(n2, n5, vec![p(5.0, 1.0), p(5.0, 7.0)], None)
            .expect("edge");
        map.add_edge(n2, n3, vec![p(5.0, 1.0), p(9.0, 1.0)], None)
            .expect("edge");
        map.add_edge(n3, n4, vec![p(9.0, 1.0), p(9.0, 7.0)], None)
            .expect("edge");
        map.add_edge(n4, n5, vec![p(9.0, 7.0), p(5.0, 7.0)], None)
            .expect("edge");
        map.add_edge(n5, n6, vec![p(5.0, 7.0), p(1.0, 7.0)], None)
            .expect("edge");
        map.add_edge(n6, n1, vec![p(1.0, 7.0), p(1.0, 1.0)], None)
            .expect("edge");
        map.sort_edges_directly().expect("sortable");
        map.init_contours().expect("fresh map");
        map.embed_faces(false).expect("embeddable");
        map
    }

    #[test]
    fn merge_faces_completely_merges_both_squares() {
        let mut map = double_square();
        assert_eq!(map.face_count(), 3);

        let survivor = map
            .merge_faces_completely(2, true)
            .expect("valid dart")
            .expect("not protected");
        assert!(map.face(survivor).is_some());
        assert_eq!(map.face_count(), 2);
        // the shared edge is gone and the two degree-2 corners at its
        // former endpoints were merged away
        assert!(map.edge(2).is_none());
        assert!(map.node(2).is_none());
        assert!(map.node(5).is_none());
        assert!(map.check_consistency());
    }

    #[test]
    fn merge_faces_completely_respects_protection() {
        let mut map = double_square();
        map.edge_mut(2)
            .expect("live")
            .set_flag(BORDER_PROTECTION, true);
        let result = map.merge_faces_completely(2, true).expect("valid dart");
        assert_eq!(result, None);
        assert_eq!(map.face_count(), 3);
        assert!(map.check_consistency());
    }

    #[test]
    fn remove_cruft_reduces_to_empty_map() {
        let mut map = double_square();
        let performed = map
            .remove_cruft(
                CRUFT_MERGE_FACES
                    | CRUFT_REMOVE_BRIDGES
                    | CRUFT_MERGE_EDGES
                    | CRUFT_REMOVE_ISOLATED,
            )
            .expect("sweep");
        assert!(performed > 0);
        assert_eq!(map.face_count(), 1);
        assert_eq!(map.edge_count(), 0);
        assert_eq!(map.node_count(), 0);
        assert!(map.check_consistency());
    }

    #[test]
    fn remove_cruft_skips_protected_edges() {
        let mut map = double_square();
        for label in 1..=7 {
            if let Some(e) = map.edge_mut(label) {
                e.set_flag(BORDER_PROTECTION, true);
            }
        }
        let performed = map.remove_cruft(CRUFT_MERGE_FACES).expect("sweep");
        assert_eq!(performed, 0);
        assert_eq!(map.face_count(), 3);
    }
}

use tm_core::{Point2d, Polygon};

use crate::cell::{CellLabel, DartLabel, Edge, Face, Node};
use crate::error::Result;
use crate::map::PlanarMap;

/// Copyable cursor over an oriented half-edge.
///
/// `|label|` selects the edge, the sign the orientation. Moves are pure:
/// every navigation method returns a new cursor. A dart may outlive its
/// edge; dereferencing it then fails with `DanglingDart`.
#[derive(Clone, Copy)]
pub struct Dart<'a> {
    map: &'a PlanarMap,
    label: DartLabel,
}

impl<'a> Dart<'a> {
    pub(crate) fn new(map: &'a PlanarMap, label: DartLabel) -> Self {
        Self { map, label }
    }

    /// Rebuilds a dart from a serialized label against any map state.
    pub fn deserialize(map: &'a PlanarMap, serial: DartLabel) -> Self {
        Self::new(map, serial)
    }

    /// Opaque serialized form, stable against all mutations that keep the
    /// edge alive.
    pub fn serialize(&self) -> DartLabel {
        self.label
    }

    pub fn label(&self) -> DartLabel {
        self.label
    }

    pub fn edge_label(&self) -> CellLabel {
        self.label.unsigned_abs()
    }

    pub fn is_live(&self) -> bool {
        self.map.edge(self.edge_label()).is_some()
    }

    pub fn edge(&self) -> Result<&'a Edge> {
        self.map.edge(self.edge_label()).ok_or(crate::Error::DanglingDart {
            dart: self.label,
        })
    }

    pub fn start_node_label(&self) -> Result<CellLabel> {
        self.map.dart_start_node_label(self.label)
    }

    pub fn end_node_label(&self) -> Result<CellLabel> {
        self.map.dart_end_node_label(self.label)
    }

    pub fn start_node(&self) -> Result<&'a Node> {
        self.map.require_node(self.start_node_label()?)
    }

    pub fn end_node(&self) -> Result<&'a Node> {
        self.map.require_node(self.end_node_label()?)
    }

    pub fn left_face_label(&self) -> Result<CellLabel> {
        self.map.dart_left_face_label(self.label)
    }

    pub fn right_face_label(&self) -> Result<CellLabel> {
        self.map.dart_right_face_label(self.label)
    }

    pub fn left_face(&self) -> Result<&'a Face> {
        self.map.require_face(self.left_face_label()?)
    }

    pub fn right_face(&self) -> Result<&'a Face> {
        self.map.require_face(self.right_face_label()?)
    }

    /// Signed partial area of the polyline in dart direction.
    pub fn partial_area(&self) -> Result<f64> {
        let pa = self.edge()?.partial_area();
        Ok(if self.label > 0 { pa } else { -pa })
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.edge()?.points().len())
    }

    /// `i`-th polyline point in dart direction.
    pub fn point(&self, i: usize) -> Result<Point2d> {
        let points = self.edge()?.points();
        Ok(if self.label > 0 {
            points[i]
        } else {
            points[points.len() - 1 - i]
        })
    }

    pub fn points(&self) -> Result<DartPoints<'a>> {
        let edge = self.edge()?;
        Ok(DartPoints {
            points: edge.points(),
            forward: self.label > 0,
            next: 0,
            remaining: edge.points().len(),
        })
    }

    /// The opposite dart of the same edge.
    pub fn next_alpha(self) -> Self {
        Self {
            map: self.map,
            label: -self.label,
        }
    }

    /// One step counter-clockwise around the start node.
    pub fn next_sigma(self) -> Result<Self> {
        self.rotate_sigma(1)
    }

    pub fn prev_sigma(self) -> Result<Self> {
        self.rotate_sigma(-1)
    }

    /// Cyclic rotation by `times` within the start node's dart ring.
    pub fn rotate_sigma(self, times: i64) -> Result<Self> {
        Ok(Self {
            map: self.map,
            label: self.map.sigma_rotate(self.label, times)?,
        })
    }

    /// One edge forward along the face contour on the left.
    pub fn next_phi(self) -> Result<Self> {
        Ok(Self {
            map: self.map,
            label: self.map.phi_next(self.label)?,
        })
    }

    pub fn prev_phi(self) -> Result<Self> {
        Ok(Self {
            map: self.map,
            label: self.map.phi_prev(self.label)?,
        })
    }

    /// Contour area of the phi orbit through this dart.
    pub fn contour_area(&self) -> Result<f64> {
        self.map.contour_area(self.label)
    }

    /// Contour polygon of the phi orbit through this dart.
    pub fn contour_poly(&self) -> Result<Polygon> {
        self.map.contour_poly(self.label)
    }

    pub fn contour_points(&self, first_twice: bool) -> Result<ContourPoints<'a>> {
        ContourPoints::new(*self, first_twice)
    }
}

impl PartialEq for Dart<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for Dart<'_> {}

impl std::fmt::Debug for Dart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dart({})", self.label)
    }
}

/// Polyline points of one dart, in dart direction.
pub struct DartPoints<'a> {
    points: &'a Polygon,
    forward: bool,
    next: usize,
    remaining: usize,
}

impl Iterator for DartPoints<'_> {
    type Item = Point2d;

    fn next(&mut self) -> Option<Point2d> {
        if self.remaining == 0 {
            return None;
        }
        let i = if self.forward {
            self.next
        } else {
            self.points.len() - 1 - self.next
        };
        self.next += 1;
        self.remaining -= 1;
        Some(self.points[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Points of a whole contour, chaining dart point runs around a phi orbit.
///
/// Joint points shared between consecutive darts appear once. With
/// `first_twice` the start point is emitted again at the end of the orbit,
/// closing the polygon for consumers that expect it.
pub struct ContourPoints<'a> {
    map: &'a PlanarMap,
    start: DartLabel,
    current: DartLabel,
    index: usize,
    size: usize,
    done: bool,
}

impl<'a> ContourPoints<'a> {
    pub fn new(dart: Dart<'a>, first_twice: bool) -> Result<Self> {
        let size = dart.size()?;
        Ok(Self {
            map: dart.map,
            start: dart.label,
            current: dart.label,
            index: if first_twice { 0 } else { 1 },
            size,
            done: false,
        })
    }

    fn dart_point(&self, dart: DartLabel, i: usize) -> Option<Point2d> {
        let edge = self.map.edge(dart.unsigned_abs())?;
        let points = edge.points();
        Some(if dart > 0 {
            points[i]
        } else {
            points[points.len() - 1 - i]
        })
    }
}

impl Iterator for ContourPoints<'_> {
    type Item = Point2d;

    fn next(&mut self) -> Option<Point2d> {
        if self.done {
            return None;
        }
        if self.index >= self.size {
            let Ok(next) = self.map.phi_next(self.current) else {
                self.done = true;
                return None;
            };
            if next == self.start {
                self.done = true;
                return None;
            }
            self.current = next;
            self.size = self.map.edge(next.unsigned_abs())?.points().len();
            self.index = 1; // the joint point was already emitted
        }
        let p = self.dart_point(self.current, self.index)?;
        self.index += 1;
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    fn two_segment_map() -> PlanarMap {
        let mut map = PlanarMap::new((16, 16));
        let n1 = map.add_node(p(0.0, 0.0));
        let n2 = map.add_node(p(5.0, 0.0));
        let n3 = map.add_node(p(5.0, 5.0));
        map.add_edge(n1, n2, vec![p(0.0, 0.0), p(2.0, 1.0), p(5.0, 0.0)], None)
            .expect("edge 1");
        map.add_edge(n2, n3, vec![p(5.0, 0.0), p(5.0, 5.0)], None)
            .expect("edge 2");
        map
    }

    #[test]
    fn alpha_flips_orientation() {
        let map = two_segment_map();
        let d = map.dart(1);
        assert_eq!(d.start_node_label().expect("live"), 1);
        assert_eq!(d.end_node_label().expect("live"), 2);
        let a = d.next_alpha();
        assert_eq!(a.label(), -1);
        assert_eq!(a.start_node_label().expect("live"), 2);
        assert_eq!(a.next_alpha(), d);
    }

    #[test]
    fn dart_points_respect_direction() {
        let map = two_segment_map();
        let fwd: Vec<_> = map.dart(1).points().expect("live").collect();
        assert_eq!(fwd, vec![p(0.0, 0.0), p(2.0, 1.0), p(5.0, 0.0)]);
        let bwd: Vec<_> = map.dart(-1).points().expect("live").collect();
        assert_eq!(bwd, vec![p(5.0, 0.0), p(2.0, 1.0), p(0.0, 0.0)]);
        assert_eq!(map.dart(-1).point(0).expect("live"), p(5.0, 0.0));
    }

    #[test]
    fn sigma_rotates_the_node_ring() {
        let map = two_segment_map();
        // node 2 carries -1 and +2
        let d = map.dart(-1);
        let s = d.next_sigma().expect("attached");
        assert_eq!(s.label(), 2);
        assert_eq!(s.next_sigma().expect("attached"), d);
        assert_eq!(d.rotate_sigma(2).expect("attached"), d);
        assert_eq!(d.rotate_sigma(-1).expect("attached").label(), 2);
    }

    #[test]
    fn dangling_dart_fails_to_dereference() {
        let map = PlanarMap::new((8, 8));
        let d = map.dart(7);
        assert!(!d.is_live());
        assert!(matches!(d.edge(), Err(crate::Error::DanglingDart { dart: 7 })));
    }

    #[test]
    fn contour_points_chain_around_the_orbit() {
        let mut map = PlanarMap::new((16, 16));
        let n1 = map.add_node(p(0.0, 0.0));
        let n2 = map.add_node(p(10.0, 0.0));
        let n3 = map.add_node(p(5.0, 8.0));
        map.add_edge(n1, n2, vec![p(0.0, 0.0), p(10.0, 0.0)], None)
            .expect("edge 1");
        map.add_edge(n2, n3, vec![p(10.0, 0.0), p(5.0, 8.0)], None)
            .expect("edge 2");
        map.add_edge(n3, n1, vec![p(5.0, 8.0), p(0.0, 0.0)], None)
            .expect("edge 3");
        map.sort_edges_directly().expect("sortable");
        map.init_contours().expect("fresh map");
        map.embed_faces(false).expect("embeddable");

        let finite = map.faces().find(|f| f.label() != 0).expect("one face");
        let anchor = map.dart(finite.anchors()[0]);

        let open: Vec<_> = anchor.contour_points(false).expect("live").collect();
        assert_eq!(open.len(), 3);
        // the start point shows up once, as the closing point
        assert_eq!(open.first(), Some(&p(10.0, 0.0)));
        assert_eq!(open.last(), Some(&anchor.point(0).expect("live")));

        let closed: Vec<_> = anchor.contour_points(true).expect("live").collect();
        assert_eq!(closed.len(), 4);
        assert_eq!(closed.first(), closed.last());

        let poly = anchor.contour_poly().expect("live");
        assert_eq!(poly.len(), 4);
        assert!((anchor.contour_area().expect("live") - 40.0).abs() < 1e-9);
    }

    #[test]
    fn serialize_roundtrip() {
        let map = two_segment_map();
        let d = map.dart(-2);
        let serial = d.serialize();
        let back = Dart::deserialize(&map, serial);
        assert_eq!(back, d);
        assert_eq!(back.start_node_label().expect("live"), 3);
    }
}

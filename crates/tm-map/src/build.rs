use std::cmp::Ordering;

use tm_core::{Image, Point2d, Vec2d};

use crate::cell::{CellLabel, DartLabel, Face, UNINITIALIZED_LABEL};
use crate::error::{Error, Result};
use crate::map::{PlanarMap, pixel_of};
use crate::raster;

/// Angle of a direction vector in image coordinates. Ascending angle is
/// counter-clockwise in the numeric (x, y) frame, which pairs with
/// phi = alpha then sigma-inverse walking each face contour with the face
/// on its left.
fn ring_angle(dir: Vec2d) -> f64 {
    dir.y.atan2(dir.x)
}

fn norm_angle(mut diff: f64) -> f64 {
    if diff < -std::f64::consts::PI {
        diff += 2.0 * std::f64::consts::PI;
    }
    if diff >= std::f64::consts::PI {
        diff -= 2.0 * std::f64::consts::PI;
    }
    diff
}

/// Tangent cursor along a dart's polyline, advanced by intersecting
/// circles around the sort pivot.
struct DartPosition {
    dart: DartLabel,
    points: Vec<Point2d>,
    segment: usize,
    p1: Point2d,
    p2: Point2d,
    position: Point2d,
    hit_end: bool,
}

impl DartPosition {
    fn new(dart: DartLabel, points: Vec<Point2d>) -> Self {
        let p1 = points[0];
        let p2 = points[1];
        Self {
            dart,
            points,
            segment: 0,
            p1,
            p2,
            position: p1,
            hit_end: false,
        }
    }

    fn at_end(&self) -> bool {
        self.hit_end
    }

    fn current(&self) -> Point2d {
        self.position
    }

    fn next_segment(&mut self) -> bool {
        self.p1 = self.p2;
        self.segment += 1;
        if self.segment + 1 >= self.points.len() {
            self.hit_end = true;
            return false;
        }
        self.p2 = self.points[self.segment + 1];
        true
    }

    /// Moves the position to the first intersection of the polyline with
    /// the circle of squared radius `radius2` around `center`; sticks to
    /// the last point once the polyline ends inside the circle.
    fn intersect_circle(&mut self, center: Point2d, radius2: f64) {
        while (self.p2 - center).squared_norm() < radius2 {
            if !self.next_segment() {
                self.position = self.p2;
                return;
            }
        }

        let diff = self.p2 - self.p1;
        let dist2 = diff.squared_norm();
        let det = self.p2.x * self.p1.y - self.p1.x * self.p2.y + center.x * diff.y
            - diff.x * center.y;
        let disc = (radius2 * dist2 - det * det).max(0.0);
        let lambda = (disc.sqrt() - diff.dot(self.p1 - center)) / dist2;
        self.position = self.p1 + diff * lambda;
    }
}

struct DartTangent {
    position: DartPosition,
    abs_angle: f64,
    angle: f64,
}

/// Sorts a tie group of darts by the angles of their tangent positions on
/// the circle around `current_pos`, recursing on subgroups that stay
/// within `min_angle` of each other.
fn sort_edges_internal(
    node: CellLabel,
    current_pos: Point2d,
    reference_angle: f64,
    group: &mut [DartTangent],
    step_dist2: f64,
    min_angle: f64,
) -> Result<()> {
    if group.len() < 2 {
        return Ok(());
    }

    let mut unsortable = true;
    for t in group.iter_mut() {
        if !t.position.at_end() {
            unsortable = false;
            t.position.intersect_circle(current_pos, step_dist2);
        }
        t.abs_angle = ring_angle(t.position.current() - current_pos);
        t.angle = norm_angle(t.abs_angle - reference_angle);
    }

    if unsortable {
        return Err(Error::Unsortable { node });
    }

    group.sort_by(|a, b| a.angle.total_cmp(&b.angle));

    // a group may straddle the -pi/pi wrap; rotate it to the front
    let mut first_group_start = group.len();
    let mut need_rotation = false;
    loop {
        first_group_start -= 1;
        if group[first_group_start].angle + min_angle < group[0].angle {
            need_rotation = true;
            if first_group_start == 0 {
                need_rotation = false;
                break;
            }
        } else {
            break;
        }
    }
    if need_rotation {
        group.rotate_left(first_group_start);
    }

    // resolve runs of still-parallel darts recursively
    let mut group_start = 0_usize;
    let mut group_last = 0_usize;
    loop {
        let group_end = group_last + 1;
        let ends_here = group_end == group.len()
            || group[group_end].angle >= group[group_last].angle + min_angle;
        if ends_here {
            if group_last != group_start {
                let mut mean = Vec2d::default();
                for t in &group[group_start..group_end] {
                    mean += t.position.current() - Point2d::default();
                }
                let mean_pos =
                    Point2d::default() + mean / (group_end - group_start) as f64;
                let spread = norm_angle(
                    group[group_last].abs_angle - group[group_start].abs_angle,
                );
                let new_reference = norm_angle(group[group_start].abs_angle + spread / 2.0);
                sort_edges_internal(
                    node,
                    mean_pos,
                    new_reference,
                    &mut group[group_start..group_end],
                    step_dist2,
                    min_angle,
                )?;
            }
            if group_end == group.len() {
                break;
            }
            group_start = group_end;
        }
        group_last += 1;
    }
    Ok(())
}

impl PlanarMap {
    /// Rewrites every node's dart ring into counter-clockwise order, using
    /// the angle of each dart's first polyline segment. Ties between
    /// parallel first segments keep their insertion order.
    pub fn sort_edges_directly(&mut self) -> Result<()> {
        let node_labels: Vec<CellLabel> = self.nodes().map(|n| n.label()).collect();
        for label in node_labels {
            let ring = self.require_node(label)?.darts.clone();
            let mut angles: Vec<(f64, DartLabel)> = Vec::with_capacity(ring.len());
            for d in ring {
                let (p0, p1) = self.dart_first_segment(d)?;
                angles.push((ring_angle(p1 - p0), d));
            }
            angles.sort_by(|a, b| a.0.total_cmp(&b.0));
            self.node_mut(label).expect("iterated live").darts =
                angles.into_iter().map(|(_, d)| d).collect();
        }
        Ok(())
    }

    /// Robust variant of `sort_edges_directly`: parallel darts are told
    /// apart by advancing their tangent points to a circle of radius
    /// `step_dist` and recursing while the angular spread stays below
    /// `atan2(min_dist, step_dist)`.
    ///
    /// Fails with `Unsortable` if a tie group runs out of polyline before
    /// the resolution is reached; no dart order is changed then.
    pub fn sort_edges_eventually(&mut self, step_dist: f64, min_dist: f64) -> Result<()> {
        let min_angle = min_dist.atan2(step_dist);
        let step_dist2 = step_dist * step_dist;

        let node_labels: Vec<CellLabel> = self.nodes().map(|n| n.label()).collect();
        let mut new_rings: Vec<(CellLabel, Vec<DartLabel>)> = Vec::with_capacity(node_labels.len());

        for label in node_labels {
            let node_pos = self.require_node(label)?.position;
            let ring = self.require_node(label)?.darts.clone();
            let mut tangents: Vec<DartTangent> = Vec::with_capacity(ring.len());
            for d in ring {
                tangents.push(DartTangent {
                    position: DartPosition::new(d, self.dart_polyline(d)?),
                    abs_angle: 0.0,
                    angle: 0.0,
                });
            }
            sort_edges_internal(label, node_pos, 0.0, &mut tangents, step_dist2, min_angle)?;
            new_rings.push((label, tangents.into_iter().map(|t| t.position.dart).collect()));
        }

        for (label, ring) in new_rings {
            self.node_mut(label).expect("collected live").darts = ring;
        }
        Ok(())
    }

    /// Creates the infinite face, then one preliminary face per edge side
    /// whose left face is still unassigned, labeling its whole phi orbit.
    pub fn init_contours(&mut self) -> Result<()> {
        if !self.faces.is_empty() {
            return Err(Error::precondition(
                "init_contours",
                "contours are already present",
            ));
        }

        self.faces.push(Some(Face::new(0)));
        self.face_count += 1;

        let edge_labels: Vec<CellLabel> = self.edges().map(|e| e.label()).collect();
        for label in edge_labels {
            if self.require_edge(label)?.left_face == UNINITIALIZED_LABEL {
                self.new_preliminary_face(label as DartLabel)?;
            }
            if self.require_edge(label)?.right_face == UNINITIALIZED_LABEL {
                self.new_preliminary_face(-(label as DartLabel))?;
            }
        }
        Ok(())
    }

    fn new_preliminary_face(&mut self, anchor: DartLabel) -> Result<CellLabel> {
        let label = self.faces.len() as CellLabel;
        let mut face = Face::new(label);
        face.anchors.push(anchor);
        self.faces.push(Some(face));
        self.face_count += 1;

        let mut d = anchor;
        let mut guard = self.orbit_guard();
        while self.dart_left_face_label(d)? == UNINITIALIZED_LABEL {
            self.set_dart_left_face_label(d, label)?;
            d = self.phi_next(d)?;
            guard -= 1;
            if guard == 0 {
                return Err(Error::invariant(format!(
                    "phi orbit of dart {anchor} does not close"
                )));
            }
        }
        Ok(label)
    }

    /// Sorts preliminary contours by falling absolute area (near-ties
    /// prefer the exterior one), keeps positive contours as faces and
    /// embeds negative contours as hole anchors of their parent face.
    ///
    /// With `init_label_image`, face interiors are rasterized into a fresh
    /// label image and every edge polyline is drawn on top as coverage.
    pub fn embed_faces(&mut self, init_label_image: bool) -> Result<()> {
        if self.label_image.is_some() {
            return Err(Error::precondition(
                "embed_faces",
                "label image is already initialized",
            ));
        }
        if self.faces.is_empty() {
            return Err(Error::precondition(
                "embed_faces",
                "init_contours() has not run",
            ));
        }

        if init_label_image {
            self.label_image = Some(Image::new_fill(self.image_size.0, self.image_size.1, 0));
            self.face_label_lut.init_identity(self.faces.len());
        }

        // detach all preliminary contours; the infinite face stays
        let mut contours: Vec<(Face, f64)> = Vec::new();
        for slot in self.faces.iter_mut().skip(1) {
            if let Some(face) = slot.take() {
                contours.push((face, 0.0));
            }
        }
        for entry in contours.iter_mut() {
            let mut area = 0.0;
            for &a in &entry.0.anchors {
                area += self.contour_area(a)?;
            }
            entry.1 = area;
        }
        contours.sort_by(|(_, a1), (_, a2)| {
            if (a1.abs() - a2.abs()).abs() < 1e-2 && (*a1 < 0.0) != (*a2 < 0.0) {
                if *a1 < 0.0 { Ordering::Less } else { Ordering::Greater }
            } else {
                a2.abs().total_cmp(&a1.abs())
            }
        });

        for (mut face, area) in contours {
            let label = face.label;
            let anchor = face.anchors[0];
            if area > 0.0 {
                face.area.set(Some(area));
                if init_label_image {
                    let poly = self.contour_poly(anchor)?;
                    let img = self.label_image.as_mut().expect("initialized above");
                    face.pixel_area = raster::fill_polygon(img, &poly, label as i32);
                }
                self.faces[label as usize] = Some(face);
            } else {
                let parent = self.find_contour_parent(anchor)?;
                self.embed_contour(parent, anchor)?;
                if init_label_image {
                    self.face_label_lut.set(label, parent);
                }
                self.face_count -= 1;
            }
        }

        if init_label_image {
            let edge_labels: Vec<CellLabel> = self.edges().map(|e| e.label()).collect();
            for label in edge_labels {
                let pixels =
                    raster::polyline_pixels(self.require_edge(label)?.points.points());
                let img = self.label_image.as_mut().expect("initialized above");
                raster::add_edge_coverage(img, &pixels);
            }
        }
        Ok(())
    }

    /// Parent face of a hole contour: probe the label image along the
    /// contour, then scan faces by containment, then give up and use the
    /// infinite face.
    fn find_contour_parent(&self, anchor: DartLabel) -> Result<CellLabel> {
        if let Some(img) = &self.label_image {
            let poly = self.contour_poly(anchor)?;
            for &p in poly.points() {
                let (x, y) = pixel_of(p);
                if img.is_inside(x, y) {
                    let v = *img.get(x as usize, y as usize).expect("bounds checked");
                    if v >= 0 {
                        if v == 0 {
                            break;
                        }
                        match self.face(v as CellLabel) {
                            Some(f) => return Ok(f.label()),
                            None => break,
                        }
                    }
                }
            }
        }

        let poly = self.contour_poly(anchor)?;
        for &p in poly.points() {
            for face in self.faces() {
                if face.label() != 0 && self.face_contains(face.label(), p)? {
                    return Ok(face.label());
                }
            }
        }

        Ok(0)
    }

    /// Adds `anchor`'s contour as an additional boundary component of
    /// `parent`, relabeling the whole orbit.
    pub(crate) fn embed_contour(&mut self, parent: CellLabel, anchor: DartLabel) -> Result<()> {
        self.require_face(parent)?;
        self.face_mut(parent).expect("checked above").anchors.push(anchor);

        let mut d = anchor;
        let mut guard = self.orbit_guard();
        while self.dart_left_face_label(d)? != parent {
            self.set_dart_left_face_label(d, parent)?;
            d = self.phi_next(d)?;
            guard -= 1;
            if guard == 0 {
                return Err(Error::invariant("contour labeled partially".to_string()));
            }
        }
        if d != anchor {
            return Err(Error::invariant("contour labeled partially".to_string()));
        }

        let face = self.require_face(parent)?;
        if let Some(a) = face.area.get() {
            let ca = self.contour_area(anchor)?;
            self.face_mut(parent).expect("checked above").area.set(Some(a + ca));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    fn triangle() -> PlanarMap {
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
        map
    }

    fn built_triangle(label_image: bool) -> PlanarMap {
        let mut map = triangle();
        map.sort_edges_directly().expect("sortable");
        map.init_contours().expect("no contours yet");
        map.embed_faces(label_image).expect("embeddable");
        map
    }

    #[test]
    fn triangle_builds_two_faces() {
        let map = built_triangle(false);
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.edge_count(), 3);
        assert_eq!(map.face_count(), 2);
        assert!(map.check_consistency());

        // the finite face is the triangle with area 40
        let finite: Vec<_> = map.faces().filter(|f| f.label() != 0).collect();
        assert_eq!(finite.len(), 1);
        let area = map.face_area(finite[0].label()).expect("live face");
        assert!((area - 40.0).abs() < 1e-9);

        // the infinite face holds the exterior contour as a hole anchor
        let infinite = map.face(0).expect("always exists");
        assert_eq!(infinite.anchors().len(), 1);
    }

    #[test]
    fn sort_edges_directly_is_idempotent() {
        let mut map = built_triangle(false);
        let rings: Vec<Vec<DartLabel>> =
            map.nodes().map(|n| n.darts().to_vec()).collect();
        map.sort_edges_directly().expect("sortable");
        let again: Vec<Vec<DartLabel>> =
            map.nodes().map(|n| n.darts().to_vec()).collect();
        assert_eq!(rings, again);
    }

    #[test]
    fn init_contours_twice_fails() {
        let mut map = triangle();
        map.sort_edges_directly().expect("sortable");
        map.init_contours().expect("first run");
        assert!(matches!(
            map.init_contours(),
            Err(Error::PreconditionViolated { .. })
        ));
    }

    #[test]
    fn label_image_marks_interior_and_edges() {
        let map = built_triangle(true);
        let img = map.label_image().expect("requested");
        let finite = map.faces().find(|f| f.label() != 0).expect("one face");

        // an interior pixel carries the face label
        assert_eq!(map.face_at(p(5.0, 3.0)).expect("inside"), finite.label());
        // edge pixels carry coverage
        assert!(*img.get(5, 0).expect("in range") < 0);
        // outside pixels resolve to the infinite face
        assert_eq!(map.face_at(p(14.0, 14.0)).expect("outside"), 0);
        assert!(finite.pixel_area() > 20);
        assert!(map.check_consistency());
    }

    #[test]
    fn face_contains_uses_holes() {
        let map = built_triangle(false);
        let finite = map.faces().find(|f| f.label() != 0).expect("one face");
        assert!(map.face_contains(finite.label(), p(5.0, 3.0)).expect("live"));
        assert!(!map.face_contains(0, p(5.0, 3.0)).expect("live"));
        assert!(map.face_contains(0, p(14.0, 14.0)).expect("live"));
        assert!(!map.face_contains(finite.label(), p(14.0, 14.0)).expect("live"));
    }

    #[test]
    fn sort_edges_eventually_separates_near_parallel_darts() {
        // two edges leave node 1 with identical first segments and only
        // diverge after 0.3 units
        let mut map = PlanarMap::new((16, 16));
        let n1 = map.add_node(p(0.0, 0.0));
        let n2 = map.add_node(p(2.0, 1.0));
        let n3 = map.add_node(p(2.0, -1.0));
        map.add_edge(
            n1,
            n2,
            vec![p(0.0, 0.0), p(0.3, 0.0), p(1.0, 0.5), p(2.0, 1.0)],
            None,
        )
        .expect("edge 1");
        map.add_edge(
            n1,
            n3,
            vec![p(0.0, 0.0), p(0.3, 0.0), p(1.0, -0.5), p(2.0, -1.0)],
            None,
        )
        .expect("edge 2");

        map.sort_edges_eventually(0.5, 0.1).expect("resolvable");
        // edge 2 diverges towards negative y and gets the smaller angle
        let ring = map.node(n1).expect("live").darts().to_vec();
        assert_eq!(ring, vec![2, 1]);

        // the direct sort cannot tell them apart but must stay stable
        map.sort_edges_directly().expect("sortable");
        let ring = map.node(n1).expect("live").darts().to_vec();
        assert_eq!(ring, vec![2, 1]);
    }

    #[test]
    fn sort_edges_eventually_reports_unsortable_groups() {
        // identical geometry all the way: never separable
        let mut map = PlanarMap::new((16, 16));
        let n1 = map.add_node(p(0.0, 0.0));
        let n2 = map.add_node(p(1.0, 0.0));
        map.add_edge(n1, n2, vec![p(0.0, 0.0), p(1.0, 0.0)], None)
            .expect("edge 1");
        map.add_edge(n1, n2, vec![p(0.0, 0.0), p(1.0, 0.0)], None)
            .expect("edge 2");

        let before: Vec<Vec<DartLabel>> = map.nodes().map(|n| n.darts().to_vec()).collect();
        assert!(matches!(
            map.sort_edges_eventually(2.0, 0.1),
            Err(Error::Unsortable { .. })
        ));
        let after: Vec<Vec<DartLabel>> = map.nodes().map(|n| n.darts().to_vec()).collect();
        assert_eq!(before, after);
    }
}

use core::fmt;

use tm_core::{BoundingBox, Image, LabelLut, Point2d, PointIndex, Polygon};

use crate::cell::{CellLabel, DartLabel, Edge, Face, Node, UNINITIALIZED_LABEL};
use crate::dart::Dart;
use crate::error::{CellKind, Error, Result};
use crate::hooks::MapHook;

/// Planar map over a pixel grid: nodes, edges and faces stored in
/// label-indexed arenas, plus an optional label image kept in sync with the
/// face topology.
///
/// Cells are owned exclusively by the map; callers refer to them by label
/// and must re-check liveness (`node()`/`edge()`/`face()` returning `Some`)
/// after any Euler operation.
pub struct PlanarMap {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) edges: Vec<Option<Edge>>,
    pub(crate) faces: Vec<Option<Face>>,
    pub(crate) node_count: usize,
    pub(crate) edge_count: usize,
    pub(crate) face_count: usize,
    pub(crate) image_size: (usize, usize),
    pub(crate) node_index: PointIndex,
    pub(crate) label_image: Option<Image<i32>>,
    pub(crate) face_label_lut: LabelLut,
    pub(crate) hooks: Vec<Box<dyn MapHook>>,
}

impl PlanarMap {
    pub fn new(image_size: (usize, usize)) -> Self {
        Self {
            nodes: vec![None],
            edges: vec![None],
            faces: Vec::new(),
            node_count: 0,
            edge_count: 0,
            face_count: 0,
            image_size,
            node_index: PointIndex::new(),
            label_image: None,
            face_label_lut: LabelLut::default(),
            hooks: Vec::new(),
        }
    }

    /// Builds a map from parallel 1-based cell lists; entry 0 and `None`
    /// entries leave holes so that input labels are preserved.
    ///
    /// Only populates the cells; run `sort_edges_directly()` (or
    /// `sort_edges_eventually()`), `init_contours()` and `embed_faces()`
    /// afterwards.
    pub fn from_parts(
        node_positions: &[Option<Point2d>],
        edge_defs: &[Option<(CellLabel, CellLabel, Vec<Point2d>)>],
        image_size: (usize, usize),
    ) -> Result<Self> {
        let mut map = Self::new(image_size);

        for slot in node_positions.iter().skip(1) {
            match slot {
                Some(p) => {
                    map.add_node(*p);
                }
                None => map.nodes.push(None),
            }
        }

        for (i, slot) in edge_defs.iter().enumerate().skip(1) {
            match slot {
                Some((start, end, points)) => {
                    map.add_edge(*start, *end, points.clone(), Some(i as CellLabel))?;
                }
                None => map.edges.push(None),
            }
        }

        Ok(map)
    }

    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    // ----- cell access ------------------------------------------------

    pub fn node(&self, label: CellLabel) -> Option<&Node> {
        self.nodes.get(label as usize).and_then(|s| s.as_ref())
    }

    pub fn edge(&self, label: CellLabel) -> Option<&Edge> {
        self.edges.get(label as usize).and_then(|s| s.as_ref())
    }

    pub fn face(&self, label: CellLabel) -> Option<&Face> {
        self.faces.get(label as usize).and_then(|s| s.as_ref())
    }

    pub fn edge_mut(&mut self, label: CellLabel) -> Option<&mut Edge> {
        self.edges.get_mut(label as usize).and_then(|s| s.as_mut())
    }

    pub(crate) fn node_mut(&mut self, label: CellLabel) -> Option<&mut Node> {
        self.nodes.get_mut(label as usize).and_then(|s| s.as_mut())
    }

    pub(crate) fn face_mut(&mut self, label: CellLabel) -> Option<&mut Face> {
        self.faces.get_mut(label as usize).and_then(|s| s.as_mut())
    }

    pub(crate) fn require_node(&self, label: CellLabel) -> Result<&Node> {
        self.node(label).ok_or(Error::InvalidHandle {
            kind: CellKind::Node,
            label,
        })
    }

    pub(crate) fn require_edge(&self, label: CellLabel) -> Result<&Edge> {
        self.edge(label).ok_or(Error::InvalidHandle {
            kind: CellKind::Edge,
            label,
        })
    }

    pub(crate) fn require_face(&self, label: CellLabel) -> Result<&Face> {
        self.face(label).ok_or(Error::InvalidHandle {
            kind: CellKind::Face,
            label,
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|s| s.as_ref())
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(|s| s.as_ref())
    }

    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter().filter_map(|s| s.as_ref())
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Upper bound on node labels (max label + 1), usable as a LUT size.
    pub fn max_node_label(&self) -> usize {
        self.nodes.len()
    }

    /// Upper bound on edge labels (max label + 1), usable as a LUT size.
    pub fn max_edge_label(&self) -> usize {
        self.edges.len()
    }

    /// Upper bound on face labels (max label + 1), usable as a LUT size.
    pub fn max_face_label(&self) -> usize {
        self.faces.len()
    }

    pub fn dart(&self, label: DartLabel) -> Dart<'_> {
        Dart::new(self, label)
    }

    pub fn label_image(&self) -> Option<&Image<i32>> {
        self.label_image.as_ref()
    }

    pub fn face_label_lut(&self) -> &LabelLut {
        &self.face_label_lut
    }

    // ----- construction -----------------------------------------------

    pub fn add_node(&mut self, position: Point2d) -> CellLabel {
        let label = self.nodes.len() as CellLabel;
        self.nodes.push(Some(Node::new(label, position)));
        self.node_count += 1;
        self.node_index.insert(position, label);
        label
    }

    /// Adds an edge between two live nodes. With `label`, the edge table
    /// is grown so the new edge lands in that slot (labels must be handed
    /// out in increasing order).
    pub fn add_edge(
        &mut self,
        start_node: CellLabel,
        end_node: CellLabel,
        points: Vec<Point2d>,
        label: Option<CellLabel>,
    ) -> Result<CellLabel> {
        if let Some(l) = label {
            while self.edges.len() < l as usize {
                self.edges.push(None);
            }
        }
        if points.len() < 2 {
            return Err(Error::precondition(
                "add_edge",
                format!("edge geometry needs at least 2 points, got {}", points.len()),
            ));
        }
        self.require_node(start_node)?;
        self.require_node(end_node)?;

        let label = self.edges.len() as CellLabel;
        self.edges.push(Some(Edge::new(
            label,
            start_node,
            end_node,
            Polygon::from(points),
        )));
        self.edge_count += 1;

        let dart = label as DartLabel;
        self.node_mut(start_node).expect("checked above").darts.push(dart);
        self.node_mut(end_node).expect("checked above").darts.push(-dart);
        Ok(label)
    }

    /// Moves a node, re-indexing it and pinning the endpoints of all
    /// incident edge polylines to the new position.
    pub fn set_node_position(&mut self, label: CellLabel, position: Point2d) -> Result<()> {
        let (old, darts) = {
            let n = self.require_node(label)?;
            (n.position, n.darts.clone())
        };
        self.node_index.remove(old, label);
        self.node_index.insert(position, label);
        self.node_mut(label).expect("checked above").position = position;
        for d in darts {
            let edge = self
                .edge_mut(d.unsigned_abs())
                .ok_or(Error::DanglingDart { dart: d })?;
            if d > 0 {
                edge.points.set(0, position);
            } else {
                let last = edge.points.len() - 1;
                edge.points.set(last, position);
            }
        }
        Ok(())
    }

    // ----- queries ----------------------------------------------------

    pub fn nearest_node(&self, position: Point2d, max_squared_dist: f64) -> Option<&Node> {
        let (_, label) = self.node_index.nearest(position, max_squared_dist)?;
        self.node(label)
    }

    /// Face containing the given point: label image lookup where
    /// available, else a linear `face_contains` scan, falling back to the
    /// infinite face.
    pub fn face_at(&self, position: Point2d) -> Result<CellLabel> {
        if let Some(img) = &self.label_image {
            let (x, y) = pixel_of(position);
            if img.is_inside(x, y) {
                let v = *img.get(x as usize, y as usize).expect("bounds checked");
                if v > 0 {
                    return Ok(self.face_label_lut.get(v as CellLabel));
                }
            }
        }
        for face in self.faces() {
            if face.label() != 0 && self.face_contains(face.label(), position)? {
                return Ok(face.label());
            }
        }
        self.require_face(0)?;
        Ok(0)
    }

    pub fn face_contains(&self, label: CellLabel, position: Point2d) -> Result<bool> {
        let face = self.require_face(label)?;
        if let Some(img) = &self.label_image {
            let (x, y) = pixel_of(position);
            if img.is_inside(x, y) {
                let v = *img.get(x as usize, y as usize).expect("bounds checked");
                if v > 0 && self.face_label_lut.get(v as CellLabel) == label {
                    return Ok(true);
                }
            }
        }

        let mut holes = face.anchors.as_slice();
        if label != 0 {
            let Some((&outer, rest)) = face.anchors.split_first() else {
                return Err(Error::invariant(format!("face {label} has no anchors")));
            };
            if !self.face_bounding_box(label)?.contains(position) {
                return Ok(false);
            }
            if !self.contour_poly(outer)?.contains(position) {
                return Ok(false);
            }
            holes = rest;
        }
        for &a in holes {
            if self.contour_poly(a)?.contains(position) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Face area: the sum of all its boundary components' contour areas.
    /// Cached until the next merge touching this face.
    pub fn face_area(&self, label: CellLabel) -> Result<f64> {
        let face = self.require_face(label)?;
        if let Some(a) = face.area.get() {
            return Ok(a);
        }
        let mut area = 0.0;
        for &a in &face.anchors {
            area += self.contour_area(a)?;
        }
        face.area.set(Some(area));
        Ok(area)
    }

    /// Bounding box of the face's exterior contour. The infinite face has
    /// none.
    pub fn face_bounding_box(&self, label: CellLabel) -> Result<BoundingBox> {
        if label == 0 {
            return Err(Error::precondition(
                "face_bounding_box",
                "the infinite face has no bounding box",
            ));
        }
        let face = self.require_face(label)?;
        if let Some(bb) = face.bbox.get() {
            return Ok(bb);
        }
        let Some(&anchor) = face.anchors.first() else {
            return Err(Error::invariant(format!("face {label} has no anchors")));
        };
        let mut bb = BoundingBox::EMPTY;
        let mut d = anchor;
        let mut guard = self.orbit_guard();
        loop {
            bb.merge(&self.dart_edge(d)?.bounding_box());
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
        face.bbox.set(Some(bb));
        Ok(bb)
    }

    // ----- dart navigation primitives ---------------------------------

    pub(crate) fn dart_edge(&self, dart: DartLabel) -> Result<&Edge> {
        self.edge(dart.unsigned_abs())
            .ok_or(Error::DanglingDart { dart })
    }

    pub(crate) fn dart_start_node_label(&self, dart: DartLabel) -> Result<CellLabel> {
        let e = self.dart_edge(dart)?;
        Ok(if dart > 0 { e.start_node } else { e.end_node })
    }

    pub(crate) fn dart_end_node_label(&self, dart: DartLabel) -> Result<CellLabel> {
        self.dart_start_node_label(-dart)
    }

    pub(crate) fn dart_left_face_label(&self, dart: DartLabel) -> Result<CellLabel> {
        let e = self.dart_edge(dart)?;
        Ok(if dart > 0 { e.left_face } else { e.right_face })
    }

    pub(crate) fn dart_right_face_label(&self, dart: DartLabel) -> Result<CellLabel> {
        self.dart_left_face_label(-dart)
    }

    pub(crate) fn set_dart_left_face_label(
        &mut self,
        dart: DartLabel,
        label: CellLabel,
    ) -> Result<()> {
        let e = self
            .edge_mut(dart.unsigned_abs())
            .ok_or(Error::DanglingDart { dart })?;
        if dart > 0 {
            e.left_face = label;
        } else {
            e.right_face = label;
        }
        Ok(())
    }

    /// Rotates `times` positions within the start node's dart ring.
    pub(crate) fn sigma_rotate(&self, dart: DartLabel, times: i64) -> Result<DartLabel> {
        let node = self.require_node(self.dart_start_node_label(dart)?)?;
        let ring = &node.darts;
        let i = ring.iter().position(|&d| d == dart).ok_or_else(|| {
            Error::invariant(format!(
                "dart {dart} not attached to its start node {}",
                node.label
            ))
        })?;
        let n = ring.len() as i64;
        let mut j = (i as i64 + times) % n;
        if j < 0 {
            j += n;
        }
        Ok(ring[j as usize])
    }

    pub(crate) fn sigma_next(&self, dart: DartLabel) -> Result<DartLabel> {
        self.sigma_rotate(dart, 1)
    }

    pub(crate) fn sigma_prev(&self, dart: DartLabel) -> Result<DartLabel> {
        self.sigma_rotate(dart, -1)
    }

    /// One step forward along the face contour left of the dart.
    pub(crate) fn phi_next(&self, dart: DartLabel) -> Result<DartLabel> {
        self.sigma_prev(-dart)
    }

    pub(crate) fn phi_prev(&self, dart: DartLabel) -> Result<DartLabel> {
        Ok(-self.sigma_next(dart)?)
    }

    /// Iteration bound for orbit walks; exceeded only on broken maps.
    pub(crate) fn orbit_guard(&self) -> usize {
        2 * self.edges.len() + 2
    }

    /// First two polyline points in dart direction.
    pub(crate) fn dart_first_segment(&self, dart: DartLabel) -> Result<(Point2d, Point2d)> {
        let points = &self.dart_edge(dart)?.points;
        let n = points.len();
        if dart > 0 {
            Ok((points[0], points[1]))
        } else {
            Ok((points[n - 1], points[n - 2]))
        }
    }

    /// Polyline points in dart direction, as an owned list.
    pub(crate) fn dart_polyline(&self, dart: DartLabel) -> Result<Vec<Point2d>> {
        let points = self.dart_edge(dart)?.points.points();
        let mut out: Vec<Point2d> = points.to_vec();
        if dart < 0 {
            out.reverse();
        }
        Ok(out)
    }

    // ----- contours ---------------------------------------------------

    /// Area of the contour through `dart`'s phi orbit; bridges contribute
    /// nothing.
    pub fn contour_area(&self, dart: DartLabel) -> Result<f64> {
        let mut area = 0.0;
        let mut d = dart;
        let mut guard = self.orbit_guard();
        loop {
            let e = self.dart_edge(d)?;
            if !e.is_bridge() {
                let pa = e.partial_area();
                area += if d > 0 { pa } else { -pa };
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
        Ok(area)
    }

    /// Polygon traced along `dart`'s phi orbit once.
    pub fn contour_poly(&self, dart: DartLabel) -> Result<Polygon> {
        let mut poly = Polygon::new();
        let mut d = dart;
        let mut guard = self.orbit_guard();
        loop {
            let e = self.dart_edge(d)?;
            if d > 0 {
                poly.extend(&e.points);
            } else {
                let mut rev = e.points.clone();
                rev.reverse();
                poly.extend(&rev);
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
        Ok(poly)
    }

    /// Index of the boundary component of `face` that contains `dart`:
    /// first by anchor identity, then by forward phi search.
    pub(crate) fn find_component_anchor(
        &self,
        face: CellLabel,
        dart: DartLabel,
    ) -> Result<usize> {
        let f = self.require_face(face)?;
        if let Some(i) = f.anchors.iter().position(|&a| a == dart) {
            return Ok(i);
        }
        for (i, &anchor) in f.anchors.iter().enumerate() {
            let mut d = anchor;
            let mut guard = self.orbit_guard();
            loop {
                d = self.phi_next(d)?;
                if d == anchor {
                    break;
                }
                if d == dart {
                    return Ok(i);
                }
                guard -= 1;
                if guard == 0 {
                    return Err(Error::invariant(format!(
                        "phi orbit of dart {anchor} does not close"
                    )));
                }
            }
        }
        Err(Error::invariant(format!(
            "dart {dart} not found in the contours of face {face}"
        )))
    }

    // ----- cell teardown ----------------------------------------------

    pub(crate) fn uninitialize_node(&mut self, label: CellLabel) {
        if let Some(node) = self.nodes[label as usize].take() {
            self.node_count -= 1;
            self.node_index.remove(node.position, label);
        }
    }

    pub(crate) fn uninitialize_edge(&mut self, label: CellLabel) {
        if self.edges[label as usize].take().is_some() {
            self.edge_count -= 1;
        }
    }

    pub(crate) fn uninitialize_face(&mut self, label: CellLabel) {
        if self.faces[label as usize].take().is_some() {
            self.face_count -= 1;
        }
    }

    pub(crate) fn detach_dart(&mut self, node: CellLabel, dart: DartLabel) -> Result<()> {
        let n = self.node_mut(node).ok_or(Error::InvalidHandle {
            kind: CellKind::Node,
            label: node,
        })?;
        let i = n.darts.iter().position(|&d| d == dart).ok_or_else(|| {
            Error::invariant(format!("dart {dart} not found in ring of node {node}"))
        })?;
        n.darts.remove(i);
        Ok(())
    }

    // ----- consistency ------------------------------------------------

    /// Full invariant audit; `false` on the first violation found.
    pub fn check_consistency(&self) -> bool {
        if self.node_count != self.nodes().count()
            || self.edge_count != self.edges().count()
            || self.face_count != self.faces().count()
        {
            return false;
        }
        if self.node_index.len() != self.node_count {
            return false;
        }

        // sigma rings vs. edge endpoints
        let mut degree_sum = 0usize;
        for node in self.nodes() {
            degree_sum += node.degree();
            let mut seen = std::collections::HashSet::new();
            for &d in &node.darts {
                if !seen.insert(d) {
                    return false;
                }
                let Some(edge) = self.edge(d.unsigned_abs()) else {
                    return false;
                };
                let attached = if d > 0 {
                    edge.start_node == node.label
                } else {
                    edge.end_node == node.label
                };
                if !attached {
                    return false;
                }
            }
        }
        if degree_sum != 2 * self.edge_count {
            return false;
        }

        // edge endpoint pinning and face liveness
        for edge in self.edges() {
            if edge.points.len() < 2 {
                return false;
            }
            let (Some(start), Some(end)) = (self.node(edge.start_node), self.node(edge.end_node))
            else {
                return false;
            };
            if edge.points.first() != Some(start.position) || edge.points.last() != Some(end.position)
            {
                return false;
            }
            if !self.faces.is_empty()
                && edge.left_face != UNINITIALIZED_LABEL
                && (self.face(edge.left_face).is_none() || self.face(edge.right_face).is_none())
            {
                return false;
            }
        }

        // face contours: closed phi orbits, consistent left labels,
        // pairwise distinct components
        for face in self.faces() {
            let mut visited = std::collections::HashSet::new();
            for &anchor in &face.anchors {
                let mut d = anchor;
                let mut guard = self.orbit_guard();
                loop {
                    if !visited.insert(d) {
                        return false;
                    }
                    match self.dart_left_face_label(d) {
                        Ok(l) if l == face.label => {}
                        _ => return false,
                    }
                    match self.phi_next(d) {
                        Ok(next) => d = next,
                        Err(_) => return false,
                    }
                    if d == anchor {
                        break;
                    }
                    guard -= 1;
                    if guard == 0 {
                        return false;
                    }
                }
            }
        }

        // label LUT resolves to live faces
        if self.label_image.is_some() {
            for l in 0..self.face_label_lut.len() as CellLabel {
                if self.face(self.face_label_lut.get(l)).is_none() {
                    return false;
                }
            }
        }

        true
    }
}

impl Clone for PlanarMap {
    /// Deep copy of all cell state. Hooks are observers of one live map
    /// and are not carried into snapshots.
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            faces: self.faces.clone(),
            node_count: self.node_count,
            edge_count: self.edge_count,
            face_count: self.face_count,
            image_size: self.image_size,
            node_index: self.node_index.clone(),
            label_image: self.label_image.clone(),
            face_label_lut: self.face_label_lut.clone(),
            hooks: Vec::new(),
        }
    }
}

impl fmt::Debug for PlanarMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanarMap")
            .field("node_count", &self.node_count)
            .field("edge_count", &self.edge_count)
            .field("face_count", &self.face_count)
            .field("image_size", &self.image_size)
            .field("has_label_image", &self.label_image.is_some())
            .finish()
    }
}

pub(crate) fn pixel_of(p: Point2d) -> (i64, i64) {
    ((p.x + 0.5).floor() as i64, (p.y + 0.5).floor() as i64)
}

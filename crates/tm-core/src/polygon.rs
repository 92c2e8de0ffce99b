use std::cell::Cell;

use crate::{BoundingBox, Point2d};

/// Ordered point sequence with lazily cached bounding box and signed
/// partial area.
///
/// The partial area is ½ Σ (xᵢ·yᵢ₊₁ − xᵢ₊₁·yᵢ) over consecutive point
/// pairs, *without* closing the sequence; the area of a closed contour is
/// obtained by summing the partial areas of all its pieces.
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    points: Vec<Point2d>,
    bbox: Cell<Option<BoundingBox>>,
    partial_area: Cell<Option<f64>>,
}

impl Polygon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    pub fn first(&self) -> Option<Point2d> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point2d> {
        self.points.last().copied()
    }

    pub fn push(&mut self, p: Point2d) {
        self.points.push(p);
        self.invalidate();
    }

    /// Replaces the point at `index`, invalidating the caches.
    pub fn set(&mut self, index: usize, p: Point2d) {
        self.points[index] = p;
        self.invalidate();
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
        // bbox is direction independent
        if let Some(a) = self.partial_area.get() {
            self.partial_area.set(Some(-a));
        }
    }

    /// Appends `other`'s points. A leading point equal to our trailing
    /// point is skipped so that chained pieces do not duplicate joints.
    pub fn extend(&mut self, other: &Polygon) {
        let mut rest = other.points.as_slice();
        if let (Some(last), Some(first)) = (self.last(), other.first())
            && last == first
        {
            rest = &rest[1..];
        }
        self.points.extend_from_slice(rest);
        self.invalidate();
    }

    pub fn partial_area(&self) -> f64 {
        if let Some(a) = self.partial_area.get() {
            return a;
        }
        let mut a = 0.0;
        for w in self.points.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a *= 0.5;
        self.partial_area.set(Some(a));
        a
    }

    pub fn bounding_box(&self) -> BoundingBox {
        if let Some(bb) = self.bbox.get() {
            return bb;
        }
        let bb = BoundingBox::from_points(self.points.iter().copied());
        self.bbox.set(Some(bb));
        bb
    }

    /// Even-odd point-in-polygon test, treating the sequence as closed.
    pub fn contains(&self, p: Point2d) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    pub fn arc_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .sum()
    }

    fn invalidate(&mut self) {
        self.bbox.set(None);
        self.partial_area.set(None);
    }
}

impl From<Vec<Point2d>> for Polygon {
    fn from(points: Vec<Point2d>) -> Self {
        Self {
            points,
            bbox: Cell::new(None),
            partial_area: Cell::new(None),
        }
    }
}

impl std::ops::Index<usize> for Polygon {
    type Output = Point2d;

    fn index(&self, index: usize) -> &Point2d {
        &self.points[index]
    }
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

#[cfg(test)]
mod tests {
    use super::Polygon;
    use crate::Point2d;

    fn poly(points: &[(f64, f64)]) -> Polygon {
        Polygon::from(
            points
                .iter()
                .map(|&(x, y)| Point2d::new(x, y))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn partial_area_of_open_chain() {
        // Three sides of the unit square; closing edge contributes nothing
        // here, the partial sum is what counts.
        let p = poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!((p.partial_area() - 1.0).abs() < 1e-12);

        let mut r = p.clone();
        r.reverse();
        assert!((r.partial_area() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn extend_skips_duplicate_joint() {
        let mut a = poly(&[(0.0, 0.0), (5.0, 0.0)]);
        let b = poly(&[(5.0, 0.0), (10.0, 0.0)]);
        a.extend(&b);
        assert_eq!(
            a.points(),
            &[
                Point2d::new(0.0, 0.0),
                Point2d::new(5.0, 0.0),
                Point2d::new(10.0, 0.0)
            ]
        );
    }

    #[test]
    fn caches_invalidate_on_mutation() {
        let mut p = poly(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)]);
        let bb = p.bounding_box();
        assert_eq!(bb.max, Point2d::new(2.0, 2.0));
        p.push(Point2d::new(-1.0, 3.0));
        let bb = p.bounding_box();
        assert_eq!(bb.min, Point2d::new(-1.0, 0.0));
        assert_eq!(bb.max, Point2d::new(2.0, 3.0));
    }

    #[test]
    fn contains_even_odd() {
        let square = poly(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        assert!(square.contains(Point2d::new(2.0, 2.0)));
        assert!(!square.contains(Point2d::new(5.0, 2.0)));
        assert!(!square.contains(Point2d::new(-1.0, -1.0)));
    }

    #[test]
    fn arc_length_sums_segments() {
        let p = poly(&[(0.0, 0.0), (3.0, 4.0), (3.0, 8.0)]);
        assert!((p.arc_length() - 9.0).abs() < 1e-12);
    }
}

use std::collections::BTreeMap;

use crate::Point2d;

/// Total-order key over f64 for the index's BTreeMap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct XKey(f64);

impl Eq for XKey {}

impl Ord for XKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for XKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered 2-D point index keyed on the x coordinate.
///
/// `nearest` walks outward from the query's x in both directions and prunes
/// a direction as soon as the x distance alone exceeds the best squared
/// distance found so far. Payloads are opaque `u32` labels.
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    columns: BTreeMap<XKey, Vec<(Point2d, u32)>>,
    len: usize,
}

impl PointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, p: Point2d, payload: u32) {
        self.columns.entry(XKey(p.x)).or_default().push((p, payload));
        self.len += 1;
    }

    /// Removes the entry with exactly this position and payload.
    pub fn remove(&mut self, p: Point2d, payload: u32) -> bool {
        let key = XKey(p.x);
        let Some(col) = self.columns.get_mut(&key) else {
            return false;
        };
        let Some(at) = col.iter().position(|&(q, l)| q == p && l == payload) else {
            return false;
        };
        col.swap_remove(at);
        if col.is_empty() {
            self.columns.remove(&key);
        }
        self.len -= 1;
        true
    }

    /// Nearest entry with squared distance strictly below
    /// `max_squared_dist`.
    pub fn nearest(&self, q: Point2d, max_squared_dist: f64) -> Option<(Point2d, u32)> {
        let mut best: Option<(Point2d, u32)> = None;
        let mut best_dist = max_squared_dist;

        for (&XKey(x), col) in self.columns.range(XKey(q.x)..) {
            let dx = x - q.x;
            if dx * dx > best_dist {
                break;
            }
            for &(p, payload) in col {
                let d2 = q.squared_dist(p);
                if d2 < best_dist {
                    best = Some((p, payload));
                    best_dist = d2;
                }
            }
        }

        for (&XKey(x), col) in self.columns.range(..XKey(q.x)).rev() {
            let dx = q.x - x;
            if dx * dx > best_dist {
                break;
            }
            for &(p, payload) in col {
                let d2 = q.squared_dist(p);
                if d2 < best_dist {
                    best = Some((p, payload));
                    best_dist = d2;
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::PointIndex;
    use crate::Point2d;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    #[test]
    fn nearest_prefers_smallest_distance() {
        let mut idx = PointIndex::new();
        idx.insert(p(0.0, 0.0), 1);
        idx.insert(p(10.0, 0.0), 2);
        idx.insert(p(5.0, 8.0), 3);

        assert_eq!(idx.nearest(p(9.0, 1.0), f64::MAX), Some((p(10.0, 0.0), 2)));
        assert_eq!(idx.nearest(p(1.0, 1.0), f64::MAX), Some((p(0.0, 0.0), 1)));
        assert_eq!(idx.nearest(p(5.0, 7.0), f64::MAX), Some((p(5.0, 8.0), 3)));
    }

    #[test]
    fn nearest_respects_radius() {
        let mut idx = PointIndex::new();
        idx.insert(p(0.0, 0.0), 1);
        // squared distance is exactly 4.0; the bound is exclusive
        assert_eq!(idx.nearest(p(2.0, 0.0), 4.0), None);
        assert_eq!(idx.nearest(p(2.0, 0.0), 4.0 + 1e-9), Some((p(0.0, 0.0), 1)));
    }

    #[test]
    fn nearest_prunes_by_x_but_scans_both_sides() {
        let mut idx = PointIndex::new();
        idx.insert(p(-3.0, 0.0), 1);
        idx.insert(p(2.0, 50.0), 2);
        // closer in x but far in y; the left point wins
        assert_eq!(idx.nearest(p(0.0, 0.0), f64::MAX), Some((p(-3.0, 0.0), 1)));
    }

    #[test]
    fn remove_is_exact() {
        let mut idx = PointIndex::new();
        idx.insert(p(1.0, 2.0), 7);
        idx.insert(p(1.0, 3.0), 8);
        assert!(!idx.remove(p(1.0, 2.0), 8));
        assert!(idx.remove(p(1.0, 2.0), 7));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.nearest(p(1.0, 2.0), f64::MAX), Some((p(1.0, 3.0), 8)));
    }
}

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Location in pixel-center coordinates: node positions, polyline
/// vertices, label image probes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

/// Displacement between two points: edge tangents, contour steps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn squared_dist(self, other: Self) -> f64 {
        (other - self).squared_norm()
    }
}

impl Vec2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// z-component of the 3-D cross product; twice the signed area of the
    /// triangle spanned by the two vectors. Polyline partial areas and
    /// contour orientation checks are sums of these.
    pub fn cross(self, rhs: Self) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn squared_norm(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.squared_norm().sqrt()
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n > 0.0 { self / n } else { Self::default() }
    }
}

impl Add<Vec2d> for Point2d {
    type Output = Point2d;

    fn add(self, rhs: Vec2d) -> Point2d {
        Point2d::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<Vec2d> for Point2d {
    type Output = Point2d;

    fn sub(self, rhs: Vec2d) -> Point2d {
        self + -rhs
    }
}

impl Sub<Point2d> for Point2d {
    type Output = Vec2d;

    fn sub(self, rhs: Point2d) -> Vec2d {
        Vec2d::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add for Vec2d {
    type Output = Vec2d;

    fn add(self, rhs: Vec2d) -> Vec2d {
        Vec2d::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2d {
    fn add_assign(&mut self, rhs: Vec2d) {
        *self = *self + rhs;
    }
}

impl Sub for Vec2d {
    type Output = Vec2d;

    fn sub(self, rhs: Vec2d) -> Vec2d {
        self + -rhs
    }
}

impl Neg for Vec2d {
    type Output = Vec2d;

    fn neg(self) -> Vec2d {
        Vec2d::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vec2d {
    type Output = Vec2d;

    fn mul(self, rhs: f64) -> Vec2d {
        Vec2d::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2d> for f64 {
    type Output = Vec2d;

    fn mul(self, rhs: Vec2d) -> Vec2d {
        Vec2d::new(self * rhs.x, self * rhs.y)
    }
}

impl Div<f64> for Vec2d {
    type Output = Vec2d;

    fn div(self, rhs: f64) -> Vec2d {
        self * (1.0 / rhs)
    }
}

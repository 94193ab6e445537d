// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Analytic primitives: lines, planes, segments and spheres.
//!
//! Lines in the plane and planes in space are stored by the coefficients of
//! their implicit equation (`ax + by + c = 0`, `ax + by + cz + d = 0`). The
//! side of a point is the sign of that equation, so the normal `(a, b)` or
//! `(a, b, c)` points to the positive side.

use serde::{Deserialize, Serialize};

use crate::vector::{Point2, Point3, Vector2, Vector3};

/// An infinite line `ax + by + c = 0`.
///
/// The direction is `(b, -a)`, so the normal `(a, b)` points to the left of
/// the direction of travel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Line2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line2 {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Line through `p` heading towards `q`.
    pub fn through(p: Point2, q: Point2) -> Self {
        let a = p.y - q.y;
        let b = q.x - p.x;
        let c = -a * p.x - b * p.y;
        Self { a, b, c }
    }

    /// Line through `p` with direction `dir`.
    pub fn from_point_dir(p: Point2, dir: Vector2) -> Self {
        let a = -dir.y;
        let b = dir.x;
        let c = -a * p.x - b * p.y;
        Self { a, b, c }
    }

    pub fn direction(&self) -> Vector2 {
        Vector2::new(self.b, -self.a)
    }

    pub fn normal(&self) -> Vector2 {
        Vector2::new(self.a, self.b)
    }

    /// A point on the line: the crossing with the y axis, or with the x axis
    /// for vertical lines.
    pub fn point(&self) -> Point2 {
        if self.b != 0.0 {
            Point2::new(0.0, -self.c / self.b)
        } else {
            Point2::new(-self.c / self.a, 0.0)
        }
    }

    /// Value of the implicit equation at `p`.
    pub fn eval(&self, p: Point2) -> f64 {
        self.a * p.x + self.b * p.y + self.c
    }
}

impl PartialEq for Line2 {
    /// Coefficient-wise equality, or equality of the normalised equations.
    fn eq(&self, other: &Line2) -> bool {
        if self.a == other.a && self.b == other.b && self.c == other.c {
            return true;
        }
        let len_self = self.normal().length();
        let len_other = other.normal().length();
        if len_self == 0.0 || len_other == 0.0 {
            return false;
        }
        self.a / len_self == other.a / len_other
            && self.b / len_self == other.b / len_other
            && self.c / len_self == other.c / len_other
    }
}

/// An infinite line in space given by a point and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3 {
    pub point: Point3,
    pub direction: Vector3,
}

impl Line3 {
    pub const fn new(point: Point3, direction: Vector3) -> Self {
        Self { point, direction }
    }

    /// Line through `p` heading towards `q`.
    pub fn through(p: Point3, q: Point3) -> Self {
        Self {
            point: p,
            direction: q - p,
        }
    }

    /// `point + direction * t`.
    pub fn at(&self, t: f64) -> Point3 {
        self.point + self.direction * t
    }
}

/// A plane `ax + by + cz + d = 0` whose normal `(a, b, c)` points to the
/// positive side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane3 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Plane3 {
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Plane through three points, oriented counter-clockwise when viewed
    /// from the positive side.
    pub fn from_points(p1: Point3, p2: Point3, p3: Point3) -> Self {
        let n = (p2 - p1).cross(p3 - p1);
        Self::from_point_normal(p1, n)
    }

    pub fn from_point_normal(p: Point3, n: Vector3) -> Self {
        Self {
            a: n.x,
            b: n.y,
            c: n.z,
            d: -n.dot(p.to_vector()),
        }
    }

    pub fn normal(&self) -> Vector3 {
        Vector3::new(self.a, self.b, self.c)
    }

    /// A point on the plane, solved for z, then y, then x.
    pub fn point(&self) -> Point3 {
        if self.c != 0.0 {
            Point3::new(0.0, 0.0, -self.d / self.c)
        } else if self.b != 0.0 {
            Point3::new(0.0, -self.d / self.b, 0.0)
        } else {
            Point3::new(-self.d / self.a, 0.0, 0.0)
        }
    }

    /// Value of the implicit equation at `p`.
    pub fn eval(&self, p: Point3) -> f64 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }
}

/// A directed segment in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment2 {
    pub src: Point2,
    pub dst: Point2,
}

impl Segment2 {
    pub const fn new(src: Point2, dst: Point2) -> Self {
        Self { src, dst }
    }

    pub fn line(&self) -> Line2 {
        Line2::through(self.src, self.dst)
    }

    pub fn length(&self) -> f64 {
        (self.dst - self.src).length()
    }
}

/// A directed segment in space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment3 {
    pub src: Point3,
    pub dst: Point3,
}

impl Segment3 {
    pub const fn new(src: Point3, dst: Point3) -> Self {
        Self { src, dst }
    }

    pub fn line(&self) -> Line3 {
        Line3::through(self.src, self.dst)
    }

    pub fn length(&self) -> f64 {
        (self.dst - self.src).length()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere3 {
    pub center: Point3,
    pub radius: f64,
}

impl Sphere3 {
    pub const fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_through_points_keeps_direction() {
        let l = Line2::through(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0));
        assert_eq!(l.direction(), Vector2::new(2.0, 0.0));
        // left of the direction is the positive side
        assert!(l.eval(Point2::new(1.0, 1.0)) > 0.0);
    }

    #[test]
    fn scaled_lines_are_equal() {
        let l1 = Line2::new(0.0, 1.0, -2.0);
        let l2 = Line2::new(0.0, 4.0, -8.0);
        assert_eq!(l1, l2);
        assert_ne!(l1, Line2::new(0.0, -1.0, 2.0));
    }

    #[test]
    fn vertical_line_point() {
        let l = Line2::through(Point2::new(3.0, 0.0), Point2::new(3.0, 5.0));
        assert_eq!(l.point(), Point2::new(3.0, 0.0));
    }

    #[test]
    fn plane_from_points_is_ccw() {
        let p = Plane3::from_points(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        );
        assert_eq!(p.normal(), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(p.point(), Point3::new(0.0, 0.0, 1.0));
        assert_eq!(p.eval(Point3::new(5.0, 5.0, 1.0)), 0.0);
    }

    #[test]
    fn plane_point_falls_back_to_y_then_x() {
        assert_eq!(Plane3::new(0.0, 2.0, 0.0, -4.0).point(), Point3::new(0.0, 2.0, 0.0));
        assert_eq!(Plane3::new(1.0, 0.0, 0.0, 3.0).point(), Point3::new(-3.0, 0.0, 0.0));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed-form kernel backend.
//!
//! Every predicate is evaluated with explicit formulas (Cramer's rule,
//! Rodrigues' rotation matrix) on plain `f64` arithmetic.

use crate::kernel::Kernel;
use crate::primitives::{Line2, Line3, Plane3};
use crate::vector::{Point2, Point3, Vector2, Vector3};

/// The from-scratch analytic kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analytic;

/// Indices of the two remaining axes in cyclic order after `k`.
fn cyclic_axes(k: usize) -> (usize, usize) {
    match k {
        0 => (1, 2),
        1 => (2, 0),
        _ => (0, 1),
    }
}

impl Kernel for Analytic {
    fn intersect_lines(l1: &Line2, l2: &Line2) -> Option<Point2> {
        if l1 == l2 {
            return None;
        }
        let det = l1.a * l2.b - l2.a * l1.b;
        if det == 0.0 {
            return None;
        }
        let x = (l1.b * l2.c - l1.c * l2.b) / det;
        let y = (l1.c * l2.a - l2.c * l1.a) / det;
        Some(Point2::new(x, y))
    }

    fn intersect_planes3(p1: &Plane3, p2: &Plane3, p3: &Plane3) -> Option<Point3> {
        let n1 = p1.normal();
        let n2 = p2.normal();
        let n3 = p3.normal();
        let n23 = n2.cross(n3);
        let det = n1.dot(n23);
        if det == 0.0 {
            return None;
        }
        let n31 = n3.cross(n1);
        let n12 = n1.cross(n2);
        let v = (n23 * -p1.d + n31 * -p2.d + n12 * -p3.d) / det;
        Some(Point3::new(v.x, v.y, v.z))
    }

    fn intersect_planes(p1: &Plane3, p2: &Plane3) -> Option<Line3> {
        let n1 = p1.normal();
        let n2 = p2.normal();
        let dir = n1.cross(n2);
        if dir.squared_length() == 0.0 {
            return None;
        }
        // zero the dominant axis of the direction and solve the 2x2 system
        let k = dir.largest_axis();
        let (i, j) = cyclic_axes(k);
        let det = dir[k];
        let mut coords = [0.0; 3];
        coords[i] = (-p1.d * n2[j] + p2.d * n1[j]) / det;
        coords[j] = (-n1[i] * p2.d + n2[i] * p1.d) / det;
        let point = Point3::new(coords[0], coords[1], coords[2]);
        Some(Line3::new(point, dir))
    }

    fn intersect_plane_line(plane: &Plane3, line: &Line3) -> Option<Point3> {
        let n = plane.normal();
        let denom = n.dot(line.direction);
        if denom == 0.0 {
            return None;
        }
        let lambda = -(n.dot(line.point.to_vector()) + plane.d) / denom;
        Some(line.at(lambda))
    }

    fn distance_points2(p: Point2, q: Point2) -> f64 {
        (q - p).length()
    }

    fn distance_points3(p: Point3, q: Point3) -> f64 {
        (q - p).length()
    }

    fn distance_line_point(line: &Line2, p: Point2) -> f64 {
        line.eval(p).abs() / line.normal().length()
    }

    fn distance_plane_point(plane: &Plane3, p: Point3) -> f64 {
        plane.eval(p).abs() / plane.normal().length()
    }

    fn distance_line3_point(line: &Line3, p: Point3) -> f64 {
        let len = line.direction.length();
        if len == 0.0 {
            return Self::distance_points3(line.point, p);
        }
        let p1 = line.point;
        let p2 = line.point + line.direction;
        (p - p1).cross(p - p2).length() / len
    }

    fn project_line(line: &Line2, p: Point2) -> Point2 {
        let n = Self::normalize2(line.normal());
        let dist = (p - line.point()).dot(n);
        p - n * dist
    }

    fn project_plane(plane: &Plane3, p: Point3) -> Point3 {
        let n = Self::normalize3(plane.normal());
        let dist = (p - plane.point()).dot(n);
        p - n * dist
    }

    fn project_line3(line: &Line3, p: Point3) -> Point3 {
        let d = Self::normalize3(line.direction);
        line.point + d * (p - line.point).dot(d)
    }

    fn angle2(v1: Vector2, v2: Vector2) -> f64 {
        let arg = v1.dot(v2) / (v1.squared_length() * v2.squared_length()).sqrt();
        clamped_acos(arg)
    }

    fn angle3(v1: Vector3, v2: Vector3) -> f64 {
        let arg = v1.dot(v2) / (v1.squared_length() * v2.squared_length()).sqrt();
        clamped_acos(arg)
    }

    fn rotate_vector(v: Vector3, axis: Vector3, angle: f64) -> Vector3 {
        if axis.squared_length() == 0.0 {
            return v;
        }
        let n = Self::normalize3(axis);
        let (sin, cos) = angle.sin_cos();
        let t = 1.0 - cos;
        let rows = [
            [
                n.x * n.x * t + cos,
                n.x * n.y * t - n.z * sin,
                n.x * n.z * t + n.y * sin,
            ],
            [
                n.y * n.x * t + n.z * sin,
                n.y * n.y * t + cos,
                n.y * n.z * t - n.x * sin,
            ],
            [
                n.z * n.x * t - n.y * sin,
                n.z * n.y * t + n.x * sin,
                n.z * n.z * t + cos,
            ],
        ];
        let apply = |r: [f64; 3]| r[0] * v.x + r[1] * v.y + r[2] * v.z;
        Vector3::new(apply(rows[0]), apply(rows[1]), apply(rows[2]))
    }

    fn normalize2(v: Vector2) -> Vector2 {
        let len = v.length();
        if len == 0.0 {
            v
        } else {
            v / len
        }
    }

    fn normalize3(v: Vector3) -> Vector3 {
        let len = v.length();
        if len == 0.0 {
            v
        } else {
            v / len
        }
    }
}

/// `acos` with the argument clamped to `[-1, 1]`.
///
/// NaN arguments (zero-length vectors) fall through to `acos` and stay NaN.
pub(crate) fn clamped_acos(arg: f64) -> f64 {
    if arg <= -1.0 {
        std::f64::consts::PI
    } else if arg >= 1.0 {
        0.0
    } else {
        arg.acos()
    }
}

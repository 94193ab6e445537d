// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The predicate interface shared by every kernel backend.
//!
//! A backend implements the numeric core (intersections, distances,
//! projections, angles, rotation, normalisation). Everything built on top of
//! that core is provided here once, so both backends share the same control
//! flow and differ only in how the core is evaluated.
//!
//! Degenerate configurations (parallel or coincident primitives, zero-length
//! vectors) produce `None`; predicates never panic on geometry.

use std::f64::consts::FRAC_PI_2;

use crate::primitives::{Line2, Line3, Plane3, Sphere3};
use crate::vector::{Point2, Point3, Vector2, Vector3};

/// Sign of `value` as `-1`, `0` or `1`. Exact: no tolerance.
#[inline]
pub fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Geometric predicates over the primitive types.
///
/// All methods are associated functions; a backend is a zero-sized marker
/// type selected at build time (see [`crate::ActiveKernel`]).
pub trait Kernel {
    // --- Intersection ---

    /// Intersection point of two lines. `None` for identical or parallel
    /// lines (exact determinant test).
    fn intersect_lines(l1: &Line2, l2: &Line2) -> Option<Point2>;

    /// Common point of three planes. `None` when the determinant is zero.
    fn intersect_planes3(p1: &Plane3, p2: &Plane3, p3: &Plane3) -> Option<Point3>;

    /// Line shared by two planes, directed along `n1 × n2`.
    fn intersect_planes(p1: &Plane3, p2: &Plane3) -> Option<Line3>;

    /// Point where `line` meets `plane`. `None` when they are parallel.
    fn intersect_plane_line(plane: &Plane3, line: &Line3) -> Option<Point3>;

    // --- Distance ---

    fn distance_points2(p: Point2, q: Point2) -> f64;

    fn distance_points3(p: Point3, q: Point3) -> f64;

    /// Unsigned distance from a point to a line in the plane.
    fn distance_line_point(line: &Line2, p: Point2) -> f64;

    /// Unsigned distance from a point to a plane.
    fn distance_plane_point(plane: &Plane3, p: Point3) -> f64;

    /// Unsigned distance from a point to a line in space.
    fn distance_line3_point(line: &Line3, p: Point3) -> f64;

    // --- Projection ---

    fn project_line(line: &Line2, p: Point2) -> Point2;

    fn project_plane(plane: &Plane3, p: Point3) -> Point3;

    fn project_line3(line: &Line3, p: Point3) -> Point3;

    // --- Angles and rotation ---

    /// Angle in `[0, π]`. The cosine is clamped so rounding never yields NaN.
    fn angle2(v1: Vector2, v2: Vector2) -> f64;

    /// Angle in `[0, π]`. The cosine is clamped so rounding never yields NaN.
    fn angle3(v1: Vector3, v2: Vector3) -> f64;

    /// Rodrigues rotation of `v` about the normalised `axis`.
    fn rotate_vector(v: Vector3, axis: Vector3, angle: f64) -> Vector3;

    // --- Normalisation ---

    /// Unit vector; a zero vector is returned unchanged.
    fn normalize2(v: Vector2) -> Vector2;

    /// Unit vector; a zero vector is returned unchanged.
    fn normalize3(v: Vector3) -> Vector3;

    // --- Provided predicates ---

    /// The near intersection of a line with a sphere, reached by travelling
    /// from the foot of the perpendicular against the line's direction.
    fn intersect_sphere_line(sphere: &Sphere3, line: &Line3) -> Option<Point3> {
        let foot = Self::project_line3(line, sphere.center);
        let dist = Self::distance_points3(sphere.center, foot);
        if dist == sphere.radius {
            Some(foot)
        } else if dist < sphere.radius {
            let half_chord = (sphere.radius * sphere.radius - dist * dist).sqrt();
            let dir = Self::normalize3(line.direction);
            Some(foot - dir * half_chord)
        } else {
            None
        }
    }

    /// Angle bisector of two lines.
    ///
    /// Intersecting lines give the line through the intersection along the
    /// sum of the unit directions. Parallel lines with normals less than
    /// `π/2` apart give the centred parallel; antiparallel lines give `None`.
    fn bisector_lines(l1: &Line2, l2: &Line2) -> Option<Line2> {
        if let Some(p) = Self::intersect_lines(l1, l2) {
            let dir = Self::normalize2(l1.direction()) + Self::normalize2(l2.direction());
            return Some(Line2::from_point_dir(p, dir));
        }
        let n1 = l1.normal();
        let n2 = l2.normal();
        if Self::angle2(n1, n2) < FRAC_PI_2 {
            let i = if n2.x.abs() >= n2.y.abs() { 0 } else { 1 };
            let c = (l1.c + l2.c * n1[i] / n2[i]) / 2.0;
            return Some(Line2::new(l1.a, l1.b, c));
        }
        None
    }

    /// Bisector plane of two planes; same rules as [`Kernel::bisector_lines`].
    fn bisector_planes(p1: &Plane3, p2: &Plane3) -> Option<Plane3> {
        if let Some(line) = Self::intersect_planes(p1, p2) {
            let normal = Self::normalize3(p1.normal()) + Self::normalize3(p2.normal());
            return Some(Plane3::from_point_normal(line.point, normal));
        }
        let n1 = p1.normal();
        let n2 = p2.normal();
        if Self::angle3(n1, n2) < FRAC_PI_2 {
            let i = n2.largest_axis();
            let d = (p1.d + p2.d * n1[i] / n2[i]) / 2.0;
            return Some(Plane3::new(p1.a, p1.b, p1.c, d));
        }
        None
    }

    /// Sign of the line equation at `p`: positive left of the direction.
    fn side_line(line: &Line2, p: Point2) -> i32 {
        sign(line.eval(p))
    }

    /// Sign of the plane equation at `p`: positive on the normal side.
    fn side_plane(plane: &Plane3, p: Point3) -> i32 {
        sign(plane.eval(p))
    }

    /// Side of `l2.point + l2.direction` relative to the plane through
    /// `l1.point`, `l1.point + l1.direction` and `l2.point`.
    fn orientation(l1: &Line3, l2: &Line3) -> i32 {
        let p0 = l1.point;
        let p1 = p0 + l1.direction;
        let p2 = l2.point;
        let plane = Plane3::from_points(p0, p1, p2);
        Self::side_plane(&plane, p2 + l2.direction)
    }

    fn angle_planes(p1: &Plane3, p2: &Plane3) -> f64 {
        Self::angle3(p1.normal(), p2.normal())
    }

    /// Angle between a plane and a line, in `[0, π/2]`.
    fn angle_plane_line(plane: &Plane3, line: &Line3) -> f64 {
        let angle = Self::angle3(plane.normal(), line.direction);
        if angle > FRAC_PI_2 {
            angle - FRAC_PI_2
        } else {
            FRAC_PI_2 - angle
        }
    }

    /// Rotates a plane about `line` by `angle`.
    fn rotate_plane(plane: &Plane3, line: &Line3, angle: f64) -> Plane3 {
        let normal = Self::rotate_vector(plane.normal(), line.direction, angle);
        Plane3::from_point_normal(line.point, normal)
    }

    /// Axis-aligned box containment, independent of corner order.
    fn is_inside2(p: Point2, a: Point2, b: Point2) -> bool {
        (0..2).all(|i| p[i] >= a[i].min(b[i]) && p[i] <= a[i].max(b[i]))
    }

    /// Axis-aligned box containment, independent of corner order.
    fn is_inside3(p: Point3, a: Point3, b: Point3) -> bool {
        (0..3).all(|i| p[i] >= a[i].min(b[i]) && p[i] <= a[i].max(b[i]))
    }

    /// Orders two points along `dir`: `-1` if `p2` lies ahead of `p1`,
    /// `1` if behind, `0` if level.
    fn compare_points2(dir: Vector2, p1: Point2, p2: Point2) -> i32 {
        -sign(dir.dot(p2 - p1))
    }

    /// Orders two points along `dir`: `-1` if `p2` lies ahead of `p1`,
    /// `1` if behind, `0` if level.
    fn compare_points3(dir: Vector3, p1: Point3, p2: Point3) -> i32 {
        -sign(dir.dot(p2 - p1))
    }

    /// The line moved by `dist` along its unit normal (to the left).
    fn offset_line(line: &Line2, dist: f64) -> Line2 {
        let normal = Self::normalize2(line.normal());
        Line2::from_point_dir(line.point() + normal * dist, line.direction())
    }

    /// The plane moved by `dist` along its unit normal. Negative distances
    /// move an outward-facing plane inwards.
    fn offset_plane(plane: &Plane3, dist: f64) -> Plane3 {
        let normal = Self::normalize3(plane.normal());
        Plane3::from_point_normal(plane.point() + normal * dist, normal)
    }

    fn offset_point2(p: Point2, dir: Vector2, dist: f64) -> Point2 {
        p + Self::normalize2(dir) * dist
    }

    fn offset_point3(p: Point3, dir: Vector3, dist: f64) -> Point3 {
        p + Self::normalize3(dir) * dist
    }

    fn opposite_line(line: &Line2) -> Line2 {
        Line2::new(-line.a, -line.b, -line.c)
    }

    fn opposite_plane(plane: &Plane3) -> Plane3 {
        Plane3::new(-plane.a, -plane.b, -plane.c, -plane.d)
    }

    fn perpendicular2(v: Vector2) -> Vector2 {
        Vector2::new(-v.y, v.x)
    }

    /// Copies coordinate `i` of `replacement` into `p`.
    fn replace_coord3(p: Point3, replacement: Point3, i: usize) -> Point3 {
        p.with_coord(i, replacement[i])
    }
}

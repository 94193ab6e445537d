// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel backend evaluated with nalgebra.
//!
//! Linear systems are solved by LU decomposition and rotations go through
//! [`nalgebra::Rotation3`]. The control flow mirrors [`crate::Analytic`]: the
//! same degeneracies are detected by the same exact tests before solving.

use nalgebra::{Matrix2, Matrix3, Rotation3, Unit, Vector2 as NVector2, Vector3 as NVector3};

use crate::analytic::clamped_acos;
use crate::kernel::Kernel;
use crate::primitives::{Line2, Line3, Plane3};
use crate::vector::{Point2, Point3, Vector2, Vector3};

/// The nalgebra-backed kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linalg;

impl From<Vector3> for NVector3<f64> {
    fn from(v: Vector3) -> Self {
        NVector3::new(v.x, v.y, v.z)
    }
}

impl From<NVector3<f64>> for Vector3 {
    fn from(v: NVector3<f64>) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for nalgebra::Point3<f64> {
    fn from(p: Point3) -> Self {
        nalgebra::Point3::new(p.x, p.y, p.z)
    }
}

impl From<nalgebra::Point3<f64>> for Point3 {
    fn from(p: nalgebra::Point3<f64>) -> Self {
        Point3::new(p.x, p.y, p.z)
    }
}

impl From<Vector2> for NVector2<f64> {
    fn from(v: Vector2) -> Self {
        NVector2::new(v.x, v.y)
    }
}

impl From<NVector2<f64>> for Vector2 {
    fn from(v: NVector2<f64>) -> Self {
        Vector2::new(v.x, v.y)
    }
}

impl From<Point2> for nalgebra::Point2<f64> {
    fn from(p: Point2) -> Self {
        nalgebra::Point2::new(p.x, p.y)
    }
}

impl From<nalgebra::Point2<f64>> for Point2 {
    fn from(p: nalgebra::Point2<f64>) -> Self {
        Point2::new(p.x, p.y)
    }
}

fn plane_normal(plane: &Plane3) -> NVector3<f64> {
    NVector3::new(plane.a, plane.b, plane.c)
}

impl Kernel for Linalg {
    fn intersect_lines(l1: &Line2, l2: &Line2) -> Option<Point2> {
        if l1 == l2 {
            return None;
        }
        let m = Matrix2::new(l1.a, l1.b, l2.a, l2.b);
        if m.determinant() == 0.0 {
            return None;
        }
        let x = m.lu().solve(&NVector2::new(-l1.c, -l2.c))?;
        Some(nalgebra::Point2::from(x).into())
    }

    fn intersect_planes3(p1: &Plane3, p2: &Plane3, p3: &Plane3) -> Option<Point3> {
        let m = Matrix3::new(
            p1.a, p1.b, p1.c, //
            p2.a, p2.b, p2.c, //
            p3.a, p3.b, p3.c,
        );
        if m.determinant() == 0.0 {
            return None;
        }
        let x = m.lu().solve(&NVector3::new(-p1.d, -p2.d, -p3.d))?;
        Some(nalgebra::Point3::from(x).into())
    }

    fn intersect_planes(p1: &Plane3, p2: &Plane3) -> Option<Line3> {
        let n1 = plane_normal(p1);
        let n2 = plane_normal(p2);
        let dir = n1.cross(&n2);
        if dir.norm_squared() == 0.0 {
            return None;
        }
        let k = dir.iamax();
        let (i, j) = match k {
            0 => (1, 2),
            1 => (2, 0),
            _ => (0, 1),
        };
        let m = Matrix2::new(n1[i], n1[j], n2[i], n2[j]);
        let x = m.lu().solve(&NVector2::new(-p1.d, -p2.d))?;
        let mut point = NVector3::zeros();
        point[i] = x[0];
        point[j] = x[1];
        Some(Line3::new(nalgebra::Point3::from(point).into(), dir.into()))
    }

    fn intersect_plane_line(plane: &Plane3, line: &Line3) -> Option<Point3> {
        let n = plane_normal(plane);
        let d: NVector3<f64> = line.direction.into();
        let denom = n.dot(&d);
        if denom == 0.0 {
            return None;
        }
        let p0: NVector3<f64> = line.point.to_vector().into();
        let lambda = -(n.dot(&p0) + plane.d) / denom;
        Some(nalgebra::Point3::from(p0 + d * lambda).into())
    }

    fn distance_points2(p: Point2, q: Point2) -> f64 {
        NVector2::from(q - p).norm()
    }

    fn distance_points3(p: Point3, q: Point3) -> f64 {
        let p: nalgebra::Point3<f64> = p.into();
        let q: nalgebra::Point3<f64> = q.into();
        nalgebra::distance(&p, &q)
    }

    fn distance_line_point(line: &Line2, p: Point2) -> f64 {
        line.eval(p).abs() / NVector2::from(line.normal()).norm()
    }

    fn distance_plane_point(plane: &Plane3, p: Point3) -> f64 {
        plane.eval(p).abs() / plane_normal(plane).norm()
    }

    fn distance_line3_point(line: &Line3, p: Point3) -> f64 {
        let d: NVector3<f64> = line.direction.into();
        let len = d.norm();
        if len == 0.0 {
            return Self::distance_points3(line.point, p);
        }
        let to_p1: NVector3<f64> = (p - line.point).into();
        let to_p2: NVector3<f64> = (p - (line.point + line.direction)).into();
        to_p1.cross(&to_p2).norm() / len
    }

    fn project_line(line: &Line2, p: Point2) -> Point2 {
        let n = NVector2::from(line.normal()).normalize();
        let to_p = NVector2::from(p - line.point());
        let dist = to_p.dot(&n);
        p - Vector2::from(n * dist)
    }

    fn project_plane(plane: &Plane3, p: Point3) -> Point3 {
        let n = plane_normal(plane).normalize();
        let to_p: NVector3<f64> = (p - plane.point()).into();
        let dist = to_p.dot(&n);
        p - Vector3::from(n * dist)
    }

    fn project_line3(line: &Line3, p: Point3) -> Point3 {
        let d = NVector3::from(line.direction).normalize();
        let to_p: NVector3<f64> = (p - line.point).into();
        line.point + Vector3::from(d * to_p.dot(&d))
    }

    fn angle2(v1: Vector2, v2: Vector2) -> f64 {
        let a = NVector2::from(v1);
        let b = NVector2::from(v2);
        clamped_acos(a.dot(&b) / (a.norm_squared() * b.norm_squared()).sqrt())
    }

    fn angle3(v1: Vector3, v2: Vector3) -> f64 {
        let a = NVector3::from(v1);
        let b = NVector3::from(v2);
        clamped_acos(a.dot(&b) / (a.norm_squared() * b.norm_squared()).sqrt())
    }

    fn rotate_vector(v: Vector3, axis: Vector3, angle: f64) -> Vector3 {
        let axis = NVector3::from(axis);
        if axis.norm_squared() == 0.0 {
            return v;
        }
        let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
        (rotation * NVector3::from(v)).into()
    }

    fn normalize2(v: Vector2) -> Vector2 {
        let n = NVector2::from(v);
        let len = n.norm();
        if len == 0.0 {
            v
        } else {
            (n / len).into()
        }
    }

    fn normalize3(v: Vector3) -> Vector3 {
        let n = NVector3::from(v);
        let len = n.norm();
        if len == 0.0 {
            v
        } else {
            (n / len).into()
        }
    }
}

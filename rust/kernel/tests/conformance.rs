// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conformance suite run against every kernel backend.
//!
//! Each backend must satisfy the same predicate contracts; the macro expands
//! the full suite once per backend.

use std::f64::consts::{FRAC_PI_2, PI};

use approx::{assert_abs_diff_eq, assert_relative_eq};
use straightskel_kernel::{
    Analytic, Kernel, Line2, Line3, Linalg, Plane3, Point2, Point3, Sphere3, Vector2, Vector3,
};

macro_rules! conformance_suite {
    ($name:ident, $kernel:ty) => {
        mod $name {
            use super::*;

            type K = $kernel;

            fn diagonals() -> (Line2, Line2) {
                (
                    Line2::through(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)),
                    Line2::through(Point2::new(0.0, 4.0), Point2::new(4.0, 0.0)),
                )
            }

            #[test]
            fn line_intersection_is_symmetric() {
                let (l1, l2) = diagonals();
                let p = K::intersect_lines(&l1, &l2).unwrap();
                let q = K::intersect_lines(&l2, &l1).unwrap();
                assert_relative_eq!(p.x, q.x);
                assert_relative_eq!(p.y, q.y);
                assert_relative_eq!(p.x, 2.0);
                assert_relative_eq!(p.y, 2.0);
                assert_abs_diff_eq!(l1.eval(p), 0.0, epsilon = 1e-12);
                assert_abs_diff_eq!(l2.eval(p), 0.0, epsilon = 1e-12);
            }

            #[test]
            fn parallel_and_identical_lines_do_not_intersect() {
                let l1 = Line2::new(0.0, 1.0, 0.0);
                let l2 = Line2::new(0.0, 1.0, -3.0);
                assert!(K::intersect_lines(&l1, &l2).is_none());
                assert!(K::intersect_lines(&l1, &Line2::new(0.0, 2.0, 0.0)).is_none());
            }

            #[test]
            fn distance_is_non_negative_and_zero_on_line() {
                let (l1, _) = diagonals();
                for p in [
                    Point2::new(1.0, 3.0),
                    Point2::new(3.0, 1.0),
                    Point2::new(-2.0, 5.0),
                    Point2::new(2.0, 2.0),
                ] {
                    let dist = K::distance_line_point(&l1, p);
                    assert!(dist >= 0.0);
                    assert_eq!(dist == 0.0, K::side_line(&l1, p) == 0);
                }
            }

            #[test]
            fn bisector_passes_through_intersection() {
                let (l1, l2) = diagonals();
                let p = K::intersect_lines(&l1, &l2).unwrap();
                let bisector = K::bisector_lines(&l1, &l2).unwrap();
                assert_abs_diff_eq!(K::distance_line_point(&bisector, p), 0.0, epsilon = 1e-12);
            }

            #[test]
            fn parallel_bisector_is_centred() {
                let l1 = Line2::new(0.0, 1.0, 0.0);
                let l2 = Line2::new(0.0, 2.0, -4.0);
                let bisector = K::bisector_lines(&l1, &l2).unwrap();
                assert_relative_eq!(bisector.point().y, 1.0);
            }

            #[test]
            fn antiparallel_bisector_is_absent() {
                // y = 0 heading +x and y = 2 heading -x: parallel with opposite normals
                let l1 = Line2::through(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
                let l2 = Line2::through(Point2::new(1.0, 2.0), Point2::new(0.0, 2.0));
                assert!(K::bisector_lines(&l1, &l2).is_none());

                let p1 = Plane3::new(0.0, 0.0, 1.0, 0.0);
                let p2 = Plane3::new(0.0, 0.0, -1.0, 2.0);
                assert!(K::bisector_planes(&p1, &p2).is_none());
            }

            #[test]
            fn plane_bisector_contains_intersection_line() {
                let top = Plane3::new(0.0, 0.0, 1.0, -1.0);
                let front = Plane3::new(0.0, -1.0, 0.0, 0.0);
                let bisector = K::bisector_planes(&top, &front).unwrap();
                let line = K::intersect_planes(&top, &front).unwrap();
                assert_abs_diff_eq!(bisector.eval(line.point), 0.0, epsilon = 1e-12);
                assert_abs_diff_eq!(bisector.eval(line.at(3.0)), 0.0, epsilon = 1e-12);
            }

            #[test]
            fn angle_clamps_at_the_extremes() {
                for v in [
                    Vector3::new(0.1, 0.2, 0.3),
                    Vector3::new(1.0, 0.0, 0.0),
                    Vector3::new(-7.5, 3.25, 1e-3),
                ] {
                    assert_eq!(K::angle3(v, v), 0.0);
                    assert_eq!(K::angle3(v, -v), PI);
                }
                let w = Vector2::new(0.3, -0.7);
                assert_eq!(K::angle2(w, w), 0.0);
                assert_eq!(K::angle2(w, -w), PI);
                assert_relative_eq!(
                    K::angle2(Vector2::new(1.0, 0.0), Vector2::new(0.0, 5.0)),
                    FRAC_PI_2
                );
            }

            #[test]
            fn is_inside_ignores_corner_order() {
                let a = Point3::new(0.0, 0.0, 0.0);
                let b = Point3::new(2.0, 3.0, 4.0);
                for p in [
                    Point3::new(1.0, 1.0, 1.0),
                    Point3::new(2.0, 3.0, 4.0),
                    Point3::new(2.5, 1.0, 1.0),
                    Point3::new(1.0, -0.1, 1.0),
                ] {
                    let inside = (0..3).all(|i| p[i] >= a[i].min(b[i]) && p[i] <= a[i].max(b[i]));
                    assert_eq!(K::is_inside3(p, a, b), inside);
                    assert_eq!(K::is_inside3(p, b, a), inside);
                }
                let p = Point2::new(0.5, 0.5);
                assert!(K::is_inside2(p, Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)));
            }

            #[test]
            fn three_planes_meet_at_corner() {
                let p = K::intersect_planes3(
                    &Plane3::new(1.0, 0.0, 0.0, -1.0),
                    &Plane3::new(0.0, 1.0, 0.0, -2.0),
                    &Plane3::new(0.0, 0.0, 1.0, -3.0),
                )
                .unwrap();
                assert_relative_eq!(p.x, 1.0);
                assert_relative_eq!(p.y, 2.0);
                assert_relative_eq!(p.z, 3.0);

                let degenerate = K::intersect_planes3(
                    &Plane3::new(1.0, 0.0, 0.0, 0.0),
                    &Plane3::new(2.0, 0.0, 0.0, -1.0),
                    &Plane3::new(0.0, 0.0, 1.0, 0.0),
                );
                assert!(degenerate.is_none());
            }

            #[test]
            fn two_planes_meet_in_a_line_on_both() {
                let p1 = Plane3::new(1.0, 1.0, 0.0, -2.0);
                let p2 = Plane3::new(0.0, 1.0, 1.0, -1.0);
                let line = K::intersect_planes(&p1, &p2).unwrap();
                for t in [0.0, 1.0, -2.5] {
                    let q = line.at(t);
                    assert_abs_diff_eq!(p1.eval(q), 0.0, epsilon = 1e-12);
                    assert_abs_diff_eq!(p2.eval(q), 0.0, epsilon = 1e-12);
                }
                assert!(K::intersect_planes(&p1, &Plane3::new(2.0, 2.0, 0.0, 1.0)).is_none());
            }

            #[test]
            fn plane_line_intersection() {
                let plane = Plane3::new(0.0, 0.0, 1.0, -2.0);
                let line = Line3::new(Point3::new(1.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 4.0));
                let p = K::intersect_plane_line(&plane, &line).unwrap();
                assert_relative_eq!(p.z, 2.0);
                let parallel = Line3::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                assert!(K::intersect_plane_line(&plane, &parallel).is_none());
            }

            #[test]
            fn sphere_line_returns_near_point() {
                let sphere = Sphere3::new(Point3::new(0.0, 0.0, 0.0), 2.0);
                let line = Line3::new(Point3::new(-5.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                let p = K::intersect_sphere_line(&sphere, &line).unwrap();
                assert_relative_eq!(p.x, -2.0);

                let tangent = Line3::new(Point3::new(0.0, 2.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                let t = K::intersect_sphere_line(&sphere, &tangent).unwrap();
                assert_relative_eq!(t.y, 2.0);

                let miss = Line3::new(Point3::new(0.0, 3.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                assert!(K::intersect_sphere_line(&sphere, &miss).is_none());
            }

            #[test]
            fn distances_and_projections() {
                let plane = Plane3::new(0.0, 0.0, 2.0, -2.0);
                assert_relative_eq!(K::distance_plane_point(&plane, Point3::new(5.0, 5.0, 4.0)), 3.0);
                let foot = K::project_plane(&plane, Point3::new(5.0, 5.0, 4.0));
                assert_relative_eq!(foot.z, 1.0);

                let axis = Line3::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 3.0));
                assert_relative_eq!(K::distance_line3_point(&axis, Point3::new(3.0, 4.0, 9.0)), 5.0);
                let on_axis = K::project_line3(&axis, Point3::new(3.0, 4.0, 9.0));
                assert_relative_eq!(on_axis.z, 9.0);

                let line = Line2::through(Point2::new(0.0, 1.0), Point2::new(4.0, 1.0));
                let p = K::project_line(&line, Point2::new(2.0, 7.0));
                assert_relative_eq!(p.x, 2.0);
                assert_relative_eq!(p.y, 1.0);
                assert_relative_eq!(K::distance_points2(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)), 5.0);
            }

            #[test]
            fn rotation_about_axis() {
                let v = K::rotate_vector(
                    Vector3::new(1.0, 0.0, 0.0),
                    Vector3::new(0.0, 0.0, 1.0),
                    FRAC_PI_2,
                );
                assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-12);
                assert_abs_diff_eq!(v.y, 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(v.z, 0.0, epsilon = 1e-12);
            }

            #[test]
            fn offsets_move_along_unit_normal() {
                let line = Line2::through(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
                let moved = K::offset_line(&line, 2.0);
                assert_relative_eq!(moved.point().y, 2.0);
                assert_eq!(K::side_line(&line, Point2::new(5.0, 1.0)), 1);

                let plane = Plane3::new(0.0, 0.0, 5.0, -5.0);
                let moved = K::offset_plane(&plane, -1.0);
                assert_abs_diff_eq!(moved.eval(Point3::new(3.0, 3.0, 0.0)), 0.0, epsilon = 1e-12);
            }

            #[test]
            fn compare_points_orders_along_direction() {
                let dir = Vector3::new(1.0, 0.0, 0.0);
                let p1 = Point3::new(0.0, 0.0, 0.0);
                let p2 = Point3::new(1.0, 9.0, 0.0);
                assert_eq!(K::compare_points3(dir, p1, p2), -1);
                assert_eq!(K::compare_points3(dir, p2, p1), 1);
                assert_eq!(K::compare_points2(Vector2::new(0.0, 1.0), Point2::new(1.0, 0.0), Point2::new(5.0, 0.0)), 0);
            }

            #[test]
            fn orientation_of_skew_lines() {
                let l1 = Line3::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                let up = Line3::new(Point3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
                let down = Line3::new(Point3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, -1.0));
                assert_eq!(K::orientation(&l1, &up), 1);
                assert_eq!(K::orientation(&l1, &down), -1);
            }

            #[test]
            fn plane_line_angle_is_complementary() {
                let plane = Plane3::new(0.0, 0.0, 1.0, 0.0);
                let vertical = Line3::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0));
                assert_relative_eq!(K::angle_plane_line(&plane, &vertical), FRAC_PI_2);
                let flat = Line3::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
                assert_abs_diff_eq!(K::angle_plane_line(&plane, &flat), 0.0, epsilon = 1e-12);
            }
        }
    };
}

conformance_suite!(analytic, Analytic);
conformance_suite!(linalg, Linalg);

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # StraightSkel Kernel
//!
//! Geometric primitives and predicates for straight skeleton computation.
//!
//! The crate provides value types (points, vectors, lines, planes, segments,
//! spheres) and the [`Kernel`] trait: intersection, bisector, distance,
//! projection, side and orientation tests, angles, rotation and offsetting.
//!
//! ## Backends
//!
//! Two interchangeable backends implement [`Kernel`]:
//!
//! - [`Analytic`]: closed-form formulas on plain `f64`
//! - [`Linalg`]: the same predicates evaluated with nalgebra
//!
//! [`ActiveKernel`] names the backend selected at build time. It is
//! [`Analytic`] unless the `linalg` feature is enabled.
//!
//! ```
//! use straightskel_kernel::{ActiveKernel, Kernel, Line2, Point2};
//!
//! let l1 = Line2::through(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0));
//! let l2 = Line2::through(Point2::new(0.0, 4.0), Point2::new(4.0, 0.0));
//! let p = ActiveKernel::intersect_lines(&l1, &l2).unwrap();
//! assert_eq!(p, Point2::new(2.0, 2.0));
//! ```

pub mod analytic;
pub mod kernel;
pub mod linalg;
pub mod primitives;
pub mod vector;

pub use analytic::Analytic;
pub use kernel::{sign, Kernel};
pub use linalg::Linalg;
pub use primitives::{Line2, Line3, Plane3, Segment2, Segment3, Sphere3};
pub use vector::{Point2, Point3, Vector2, Vector3};

/// The kernel backend selected by the `linalg` feature.
#[cfg(feature = "linalg")]
pub type ActiveKernel = Linalg;

/// The kernel backend selected by the `linalg` feature.
#[cfg(not(feature = "linalg"))]
pub type ActiveKernel = Analytic;

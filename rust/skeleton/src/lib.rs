// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # StraightSkel Skeleton
//!
//! Event-driven straight skeletons of polygons and polyhedra.
//!
//! The wavefront starts at the boundary and moves inwards, every edge (2D)
//! or facet (3D) at its own speed. Whenever its topology changes an event
//! fires, a [`graph::Node`] is recorded and the traces of the moving
//! vertices and edges become [`graph::Arc`]s and [`graph::Sheet`]s.
//!
//! - [`SimpleSkel2d`]: polygons with holes and weighted edges.
//! - [`SimpleSkel3d`]: closed polyhedra. Vertices with more than three
//!   facets are split first.
//! - [`Section`]: the loop a plane cuts from a polyhedron, convertible to a
//!   weighted polygon.
//!
//! Engines never mutate their input; they work on a copy and return a
//! [`StraightSkeleton`].
//!
//! ## Quick Start
//!
//! ```
//! use straightskel_skeleton::{SimpleSkel2d, SkeletonConfig};
//! use straightskel_skeleton::kernel::Point2;
//! use straightskel_skeleton::mesh::Polygon;
//!
//! let square = Polygon::from_points(&[
//!     Point2::new(0.0, 0.0),
//!     Point2::new(4.0, 0.0),
//!     Point2::new(4.0, 4.0),
//!     Point2::new(0.0, 4.0),
//! ])
//! .unwrap();
//!
//! let skel = SimpleSkel2d::compute(&square, SkeletonConfig::default()).unwrap();
//! let (_, centre) = skel.nodes().find(|(_, n)| n.offset > 0.0).unwrap();
//! assert!((centre.offset - 2.0).abs() < 1e-9);
//! ```
//!
//! ## Logging
//!
//! Progress is reported through `tracing`: `info` for run start and finish,
//! `debug` per handled event, `trace` per detected candidate. No subscriber
//! is installed by the library.

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod intersection;
pub mod keys;
pub mod line_in_facet;
pub mod self_intersection;
pub mod serialization;
pub mod skel2d;
pub mod skel3d;
pub mod splitter;

pub use config::{EdgeEventPolicy, SkeletonConfig, VertexSplitterKind};
pub use error::{Error, Result};
pub use events::{Event2d, Event3d, EventKind};
pub use graph::{Arc, EventRecord, Node, Sheet, StraightSkeleton};
pub use intersection::{Origin, Section};
pub use keys::{ArcKey, NodeKey, SheetKey};
pub use serialization::SkeletonSnapshot;
pub use skel2d::SimpleSkel2d;
pub use skel3d::SimpleSkel3d;
pub use splitter::{AngleVertexSplitter, ConvexVertexSplitter, ReflexVertexSplitter, VertexSplitter};

pub use straightskel_kernel as kernel;
pub use straightskel_mesh as mesh;

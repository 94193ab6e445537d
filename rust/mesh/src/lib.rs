// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # StraightSkel Mesh
//!
//! Mutable boundary topology for straight skeleton computation.
//!
//! - [`Polygon`]: directed edge rings in the plane; each vertex links to its
//!   incoming and outgoing edge.
//! - [`Polyhedron`]: a closed boundary mesh; each edge links its endpoints
//!   and its left and right facet, vertices and facets keep cyclic
//!   adjacency lists.
//!
//! Entities live in slot maps and refer to each other by generational keys,
//! so a link to a removed entity resolves to `None`. Every entity carries an
//! insertion id that is never reused, and implements [`Highlight`].
//!
//! ## Quick Start
//!
//! ```
//! use straightskel_kernel::Point3;
//! use straightskel_mesh::Polyhedron;
//!
//! let mut cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
//! let v = cube.vertex_keys()[0];
//! let f = cube.vertex(v).unwrap().facets()[0];
//! let left = cube.facet_next_around(f, v).unwrap();
//! let right = cube.facet_prev_around(f, v).unwrap();
//!
//! let (_, joint) = cube.split_vertex(v, left, right).unwrap();
//! assert_eq!(cube.vertex_count(), 9);
//!
//! cube.collapse_edge(joint);
//! assert_eq!(cube.vertex_count(), 8);
//! assert!(cube.is_consistent());
//! ```

pub mod builders;
pub mod construction;
pub mod error;
pub mod geometry;
pub mod highlight;
pub mod keys;
pub mod polygon;
pub mod polyhedron;
pub mod serialization;
pub mod traversal;

pub use error::{Error, Result};
pub use highlight::Highlight;
pub use keys::{Edge2Key, EdgeKey, FacetKey, Vertex2Key, VertexKey};
pub use polygon::{Edge2, Polygon, Vertex2};
pub use polyhedron::{Edge, Facet, Polyhedron, Vertex};
pub use serialization::{PolygonSnapshot, PolyhedronSnapshot};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for mesh operations.

use crate::keys::{EdgeKey, FacetKey, VertexKey};

/// Result type alias for mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or rewiring a mesh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Vertex key not found in the arena.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexKey),

    /// Edge key not found in the arena.
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeKey),

    /// Facet key not found in the arena.
    #[error("facet not found: {0:?}")]
    FacetNotFound(FacetKey),

    /// An edge was requested between a vertex and itself.
    #[error("edge endpoints must be distinct vertices")]
    DegenerateEdge,

    /// Walking the edges around a vertex did not return to the start.
    #[error("edges around vertex {0:?} do not form a closed ring")]
    OpenVertexRing(VertexKey),

    /// Walking the edges of a facet did not return to the start.
    #[error("boundary of facet {0:?} is not a single closed cycle")]
    OpenFacetBoundary(FacetKey),

    /// A polygon or facet needs at least three vertices.
    #[error("at least 3 vertices required, got {0}")]
    TooFewVertices(usize),

    /// Adjacency links contradict each other.
    #[error("inconsistent mesh: {0}")]
    Inconsistent(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for arena-based mesh storage.
//!
//! Cross-links between entities are generational keys, so a link to a removed
//! entity resolves to `None` instead of dangling.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a polygon vertex.
    pub struct Vertex2Key;

    /// Key for a directed polygon edge.
    pub struct Edge2Key;

    /// Key for a polyhedron vertex.
    pub struct VertexKey;

    /// Key for a polyhedron edge (two endpoints, a left and a right facet).
    pub struct EdgeKey;

    /// Key for a planar polyhedron facet.
    pub struct FacetKey;
}

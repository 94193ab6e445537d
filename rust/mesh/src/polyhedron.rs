// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for polyhedral boundary meshes.
//!
//! The [`Polyhedron`] owns every vertex, edge and facet. Adjacency is kept in
//! both directions:
//!
//! - an edge knows its endpoints and its left and right facet;
//! - a vertex lists its incident edges and facets;
//! - a facet lists its bounding edges and corner vertices.
//!
//! An edge runs `src → dst` in its left facet and `dst → src` in its right
//! facet, so every facet boundary is counter-clockwise seen from outside.
//! Traversal, rewiring and geometric queries live in sibling modules as
//! further `impl Polyhedron` blocks.

use slotmap::SlotMap;
use smallvec::SmallVec;
use straightskel_kernel::{Plane3, Point3};

use crate::error::{Error, Result};
use crate::keys::{EdgeKey, FacetKey, VertexKey};

/// A polyhedron corner.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub point: Point3,
    pub(crate) edges: SmallVec<[EdgeKey; 4]>,
    pub(crate) facets: SmallVec<[FacetKey; 4]>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Vertex {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Incident edges; counter-clockwise seen from outside once sorted.
    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }

    /// Incident facets; counter-clockwise seen from outside once sorted.
    pub fn facets(&self) -> &[FacetKey] {
        &self.facets
    }

    pub fn contains_edge(&self, edge: EdgeKey) -> bool {
        self.edges.contains(&edge)
    }

    pub fn contains_facet(&self, facet: FacetKey) -> bool {
        self.facets.contains(&facet)
    }
}

/// A polyhedron edge between a left and a right facet.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) src: VertexKey,
    pub(crate) dst: VertexKey,
    pub(crate) facet_l: Option<FacetKey>,
    pub(crate) facet_r: Option<FacetKey>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Edge {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn src(&self) -> VertexKey {
        self.src
    }

    pub fn dst(&self) -> VertexKey {
        self.dst
    }

    /// The facet in which the edge runs `src → dst`.
    pub fn facet_l(&self) -> Option<FacetKey> {
        self.facet_l
    }

    /// The facet in which the edge runs `dst → src`.
    pub fn facet_r(&self) -> Option<FacetKey> {
        self.facet_r
    }

    pub fn has_vertex(&self, vertex: VertexKey) -> bool {
        self.src == vertex || self.dst == vertex
    }

    pub fn has_facet(&self, facet: FacetKey) -> bool {
        self.facet_l == Some(facet) || self.facet_r == Some(facet)
    }
}

/// A planar facet with an outward-facing supporting plane.
#[derive(Debug, Clone)]
pub struct Facet {
    pub plane: Plane3,
    /// Distance the facet travels per unit of offset.
    pub speed: f64,
    pub(crate) edges: Vec<EdgeKey>,
    pub(crate) vertices: Vec<VertexKey>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Facet {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }

    pub fn vertices(&self) -> &[VertexKey] {
        &self.vertices
    }

    pub fn contains_edge(&self, edge: EdgeKey) -> bool {
        self.edges.contains(&edge)
    }

    pub fn contains_vertex(&self, vertex: VertexKey) -> bool {
        self.vertices.contains(&vertex)
    }
}

crate::impl_highlight!(Vertex, Edge, Facet);

/// A closed polyhedral boundary mesh.
///
/// # Example
///
/// ```
/// use straightskel_kernel::Point3;
/// use straightskel_mesh::Polyhedron;
///
/// let cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
///
/// assert_eq!(cube.vertex_count(), 8);
/// assert_eq!(cube.edge_count(), 12);
/// assert_eq!(cube.facet_count(), 6);
/// assert!(cube.is_consistent());
/// ```
#[derive(Debug, Clone)]
pub struct Polyhedron {
    pub(crate) vertices: SlotMap<VertexKey, Vertex>,
    pub(crate) edges: SlotMap<EdgeKey, Edge>,
    pub(crate) facets: SlotMap<FacetKey, Facet>,
    next_id: usize,
}

impl Polyhedron {
    /// Creates a new, empty polyhedron.
    pub fn new() -> Self {
        Self {
            vertices: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            facets: SlotMap::with_key(),
            next_id: 0,
        }
    }

    fn take_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- Vertex operations ---

    /// Adds an unconnected vertex.
    pub fn add_vertex(&mut self, point: Point3) -> VertexKey {
        let id = self.take_id();
        self.vertices.insert(Vertex {
            point,
            edges: SmallVec::new(),
            facets: SmallVec::new(),
            id,
            highlighted: false,
        })
    }

    /// Removes a vertex, unlinks it from its facets and removes its edges.
    pub fn remove_vertex(&mut self, key: VertexKey) -> bool {
        let Some(vertex) = self.vertices.remove(key) else {
            return false;
        };
        for f in vertex.facets {
            if let Some(facet) = self.facets.get_mut(f) {
                facet.vertices.retain(|v| *v != key);
            }
        }
        for e in vertex.edges {
            self.remove_edge(e);
        }
        true
    }

    pub fn vertex(&self, key: VertexKey) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    pub fn vertex_mut(&mut self, key: VertexKey) -> Option<&mut Vertex> {
        self.vertices.get_mut(key)
    }

    pub fn point(&self, key: VertexKey) -> Option<Point3> {
        self.vertices.get(key).map(|v| v.point)
    }

    pub fn contains_vertex(&self, key: VertexKey) -> bool {
        self.vertices.contains_key(key)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &Vertex)> {
        self.vertices.iter()
    }

    pub fn vertex_keys(&self) -> Vec<VertexKey> {
        self.vertices.keys().collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    // --- Edge operations ---

    /// Adds the edge `src → dst` and registers it with both endpoints.
    /// Facets are attached separately.
    pub fn add_edge(&mut self, src: VertexKey, dst: VertexKey) -> Result<EdgeKey> {
        if src == dst {
            return Err(Error::DegenerateEdge);
        }
        if !self.vertices.contains_key(src) {
            return Err(Error::VertexNotFound(src));
        }
        if !self.vertices.contains_key(dst) {
            return Err(Error::VertexNotFound(dst));
        }
        let id = self.take_id();
        let key = self.edges.insert(Edge {
            src,
            dst,
            facet_l: None,
            facet_r: None,
            id,
            highlighted: false,
        });
        self.vertices[src].edges.push(key);
        self.vertices[dst].edges.push(key);
        Ok(key)
    }

    /// Removes an edge and unlinks it from its facets and endpoints.
    pub fn remove_edge(&mut self, key: EdgeKey) -> bool {
        let Some(edge) = self.edges.remove(key) else {
            return false;
        };
        for f in [edge.facet_l, edge.facet_r].into_iter().flatten() {
            if let Some(facet) = self.facets.get_mut(f) {
                facet.edges.retain(|e| *e != key);
            }
        }
        for v in [edge.src, edge.dst] {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.edges.retain(|e| *e != key);
            }
        }
        true
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    pub fn edge_mut(&mut self, key: EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(key)
    }

    pub fn contains_edge(&self, key: EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &Edge)> {
        self.edges.iter()
    }

    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        self.edges.keys().collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // --- Facet operations ---

    /// Adds an empty facet on `plane`.
    pub fn add_facet(&mut self, plane: Plane3) -> FacetKey {
        let id = self.take_id();
        self.facets.insert(Facet {
            plane,
            speed: 1.0,
            edges: Vec::new(),
            vertices: Vec::new(),
            id,
            highlighted: false,
        })
    }

    /// Removes a facet, clearing its slot on every bounding edge and its
    /// entry on every corner vertex. The edges themselves stay.
    pub fn remove_facet(&mut self, key: FacetKey) -> bool {
        let Some(facet) = self.facets.remove(key) else {
            return false;
        };
        for e in facet.edges {
            if let Some(edge) = self.edges.get_mut(e) {
                if edge.facet_l == Some(key) {
                    edge.facet_l = None;
                }
                if edge.facet_r == Some(key) {
                    edge.facet_r = None;
                }
            }
        }
        for v in facet.vertices {
            if let Some(vertex) = self.vertices.get_mut(v) {
                vertex.facets.retain(|f| *f != key);
            }
        }
        true
    }

    pub fn facet(&self, key: FacetKey) -> Option<&Facet> {
        self.facets.get(key)
    }

    pub fn facet_mut(&mut self, key: FacetKey) -> Option<&mut Facet> {
        self.facets.get_mut(key)
    }

    pub fn contains_facet(&self, key: FacetKey) -> bool {
        self.facets.contains_key(key)
    }

    pub fn facets(&self) -> impl Iterator<Item = (FacetKey, &Facet)> {
        self.facets.iter()
    }

    pub fn facet_keys(&self) -> Vec<FacetKey> {
        self.facets.keys().collect()
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.facets.is_empty()
    }

    /// Removes every entity. Ids keep counting.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.facets.clear();
    }

    // --- Consistency ---

    /// Checks that every adjacency link is mirrored by the linked entity.
    pub fn is_consistent(&self) -> bool {
        self.check_consistency().is_ok()
    }

    /// Like [`Polyhedron::is_consistent`], naming the first broken link.
    pub fn check_consistency(&self) -> Result<()> {
        for (vk, vertex) in &self.vertices {
            for &e in &vertex.edges {
                match self.edges.get(e) {
                    Some(edge) if edge.has_vertex(vk) => {}
                    _ => {
                        return Err(Error::Inconsistent(format!(
                            "vertex {} lists an edge that does not end at it",
                            vertex.id
                        )))
                    }
                }
            }
            for &f in &vertex.facets {
                match self.facets.get(f) {
                    Some(facet) if facet.contains_vertex(vk) => {}
                    _ => {
                        return Err(Error::Inconsistent(format!(
                            "vertex {} lists a facet that does not contain it",
                            vertex.id
                        )))
                    }
                }
            }
        }
        for (ek, edge) in &self.edges {
            for v in [edge.src, edge.dst] {
                if !self.vertices.get(v).is_some_and(|vertex| vertex.contains_edge(ek)) {
                    return Err(Error::Inconsistent(format!(
                        "edge {} is not listed by its endpoint",
                        edge.id
                    )));
                }
            }
            for f in [edge.facet_l, edge.facet_r].into_iter().flatten() {
                if !self.facets.get(f).is_some_and(|facet| facet.contains_edge(ek)) {
                    return Err(Error::Inconsistent(format!(
                        "edge {} is not listed by its facet",
                        edge.id
                    )));
                }
            }
        }
        for (fk, facet) in &self.facets {
            for &v in &facet.vertices {
                if !self.vertices.get(v).is_some_and(|vertex| vertex.contains_facet(fk)) {
                    return Err(Error::Inconsistent(format!(
                        "facet {} lists a vertex that does not list it",
                        facet.id
                    )));
                }
            }
            for &e in &facet.edges {
                let Some(edge) = self.edges.get(e) else {
                    return Err(Error::Inconsistent(format!(
                        "facet {} lists a removed edge",
                        facet.id
                    )));
                };
                if !edge.has_facet(fk) {
                    return Err(Error::Inconsistent(format!(
                        "facet {} lists edge {} which does not border it",
                        facet.id, edge.id
                    )));
                }
                if !facet.contains_vertex(edge.src) || !facet.contains_vertex(edge.dst) {
                    return Err(Error::Inconsistent(format!(
                        "facet {} is missing an endpoint of edge {}",
                        facet.id, edge.id
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Polyhedron {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Polyhedron, [VertexKey; 3], [EdgeKey; 3], FacetKey) {
        let mut p = Polyhedron::new();
        let v = [
            p.add_vertex(Point3::new(0.0, 0.0, 0.0)),
            p.add_vertex(Point3::new(1.0, 0.0, 0.0)),
            p.add_vertex(Point3::new(0.0, 1.0, 0.0)),
        ];
        let f = p.add_facet(Plane3::new(0.0, 0.0, 1.0, 0.0));
        let e = [
            p.add_edge(v[0], v[1]).unwrap(),
            p.add_edge(v[1], v[2]).unwrap(),
            p.add_edge(v[2], v[0]).unwrap(),
        ];
        for &ek in &e {
            p.facet_add_edge(f, ek).unwrap();
        }
        (p, v, e, f)
    }

    #[test]
    fn add_edge_registers_endpoints() {
        let (p, v, e, _) = triangle();
        assert_eq!(p.vertex(v[0]).unwrap().edges(), &[e[0], e[2]]);
        assert!(p.is_consistent());
    }

    #[test]
    fn degenerate_edge_rejected() {
        let mut p = Polyhedron::new();
        let v = p.add_vertex(Point3::new(0.0, 0.0, 0.0));
        assert!(matches!(p.add_edge(v, v), Err(Error::DegenerateEdge)));
    }

    #[test]
    fn remove_facet_keeps_edges() {
        let (mut p, v, e, f) = triangle();
        assert!(p.remove_facet(f));
        assert_eq!(p.edge_count(), 3);
        assert!(e.iter().all(|&k| p.edge(k).unwrap().facet_l().is_none()));
        assert!(p.vertex(v[0]).unwrap().facets().is_empty());
        assert!(p.is_consistent());
    }

    #[test]
    fn remove_edge_unlinks_everywhere() {
        let (mut p, v, e, f) = triangle();
        assert!(p.remove_edge(e[0]));
        assert!(!p.facet(f).unwrap().contains_edge(e[0]));
        assert!(!p.vertex(v[1]).unwrap().contains_edge(e[0]));
        assert!(!p.remove_edge(e[0]));
    }

    #[test]
    fn remove_vertex_removes_incident_edges() {
        let (mut p, v, _, f) = triangle();
        assert!(p.remove_vertex(v[0]));
        assert_eq!(p.edge_count(), 1);
        assert!(!p.facet(f).unwrap().contains_vertex(v[0]));
        assert!(p.is_consistent());
    }

    #[test]
    fn stale_keys_resolve_to_none() {
        let (mut p, v, _, _) = triangle();
        p.remove_vertex(v[2]);
        assert!(p.vertex(v[2]).is_none());
        assert!(p.point(v[2]).is_none());
    }
}

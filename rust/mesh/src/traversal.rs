// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orientation-aware navigation and adjacency ordering.
//!
//! "Around a vertex" means counter-clockwise seen from outside the solid.
//! "In a facet" follows the facet boundary, also counter-clockwise seen from
//! outside. Walks that cannot continue return `None`; the `sort_*` methods
//! turn that into [`Error::OpenVertexRing`] or [`Error::OpenFacetBoundary`].

use std::f64::consts::{FRAC_PI_2, PI};

use smallvec::SmallVec;
use straightskel_kernel::{ActiveKernel, Kernel};

use crate::error::{Error, Result};
use crate::keys::{EdgeKey, FacetKey, VertexKey};
use crate::polyhedron::Polyhedron;

// =============================================================================
// Edge queries
// =============================================================================

impl Polyhedron {
    /// The facet on the other side of `edge`.
    pub fn other_facet(&self, edge: EdgeKey, facet: FacetKey) -> Option<FacetKey> {
        let e = self.edges.get(edge)?;
        if e.facet_l == Some(facet) {
            e.facet_r
        } else if e.facet_r == Some(facet) {
            e.facet_l
        } else {
            None
        }
    }

    /// The endpoint of `edge` that is not `vertex`.
    pub fn other_vertex(&self, edge: EdgeKey, vertex: VertexKey) -> Option<VertexKey> {
        let e = self.edges.get(edge)?;
        if e.src == vertex {
            Some(e.dst)
        } else if e.dst == vertex {
            Some(e.src)
        } else {
            None
        }
    }

    /// Where `edge` starts when walking the boundary of `facet`.
    pub fn src_in(&self, edge: EdgeKey, facet: FacetKey) -> Option<VertexKey> {
        let e = self.edges.get(edge)?;
        if e.facet_l == Some(facet) {
            Some(e.src)
        } else if e.facet_r == Some(facet) {
            Some(e.dst)
        } else {
            None
        }
    }

    /// Where `edge` ends when walking the boundary of `facet`.
    pub fn dst_in(&self, edge: EdgeKey, facet: FacetKey) -> Option<VertexKey> {
        let e = self.edges.get(edge)?;
        if e.facet_l == Some(facet) {
            Some(e.dst)
        } else if e.facet_r == Some(facet) {
            Some(e.src)
        } else {
            None
        }
    }

    /// The boundary edge of `facet` that follows `edge`.
    pub fn next_in(&self, edge: EdgeKey, facet: FacetKey) -> Option<EdgeKey> {
        let list = &self.facets.get(facet)?.edges;
        let pos = list.iter().position(|&e| e == edge)?;
        let end = self.dst_in(edge, facet)?;
        let n = list.len();
        (1..n)
            .map(|i| list[(pos + i) % n])
            .find(|&e| self.src_in(e, facet) == Some(end))
    }

    /// The boundary edge of `facet` that precedes `edge`.
    pub fn prev_in(&self, edge: EdgeKey, facet: FacetKey) -> Option<EdgeKey> {
        let list = &self.facets.get(facet)?.edges;
        let pos = list.iter().position(|&e| e == edge)?;
        let start = self.src_in(edge, facet)?;
        let n = list.len();
        (1..n)
            .map(|i| list[(pos + n - i) % n])
            .find(|&e| self.dst_in(e, facet) == Some(start))
    }

    /// The next edge counter-clockwise around `vertex`.
    ///
    /// It is the edge entering `vertex` in the facet to the left of `edge`.
    /// When several edges qualify, the one with the smallest turn wins.
    pub fn next_around(&self, edge: EdgeKey, vertex: VertexKey) -> Option<EdgeKey> {
        let e = self.edges.get(edge)?;
        let facet = if vertex == e.src {
            e.facet_l?
        } else if vertex == e.dst {
            e.facet_r?
        } else {
            return None;
        };
        let candidates: SmallVec<[EdgeKey; 4]> = self
            .vertices
            .get(vertex)?
            .edges
            .iter()
            .copied()
            .filter(|&c| c != edge && self.dst_in(c, facet) == Some(vertex))
            .collect();
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        let mut best = None;
        let mut angle_min = 2.0 * PI;
        for c in candidates {
            let angle = self.angle_to(edge, c);
            if angle <= angle_min {
                best = Some(c);
                angle_min = angle;
            }
        }
        best
    }

    /// The next edge clockwise around `vertex`.
    pub fn prev_around(&self, edge: EdgeKey, vertex: VertexKey) -> Option<EdgeKey> {
        let e = self.edges.get(edge)?;
        let facet = if vertex == e.src {
            e.facet_r?
        } else if vertex == e.dst {
            e.facet_l?
        } else {
            return None;
        };
        let candidates: SmallVec<[EdgeKey; 4]> = self
            .vertices
            .get(vertex)?
            .edges
            .iter()
            .copied()
            .filter(|&c| c != edge && self.src_in(c, facet) == Some(vertex))
            .collect();
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        let mut best = None;
        let mut angle_max = -1.0;
        for c in candidates {
            let angle = self.angle_to(edge, c);
            if angle >= angle_max {
                best = Some(c);
                angle_max = angle;
            }
        }
        best
    }

    /// Turn from `edge` to `other` about their shared vertex, in `[0, 2π)`,
    /// measured in their shared facet.
    ///
    /// Edges bordering the same two facets only distinguish "same
    /// direction" (`0`) from "opposite" (`π`).
    pub(crate) fn angle_to(&self, edge: EdgeKey, other: EdgeKey) -> f64 {
        let (Some(a), Some(b)) = (self.edges.get(edge), self.edges.get(other)) else {
            return 0.0;
        };
        let vertex = if b.has_vertex(a.src) {
            a.src
        } else if b.has_vertex(a.dst) {
            a.dst
        } else {
            return 0.0;
        };
        let facet = match (a.facet_l, a.facet_r) {
            (Some(l), _) if b.has_facet(l) => l,
            (_, Some(r)) if b.has_facet(r) => r,
            _ => return 0.0,
        };
        let (Some(plane), Some(pa_src), Some(pa_dst), Some(pb_src), Some(pb_dst)) = (
            self.facets.get(facet).map(|f| f.plane),
            self.point(a.src),
            self.point(a.dst),
            self.point(b.src),
            self.point(b.dst),
        ) else {
            return 0.0;
        };
        let dir_self = if vertex == a.src { pa_dst - pa_src } else { pa_src - pa_dst };
        let dir_other = if vertex == b.src { pb_dst - pb_src } else { pb_src - pb_dst };
        let angle = ActiveKernel::angle3(dir_self, dir_other);

        let same_facets = (a.facet_l == b.facet_l && a.facet_r == b.facet_r)
            || (a.facet_l == b.facet_r && a.facet_r == b.facet_l);
        if same_facets {
            return if angle < FRAC_PI_2 { 0.0 } else { PI };
        }
        let turn = ActiveKernel::angle3(plane.normal(), dir_self.cross(dir_other));
        if turn > FRAC_PI_2 {
            angle + PI
        } else {
            angle
        }
    }

    /// `true` if both edges border the same two facets, in either order.
    pub fn has_same_facets(&self, e1: EdgeKey, e2: EdgeKey) -> bool {
        match (self.edges.get(e1), self.edges.get(e2)) {
            (Some(a), Some(b)) => {
                (a.facet_l == b.facet_l && a.facet_r == b.facet_r)
                    || (a.facet_l == b.facet_r && a.facet_r == b.facet_l)
            }
            _ => false,
        }
    }
}

// =============================================================================
// Vertex queries
// =============================================================================

impl Polyhedron {
    /// Number of live incident edges.
    pub fn degree(&self, vertex: VertexKey) -> usize {
        self.vertices.get(vertex).map_or(0, |v| {
            v.edges.iter().filter(|&&e| self.edges.contains_key(e)).count()
        })
    }

    /// An edge joining `vertex` and `to`, in either direction.
    pub fn find_edge_to(&self, vertex: VertexKey, to: VertexKey) -> Option<EdgeKey> {
        self.vertices.get(vertex)?.edges.iter().copied().find(|&e| {
            self.edges
                .get(e)
                .is_some_and(|edge| edge.has_vertex(vertex) && edge.has_vertex(to))
        })
    }

    /// The edge that leaves `vertex` when walking the boundary of `facet`.
    pub fn find_edge_in(&self, vertex: VertexKey, facet: FacetKey) -> Option<EdgeKey> {
        self.vertices
            .get(vertex)?
            .edges
            .iter()
            .copied()
            .find(|&e| self.src_in(e, facet) == Some(vertex))
    }

    /// The corner after `vertex` on the boundary of `facet`.
    pub fn vertex_next_in(&self, vertex: VertexKey, facet: FacetKey) -> Option<VertexKey> {
        let list = &self.facets.get(facet)?.vertices;
        let pos = list.iter().position(|&v| v == vertex)?;
        if list.len() == 1 {
            return Some(vertex);
        }
        let n = list.len();
        (1..n).map(|i| list[(pos + i) % n]).find(|&w| {
            self.edges_between(vertex, w)
                .any(|e| self.dst_in(e, facet) == Some(w))
        })
    }

    /// The corner before `vertex` on the boundary of `facet`.
    pub fn vertex_prev_in(&self, vertex: VertexKey, facet: FacetKey) -> Option<VertexKey> {
        let list = &self.facets.get(facet)?.vertices;
        let pos = list.iter().position(|&v| v == vertex)?;
        if list.len() == 1 {
            return Some(vertex);
        }
        let n = list.len();
        (1..n).map(|i| list[(pos + n - i) % n]).find(|&w| {
            self.edges_between(vertex, w)
                .any(|e| self.src_in(e, facet) == Some(w))
        })
    }

    fn edges_between(&self, a: VertexKey, b: VertexKey) -> impl Iterator<Item = EdgeKey> + '_ {
        self.vertices
            .get(a)
            .map(|v| v.edges.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(move |&e| {
                self.edges
                    .get(e)
                    .is_some_and(|edge| edge.has_vertex(a) && edge.has_vertex(b))
            })
    }
}

// =============================================================================
// Facet queries
// =============================================================================

impl Polyhedron {
    /// First boundary edge of `facet` shared with `other`.
    pub fn find_edge_between(&self, facet: FacetKey, other: FacetKey) -> Option<EdgeKey> {
        self.facets
            .get(facet)?
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges.get(e).is_some_and(|edge| edge.has_facet(other)))
    }

    /// Every boundary edge of `facet` shared with `other`.
    pub fn find_edges_between(&self, facet: FacetKey, other: FacetKey) -> Vec<EdgeKey> {
        self.facets.get(facet).map_or_else(Vec::new, |f| {
            f.edges
                .iter()
                .copied()
                .filter(|&e| self.edges.get(e).is_some_and(|edge| edge.has_facet(other)))
                .collect()
        })
    }

    /// The facet after `facet` counter-clockwise around `vertex`.
    pub fn facet_next_around(&self, facet: FacetKey, vertex: VertexKey) -> Option<FacetKey> {
        self.facet_around(facet, vertex, true)
    }

    /// The facet before `facet` counter-clockwise around `vertex`.
    pub fn facet_prev_around(&self, facet: FacetKey, vertex: VertexKey) -> Option<FacetKey> {
        self.facet_around(facet, vertex, false)
    }

    fn facet_around(&self, facet: FacetKey, vertex: VertexKey, forward: bool) -> Option<FacetKey> {
        let v = self.vertices.get(vertex)?;
        let list = &v.facets;
        let pos = list.iter().position(|&f| f == facet)?;
        if list.len() == 1 {
            return Some(facet);
        }
        let n = list.len();
        (1..n).map(|i| list[(pos + i) % n]).find(|&g| {
            v.edges.iter().any(|&e| {
                let Some(edge) = self.edges.get(e) else {
                    return false;
                };
                let (at_l, at_r) = if forward {
                    (edge.dst, edge.src)
                } else {
                    (edge.src, edge.dst)
                };
                (edge.facet_l == Some(facet) && edge.facet_r == Some(g) && at_l == vertex)
                    || (edge.facet_r == Some(facet) && edge.facet_l == Some(g) && at_r == vertex)
            })
        })
    }
}

// =============================================================================
// Ordering
// =============================================================================

impl Polyhedron {
    fn drop_stale(&mut self, vertex: VertexKey) -> Result<()> {
        let edges = &self.edges;
        let facets = &self.facets;
        let v = self
            .vertices
            .get_mut(vertex)
            .ok_or(Error::VertexNotFound(vertex))?;
        v.edges.retain(|e| edges.contains_key(*e));
        v.facets.retain(|f| facets.contains_key(*f));
        Ok(())
    }

    /// Orders the edges of `vertex` counter-clockwise by walking
    /// [`Polyhedron::next_around`].
    pub fn sort_vertex_edges(&mut self, vertex: VertexKey) -> Result<()> {
        self.drop_stale(vertex)?;
        let Some(&first) = self.vertices[vertex].edges.first() else {
            return Ok(());
        };
        let degree = self.vertices[vertex].edges.len();
        let mut sorted: SmallVec<[EdgeKey; 4]> = SmallVec::new();
        let mut edge = first;
        loop {
            sorted.push(edge);
            edge = self
                .next_around(edge, vertex)
                .ok_or(Error::OpenVertexRing(vertex))?;
            if edge == first {
                break;
            }
            if sorted.len() >= degree {
                return Err(Error::OpenVertexRing(vertex));
            }
        }
        if sorted.len() != degree {
            return Err(Error::OpenVertexRing(vertex));
        }
        self.vertices[vertex].edges = sorted;
        Ok(())
    }

    /// Orders the facets of `vertex` counter-clockwise.
    pub fn sort_vertex_facets(&mut self, vertex: VertexKey) -> Result<()> {
        self.drop_stale(vertex)?;
        let Some(&first) = self.vertices[vertex].facets.first() else {
            return Ok(());
        };
        let count = self.vertices[vertex].facets.len();
        let mut edge = self
            .find_edge_in(vertex, first)
            .ok_or(Error::OpenVertexRing(vertex))?;
        let mut sorted: SmallVec<[FacetKey; 4]> = SmallVec::new();
        let mut facet = first;
        loop {
            sorted.push(facet);
            edge = self
                .next_around(edge, vertex)
                .ok_or(Error::OpenVertexRing(vertex))?;
            facet = self
                .other_facet(edge, facet)
                .ok_or(Error::OpenVertexRing(vertex))?;
            if facet == first {
                break;
            }
            if sorted.len() >= count {
                return Err(Error::OpenVertexRing(vertex));
            }
        }
        if sorted.len() != count {
            return Err(Error::OpenVertexRing(vertex));
        }
        self.vertices[vertex].facets = sorted;
        Ok(())
    }

    /// Orders edges and facets of `vertex` together, so that facet `i` lies
    /// between edge `i` and edge `i + 1`.
    pub fn sort_vertex(&mut self, vertex: VertexKey) -> Result<()> {
        self.drop_stale(vertex)?;
        let Some(&first) = self.vertices[vertex].edges.first() else {
            return Ok(());
        };
        let degree = self.vertices[vertex].edges.len();
        let mut edges: SmallVec<[EdgeKey; 4]> = SmallVec::new();
        let mut facets: SmallVec<[FacetKey; 4]> = SmallVec::new();
        let mut edge = first;
        loop {
            let e = &self.edges[edge];
            let facet = if e.src == vertex { e.facet_l } else { e.facet_r };
            edges.push(edge);
            facets.push(facet.ok_or(Error::OpenVertexRing(vertex))?);
            edge = self
                .next_around(edge, vertex)
                .ok_or(Error::OpenVertexRing(vertex))?;
            if edge == first {
                break;
            }
            if edges.len() >= degree {
                return Err(Error::OpenVertexRing(vertex));
            }
        }
        if edges.len() != degree {
            return Err(Error::OpenVertexRing(vertex));
        }
        let v = &mut self.vertices[vertex];
        v.edges = edges;
        v.facets = facets;
        Ok(())
    }

    /// Orders the corners of `facet` along its boundary, starting at the
    /// current first corner.
    pub fn sort_facet_vertices(&mut self, facet: FacetKey) -> Result<()> {
        let f = self.facets.get(facet).ok_or(Error::FacetNotFound(facet))?;
        let Some(&front) = f.vertices.first() else {
            return Ok(());
        };
        let count = f.edges.len();
        let start = f
            .edges
            .iter()
            .copied()
            .find(|&e| self.src_in(e, facet) == Some(front))
            .ok_or(Error::OpenFacetBoundary(facet))?;
        let mut sorted = Vec::with_capacity(count);
        let mut edge = start;
        loop {
            sorted.push(self.src_in(edge, facet).ok_or(Error::OpenFacetBoundary(facet))?);
            edge = self.next_in(edge, facet).ok_or(Error::OpenFacetBoundary(facet))?;
            if edge == start {
                break;
            }
            if sorted.len() >= count {
                return Err(Error::OpenFacetBoundary(facet));
            }
        }
        self.facets[facet].vertices = sorted;
        Ok(())
    }

    /// Orders the edges of `facet` along its boundary, starting at the
    /// current first edge.
    pub fn sort_facet_edges(&mut self, facet: FacetKey) -> Result<()> {
        let f = self.facets.get(facet).ok_or(Error::FacetNotFound(facet))?;
        let Some(&start) = f.edges.first() else {
            return Ok(());
        };
        let count = f.edges.len();
        let mut sorted = Vec::with_capacity(count);
        let mut edge = start;
        loop {
            sorted.push(edge);
            edge = self.next_in(edge, facet).ok_or(Error::OpenFacetBoundary(facet))?;
            if edge == start {
                break;
            }
            if sorted.len() >= count {
                return Err(Error::OpenFacetBoundary(facet));
            }
        }
        if sorted.len() != count {
            return Err(Error::OpenFacetBoundary(facet));
        }
        self.facets[facet].edges = sorted;
        Ok(())
    }

    /// Sorts every vertex and facet.
    pub fn sort(&mut self) -> Result<()> {
        for v in self.vertex_keys() {
            self.sort_vertex(v)?;
        }
        for f in self.facet_keys() {
            self.sort_facet_edges(f)?;
            self.sort_facet_vertices(f)?;
        }
        Ok(())
    }
}

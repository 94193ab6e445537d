// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rewiring operations: attaching edges to facets, moving endpoints,
//! splitting and collapsing edges and vertices, merging facets.
//!
//! Every operation keeps both directions of each link in step. Endpoint
//! moves update vertex edge lists only; callers that move a corner between
//! facets do so explicitly with [`Polyhedron::facet_add_vertex`] and
//! [`Polyhedron::facet_remove_vertex`].

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::keys::{EdgeKey, FacetKey, VertexKey};
use crate::polyhedron::Polyhedron;

// =============================================================================
// Facet membership
// =============================================================================

impl Polyhedron {
    /// Attaches `edge` to `facet`.
    ///
    /// If the edge does not border the facet yet it takes the first free
    /// slot, left before right. Both endpoints become corners of the facet.
    pub fn facet_add_edge(&mut self, facet: FacetKey, edge: EdgeKey) -> Result<()> {
        if !self.facets.contains_key(facet) {
            return Err(Error::FacetNotFound(facet));
        }
        let e = self.edges.get_mut(edge).ok_or(Error::EdgeNotFound(edge))?;
        if e.facet_l != Some(facet) && e.facet_r != Some(facet) {
            if e.facet_l.is_none() {
                e.facet_l = Some(facet);
            } else if e.facet_r.is_none() {
                e.facet_r = Some(facet);
            } else {
                return Err(Error::Inconsistent(format!(
                    "edge {} already has a left and a right facet",
                    e.id
                )));
            }
        }
        let (src, dst) = (e.src, e.dst);
        let f = &mut self.facets[facet];
        if !f.edges.contains(&edge) {
            f.edges.push(edge);
        }
        self.facet_add_vertex(facet, src);
        self.facet_add_vertex(facet, dst);
        Ok(())
    }

    /// Detaches `edge` from `facet`, clearing the matching slot.
    pub fn facet_remove_edge(&mut self, facet: FacetKey, edge: EdgeKey) -> bool {
        let mut found = false;
        if let Some(e) = self.edges.get_mut(edge) {
            if e.facet_l == Some(facet) {
                e.facet_l = None;
                found = true;
            } else if e.facet_r == Some(facet) {
                e.facet_r = None;
                found = true;
            }
        }
        if let Some(f) = self.facets.get_mut(facet) {
            let before = f.edges.len();
            f.edges.retain(|e| *e != edge);
            found |= f.edges.len() != before;
        }
        found
    }

    /// Makes `vertex` a corner of `facet`.
    pub fn facet_add_vertex(&mut self, facet: FacetKey, vertex: VertexKey) -> bool {
        let (Some(f), Some(v)) = (self.facets.get_mut(facet), self.vertices.get_mut(vertex)) else {
            return false;
        };
        if !f.vertices.contains(&vertex) {
            f.vertices.push(vertex);
        }
        if !v.facets.contains(&facet) {
            v.facets.push(facet);
        }
        true
    }

    /// Removes `vertex` from the corners of `facet`.
    pub fn facet_remove_vertex(&mut self, facet: FacetKey, vertex: VertexKey) -> bool {
        let mut found = false;
        if let Some(f) = self.facets.get_mut(facet) {
            let before = f.vertices.len();
            f.vertices.retain(|v| *v != vertex);
            found = f.vertices.len() != before;
        }
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.facets.retain(|f| *f != facet);
        }
        found
    }

    /// Sets both facet slots of `edge` and attaches it to each facet.
    pub fn attach_edge(&mut self, edge: EdgeKey, facet_l: FacetKey, facet_r: FacetKey) -> Result<()> {
        let e = self.edges.get_mut(edge).ok_or(Error::EdgeNotFound(edge))?;
        e.facet_l = Some(facet_l);
        e.facet_r = Some(facet_r);
        self.facet_add_edge(facet_l, edge)?;
        self.facet_add_edge(facet_r, edge)
    }
}

// =============================================================================
// Endpoint and slot replacement
// =============================================================================

impl Polyhedron {
    /// Moves the source of `edge` to `vertex`.
    pub fn replace_src(&mut self, edge: EdgeKey, vertex: VertexKey) -> Result<()> {
        self.replace_endpoint(edge, vertex, true)
    }

    /// Moves the destination of `edge` to `vertex`.
    pub fn replace_dst(&mut self, edge: EdgeKey, vertex: VertexKey) -> Result<()> {
        self.replace_endpoint(edge, vertex, false)
    }

    /// Moves whichever endpoint of `edge` is `old` to `new`.
    pub fn replace_vertex(&mut self, edge: EdgeKey, old: VertexKey, new: VertexKey) -> Result<()> {
        let e = self.edges.get(edge).ok_or(Error::EdgeNotFound(edge))?;
        if e.src == old {
            self.replace_src(edge, new)
        } else if e.dst == old {
            self.replace_dst(edge, new)
        } else {
            Err(Error::Inconsistent(format!(
                "edge {} does not end at the vertex being replaced",
                e.id
            )))
        }
    }

    fn replace_endpoint(&mut self, edge: EdgeKey, vertex: VertexKey, src: bool) -> Result<()> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        let e = self.edges.get_mut(edge).ok_or(Error::EdgeNotFound(edge))?;
        let slot = if src { &mut e.src } else { &mut e.dst };
        let old = std::mem::replace(slot, vertex);
        let (e_src, e_dst) = (e.src, e.dst);
        if old == vertex {
            return Ok(());
        }
        // the old vertex keeps the edge only if it is still the other endpoint
        if old != e_src && old != e_dst {
            if let Some(v) = self.vertices.get_mut(old) {
                v.edges.retain(|k| *k != edge);
            }
        }
        let v = &mut self.vertices[vertex];
        if !v.edges.contains(&edge) {
            v.edges.push(edge);
        }
        Ok(())
    }

    /// Moves `edge` from its current left facet to `facet`.
    pub fn replace_facet_l(&mut self, edge: EdgeKey, facet: FacetKey) -> Result<()> {
        self.replace_facet(edge, facet, true)
    }

    /// Moves `edge` from its current right facet to `facet`.
    pub fn replace_facet_r(&mut self, edge: EdgeKey, facet: FacetKey) -> Result<()> {
        self.replace_facet(edge, facet, false)
    }

    fn replace_facet(&mut self, edge: EdgeKey, facet: FacetKey, left: bool) -> Result<()> {
        if !self.facets.contains_key(facet) {
            return Err(Error::FacetNotFound(facet));
        }
        let e = self.edges.get(edge).ok_or(Error::EdgeNotFound(edge))?;
        let old = if left { e.facet_l } else { e.facet_r };
        if old == Some(facet) {
            return Ok(());
        }
        if let Some(old) = old {
            if let Some(f) = self.facets.get_mut(old) {
                f.edges.retain(|k| *k != edge);
            }
        }
        let e = &mut self.edges[edge];
        if left {
            e.facet_l = Some(facet);
        } else {
            e.facet_r = Some(facet);
        }
        self.facet_add_edge(facet, edge)
    }
}

// =============================================================================
// Splitting and merging
// =============================================================================

impl Polyhedron {
    /// Splits `edge` at `middle`. The edge keeps its source and now ends at
    /// `middle`; the returned new edge runs `middle → old dst` between the
    /// same facets.
    pub fn split_edge(&mut self, edge: EdgeKey, middle: VertexKey) -> Result<EdgeKey> {
        let e = self.edges.get(edge).ok_or(Error::EdgeNotFound(edge))?;
        let (dst, facet_l, facet_r) = (e.dst, e.facet_l, e.facet_r);
        let second = self.add_edge(middle, dst)?;
        {
            let s = &mut self.edges[second];
            s.facet_l = facet_l;
            s.facet_r = facet_r;
        }
        for f in [facet_l, facet_r].into_iter().flatten() {
            self.facet_add_edge(f, second)?;
        }
        self.replace_dst(edge, middle)?;
        Ok(second)
    }

    /// Splits `vertex` into two vertices joined by a new edge whose left
    /// facet is `left` and right facet is `right`.
    ///
    /// The new vertex takes the edges met when walking counter-clockwise
    /// from `right` to `left`, and the facets in between. Returns `None`
    /// without touching the mesh if the facets coincide, `vertex` is not a
    /// corner of both, or the walk does not reach `left`.
    pub fn split_vertex(
        &mut self,
        vertex: VertexKey,
        left: FacetKey,
        right: FacetKey,
    ) -> Option<(VertexKey, EdgeKey)> {
        if left == right {
            return None;
        }
        let v = self.vertices.get(vertex)?;
        if !v.contains_facet(left) || !v.contains_facet(right) {
            return None;
        }
        let point = v.point;
        let limit = v.edges.len();

        let mut facets: SmallVec<[FacetKey; 4]> = SmallVec::new();
        let mut edges: SmallVec<[EdgeKey; 4]> = SmallVec::new();
        let mut facet = right;
        let mut edge = self.find_edge_in(vertex, right)?;
        while facet != left {
            if edges.len() > limit {
                return None;
            }
            facets.push(facet);
            edge = self.next_around(edge, vertex)?;
            edges.push(edge);
            facet = self.other_facet(edge, facet)?;
        }
        facets.push(left);

        let split = self.add_vertex(point);
        for &e in &edges {
            self.replace_vertex(e, vertex, split).ok()?;
        }
        for &f in &facets {
            if f != left && f != right {
                self.facet_remove_vertex(f, vertex);
            }
            self.facet_add_vertex(f, split);
        }
        let joint = self.add_edge(vertex, split).ok()?;
        self.attach_edge(joint, left, right).ok()?;
        Some((split, joint))
    }

    /// Contracts `edge`, merging its destination into its source. Inverse
    /// of [`Polyhedron::split_vertex`]. Returns the surviving vertex.
    pub fn collapse_edge(&mut self, edge: EdgeKey) -> Option<VertexKey> {
        let e = self.edges.get(edge)?;
        let (keep, gone) = (e.src, e.dst);
        self.remove_edge(edge);

        let moved: SmallVec<[EdgeKey; 4]> = self.vertices.get(gone)?.edges.clone();
        for e in moved {
            self.replace_vertex(e, gone, keep).ok()?;
        }
        let facets: SmallVec<[FacetKey; 4]> = self.vertices.get(gone)?.facets.clone();
        for f in facets {
            self.facet_remove_vertex(f, gone);
            self.facet_add_vertex(f, keep);
        }
        self.remove_vertex(gone);
        Some(keep)
    }

    /// Merges `other` into `facet`. Edges between the two are removed, the
    /// remaining edges of `other` move over and `other` is deleted.
    pub fn merge_facets(&mut self, facet: FacetKey, other: FacetKey) -> bool {
        if facet == other || !self.facets.contains_key(facet) {
            return false;
        }
        let Some(o) = self.facets.get(other) else {
            return false;
        };
        let vertices = o.vertices.clone();
        let edges = o.edges.clone();

        for v in vertices {
            self.facet_remove_vertex(other, v);
            self.facet_add_vertex(facet, v);
        }
        for e in edges {
            let Some(edge) = self.edges.get(e) else {
                continue;
            };
            if edge.has_facet(facet) {
                self.facet_remove_edge(facet, e);
                self.facet_remove_edge(other, e);
                self.remove_edge(e);
            } else {
                let left = edge.facet_l == Some(other);
                self.facet_remove_edge(other, e);
                let edge = &mut self.edges[e];
                if left {
                    edge.facet_l = Some(facet);
                } else {
                    edge.facet_r = Some(facet);
                }
                // slot already points at `facet`, so this only links lists
                let _ = self.facet_add_edge(facet, e);
            }
        }
        self.remove_facet(other);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use straightskel_kernel::Point3;

    fn unit_box() -> Polyhedron {
        Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap()
    }

    fn pyramid() -> (Polyhedron, VertexKey) {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let faces = [
            vec![0, 3, 2, 1],
            vec![0, 1, 4],
            vec![1, 2, 4],
            vec![2, 3, 4],
            vec![3, 0, 4],
        ];
        let p = Polyhedron::from_faces(&points, &faces).unwrap();
        let apex = p
            .vertices()
            .find(|(_, v)| v.point == points[4])
            .map(|(k, _)| k)
            .unwrap();
        (p, apex)
    }

    fn degrees(p: &Polyhedron) -> Vec<usize> {
        let mut d: Vec<usize> = p.vertex_keys().into_iter().map(|v| p.degree(v)).collect();
        d.sort_unstable();
        d
    }

    #[test]
    fn split_edge_inserts_vertex_between_same_facets() {
        let mut p = unit_box();
        let e = p.edge_keys()[0];
        let (src, dst, l, r) = {
            let edge = p.edge(e).unwrap();
            (edge.src(), edge.dst(), edge.facet_l().unwrap(), edge.facet_r().unwrap())
        };
        let mid = p.add_vertex(Point3::midpoint(p.point(src).unwrap(), p.point(dst).unwrap()));
        let second = p.split_edge(e, mid).unwrap();

        assert_eq!(p.edge(e).unwrap().dst(), mid);
        assert_eq!(p.edge(second).unwrap().src(), mid);
        assert_eq!(p.edge(second).unwrap().dst(), dst);
        assert!(p.facet(l).unwrap().contains_vertex(mid));
        assert!(p.facet(r).unwrap().contains_vertex(mid));
        assert!(!p.vertex(dst).unwrap().contains_edge(e));
        assert_eq!(p.edge_count(), 13);
        assert!(p.is_consistent());
        assert_eq!(p.next_in(e, l), Some(second));
    }

    #[test]
    fn split_vertex_of_degree_four() {
        let (mut p, apex) = pyramid();
        assert_eq!(p.degree(apex), 4);
        p.sort_vertex(apex).unwrap();
        let f = p.vertex(apex).unwrap().facets()[0];
        let left = p.facet_next_around(f, apex).unwrap();
        let right = p.facet_prev_around(f, apex).unwrap();

        let (split, joint) = p.split_vertex(apex, left, right).unwrap();
        assert_eq!(p.degree(apex), 3);
        assert_eq!(p.degree(split), 3);
        assert_eq!(p.edge(joint).unwrap().facet_l(), Some(left));
        assert_eq!(p.edge(joint).unwrap().facet_r(), Some(right));
        assert!(p.facet(f).unwrap().contains_vertex(split));
        assert!(!p.facet(f).unwrap().contains_vertex(apex));
        assert!(p.is_consistent());
        p.sort_vertex(apex).unwrap();
        p.sort_vertex(split).unwrap();
    }

    #[test]
    fn split_then_collapse_restores_counts() {
        let (mut p, apex) = pyramid();
        let before = (p.vertex_count(), p.edge_count(), p.facet_count(), degrees(&p));
        p.sort_vertex(apex).unwrap();
        let f = p.vertex(apex).unwrap().facets()[0];
        let left = p.facet_next_around(f, apex).unwrap();
        let right = p.facet_prev_around(f, apex).unwrap();
        let (_, joint) = p.split_vertex(apex, left, right).unwrap();
        assert_eq!(p.vertex_count(), before.0 + 1);
        assert_eq!(p.edge_count(), before.1 + 1);

        let kept = p.collapse_edge(joint).unwrap();
        assert_eq!(kept, apex);
        let after = (p.vertex_count(), p.edge_count(), p.facet_count(), degrees(&p));
        assert_eq!(before, after);
        assert!(p.is_consistent());
        p.sort_vertex(apex).unwrap();
    }

    #[test]
    fn split_vertex_requires_both_facets() {
        let mut p = unit_box();
        let v = p.vertex_keys()[0];
        let foreign = p
            .facet_keys()
            .into_iter()
            .find(|&f| !p.vertex(v).unwrap().contains_facet(f))
            .unwrap();
        let own = p.vertex(v).unwrap().facets()[0];
        let before = p.vertex_count();
        assert!(p.split_vertex(v, foreign, own).is_none());
        assert_eq!(p.vertex_count(), before);
    }

    #[test]
    fn replace_facet_moves_edge_between_lists() {
        let mut p = unit_box();
        let e = p.edge_keys()[0];
        let old = p.edge(e).unwrap().facet_l().unwrap();
        let r = p.edge(e).unwrap().facet_r().unwrap();
        let target = p
            .facet_keys()
            .into_iter()
            .find(|&f| f != old && f != r)
            .unwrap();
        p.replace_facet_l(e, target).unwrap();
        assert!(!p.facet(old).unwrap().contains_edge(e));
        assert!(p.facet(target).unwrap().contains_edge(e));
        assert_eq!(p.edge(e).unwrap().facet_l(), Some(target));
    }

    #[test]
    fn third_facet_rejected() {
        let mut p = unit_box();
        let e = p.edge_keys()[0];
        let f = p.add_facet(straightskel_kernel::Plane3::new(0.0, 0.0, 1.0, 0.0));
        assert!(matches!(p.facet_add_edge(f, e), Err(Error::Inconsistent(_))));
    }

    #[test]
    fn merge_coplanar_facets() {
        // a unit box whose top is cut into two rectangles
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(2.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = [
            vec![0, 3, 2, 1],
            vec![4, 5, 8, 9],
            vec![5, 6, 7, 8],
            vec![0, 1, 6, 5, 4],
            vec![3, 9, 8, 7, 2],
            vec![0, 4, 9, 3],
            vec![1, 2, 7, 6],
        ];
        let mut p = Polyhedron::from_faces(&points, &faces).unwrap();
        let tops: Vec<FacetKey> = p
            .facets()
            .filter(|(_, f)| f.vertices().len() == 4 && f.plane.normal().z > 0.5)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(tops.len(), 2);
        assert!(p.merge_facets(tops[0], tops[1]));
        assert_eq!(p.facet_count(), 6);
        assert_eq!(p.edge_count(), 14);
        assert_eq!(p.facet(tops[0]).unwrap().edges().len(), 6);
        assert!(p.is_consistent());
        p.sort_facet_edges(tops[0]).unwrap();
    }
}

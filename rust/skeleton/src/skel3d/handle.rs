// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology changes applied to the wavefront when an event fires.
//!
//! Every handler runs after the wavefront has been shifted to the event's
//! offset. It rewires the polyhedron, places the vertices that survive at
//! the event node and starts new arcs and sheets where facets meet in a
//! new way.

use smallvec::SmallVec;
use straightskel_kernel::{ActiveKernel, Kernel, Plane3, Point3};
use straightskel_mesh::{EdgeKey, FacetKey, Polyhedron, VertexKey};

use super::{SimpleSkel3d, VertexData};
use crate::config::EdgeEventPolicy;
use crate::error::{Error, Result};
use crate::events::{Event3d, Scheduled, VertexPair};
use crate::keys::NodeKey;
use crate::self_intersection;

fn require<T>(value: Option<T>, event: &'static str, what: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::degenerate(event, what))
}

// ============================================================================
// Dispatch
// ============================================================================

impl SimpleSkel3d {
    /// Applies `event` to the wavefront and records it in the skeleton. The
    /// caller checks that the event is still valid.
    pub(super) fn handle(&mut self, event: Scheduled<Event3d>) -> Result<()> {
        let kind = event.kind();
        self.handled += 1;
        let node = self.event_node(&event);
        self.skel.record_event(kind, event.offset, Some(node));
        tracing::debug!(
            kind = %kind,
            offset = event.offset,
            arcs = event.arcs.len(),
            sheets = event.sheets.len(),
            "Handling event"
        );

        let point = event.point;
        match event.event {
            Event3d::ConstOffset | Event3d::SaveOffset => {}
            Event3d::Edge { edge } => self.handle_edge(edge, point, node)?,
            Event3d::EdgeMerge {
                facet,
                edge_1,
                edge_2,
                ..
            } => self.handle_edge_merge(facet, edge_1, edge_2, point, node)?,
            Event3d::Triangle { facet, edge } => self.handle_triangle(facet, edge, point, node)?,
            Event3d::DblEdgeMerge {
                facet_1,
                facet_2,
                edge_11,
                edge_12,
                edge_21,
                edge_22,
                ..
            } => self.handle_dbl_edge_merge(facet_1, facet_2, [edge_11, edge_12, edge_21, edge_22], node)?,
            Event3d::DblTriangle { edge } => self.handle_dbl_triangle(edge, node)?,
            Event3d::Tetrahedron { edge } => self.handle_tetrahedron(edge)?,
            Event3d::Vertex(pair) => self.handle_vertex(&pair, point, node)?,
            Event3d::FlipVertex(pair) => self.handle_flip_vertex(&pair, point, node)?,
            Event3d::Surface { edge_1, edge_2 } => self.handle_surface(edge_1, edge_2, point, node)?,
            Event3d::PolyhedronSplit { edge_1, edge_2 } => {
                self.handle_polyhedron_split(edge_1, edge_2, point, node)?
            }
            Event3d::SplitMerge(pair) => self.handle_split_merge(&pair, point, node)?,
            Event3d::EdgeSplit { edge_1, edge_2 } => self.handle_edge_split(edge_1, edge_2, point, node)?,
            Event3d::Pierce { vertex, facet } => self.handle_pierce(vertex, facet, point, node)?,
        }

        self.remove_empty_facets();
        Ok(())
    }

    /// `true` if every element named by `event` is still on the wavefront.
    pub(super) fn is_live(&self, event: &Event3d) -> bool {
        let p = &self.polyhedron;
        let pair_live = |pair: &VertexPair| {
            p.contains_vertex(pair.vertex_1)
                && p.contains_vertex(pair.vertex_2)
                && p.contains_facet(pair.facet_1)
                && p.contains_facet(pair.facet_2)
                && [pair.edge_11, pair.edge_12, pair.edge_21, pair.edge_22]
                    .iter()
                    .all(|&e| p.contains_edge(e))
        };
        match *event {
            Event3d::ConstOffset | Event3d::SaveOffset => true,
            Event3d::Edge { edge } | Event3d::DblTriangle { edge } | Event3d::Tetrahedron { edge } => {
                p.contains_edge(edge)
            }
            Event3d::EdgeMerge {
                edge,
                facet,
                edge_1,
                edge_2,
            } => p.contains_facet(facet) && [edge, edge_1, edge_2].iter().all(|&e| p.contains_edge(e)),
            Event3d::Triangle { facet, edge } => p.contains_facet(facet) && p.contains_edge(edge),
            Event3d::DblEdgeMerge {
                edge,
                facet_1,
                facet_2,
                edge_11,
                edge_12,
                edge_21,
                edge_22,
            } => {
                p.contains_facet(facet_1)
                    && p.contains_facet(facet_2)
                    && [edge, edge_11, edge_12, edge_21, edge_22]
                        .iter()
                        .all(|&e| p.contains_edge(e))
            }
            Event3d::Vertex(ref pair) | Event3d::FlipVertex(ref pair) | Event3d::SplitMerge(ref pair) => {
                pair_live(pair)
            }
            Event3d::Surface { edge_1, edge_2 }
            | Event3d::PolyhedronSplit { edge_1, edge_2 }
            | Event3d::EdgeSplit { edge_1, edge_2 } => p.contains_edge(edge_1) && p.contains_edge(edge_2),
            Event3d::Pierce { vertex, facet } => p.contains_vertex(vertex) && p.contains_facet(facet),
        }
    }

    /// The node of `event`, shared with an existing node at the same place
    /// and offset. Arcs of the event end there and its sheets gain it.
    fn event_node(&mut self, event: &Scheduled<Event3d>) -> NodeKey {
        let node = match self.skel.find_node(event.point, event.offset, self.tolerance) {
            Some(node) => node,
            None => self.skel.add_node(event.point, event.offset),
        };
        for &arc in &event.arcs {
            self.skel.end_arc(arc, node);
        }
        for &sheet in &event.sheets {
            self.skel.sheet_add_node(sheet, node);
        }
        node
    }

    /// Moves `vertex` to `point` and makes `node` its origin. Sheets of its
    /// edges gain the node.
    fn place(&mut self, vertex: VertexKey, point: Point3, node: NodeKey) {
        let Some(v) = self.polyhedron.vertex_mut(vertex) else {
            return;
        };
        v.point = point;
        let edges: SmallVec<[EdgeKey; 4]> = v.edges().iter().copied().collect();
        self.vertex_data.insert(vertex, VertexData { node, arc: None });
        for e in edges {
            if let Some(sheet) = self.sheet_of(e) {
                self.skel.sheet_add_node(sheet, node);
            }
        }
    }

    /// Starts arcs at `vertices` and sheets along `edges`.
    fn restart(&mut self, event: &'static str, vertices: &[VertexKey], edges: &[EdgeKey]) -> Result<()> {
        for &e in edges {
            if self.create_sheet(e).is_none() {
                return Err(Error::degenerate(event, "sheet plane"));
            }
        }
        for &v in vertices {
            if self.create_arc(v).is_none() {
                tracing::debug!(
                    event,
                    degree = self.polyhedron.degree(v),
                    "Vertex left without an arc"
                );
            }
        }
        Ok(())
    }

    fn drop_edge(&mut self, edge: EdgeKey) {
        self.polyhedron.remove_edge(edge);
        self.edge_sheet.remove(edge);
    }

    fn drop_vertex(&mut self, vertex: VertexKey) {
        let edges: SmallVec<[EdgeKey; 4]> = self
            .polyhedron
            .vertex(vertex)
            .map(|v| v.edges().iter().copied().collect())
            .unwrap_or_default();
        for e in edges {
            self.edge_sheet.remove(e);
        }
        self.polyhedron.remove_vertex(vertex);
        self.vertex_data.remove(vertex);
    }

    fn remove_empty_facets(&mut self) {
        let empty: Vec<FacetKey> = self
            .polyhedron
            .facets()
            .filter(|(_, f)| f.edges().is_empty())
            .map(|(k, _)| k)
            .collect();
        for f in empty {
            self.polyhedron.remove_facet(f);
        }
    }

    /// The endpoint of `edge` that is not `vertex`.
    fn far_end(&self, edge: EdgeKey, vertex: VertexKey, event: &'static str) -> Result<VertexKey> {
        require(self.polyhedron.other_vertex(edge, vertex), event, "edge endpoint")
    }

    /// The edge at `vertex` bordering both `facet_1` and `facet_2`.
    fn edge_between_at(&self, vertex: VertexKey, facet_1: FacetKey, facet_2: FacetKey) -> Option<EdgeKey> {
        self.polyhedron.vertex(vertex)?.edges().iter().copied().find(|&e| {
            self.polyhedron
                .edge(e)
                .is_some_and(|edge| edge.has_facet(facet_1) && edge.has_facet(facet_2))
        })
    }

    /// The facet at `vertex` that is neither `facet_1` nor `facet_2`.
    fn third_facet(&self, vertex: VertexKey, facet_1: FacetKey, facet_2: FacetKey) -> Option<FacetKey> {
        self.polyhedron
            .vertex(vertex)?
            .facets()
            .iter()
            .copied()
            .find(|&f| f != facet_1 && f != facet_2)
    }
}

// ============================================================================
// Vanishing edges and facets
// ============================================================================

impl SimpleSkel3d {
    /// The four facets around a vanishing edge rebuilt as an open patch at
    /// `point`. The edge runs between `facet_3`/`facet_1`, or between
    /// `facet_0`/`facet_2` when `flipped`. The far ends of the other four
    /// edges have degree 1.
    pub(super) fn edge_patch(
        &self,
        edge: EdgeKey,
        point: Point3,
        facets: [FacetKey; 4],
        flipped: bool,
    ) -> Option<Polyhedron> {
        let p = &self.polyhedron;
        let e = p.edge(edge)?;
        let (src, dst) = (e.src(), e.dst());
        let edge_0 = p.next_around(edge, src)?;
        let edge_1 = p.next_around(edge_0, src)?;
        let edge_2 = p.next_around(edge, dst)?;
        let edge_3 = p.next_around(edge_2, dst)?;
        let ends = [
            p.point(p.other_vertex(edge_0, src)?)?,
            p.point(p.other_vertex(edge_1, src)?)?,
            p.point(p.other_vertex(edge_2, dst)?)?,
            p.point(p.other_vertex(edge_3, dst)?)?,
        ];

        let mut patch = Polyhedron::new();
        let mut sides = [FacetKey::default(); 4];
        for (side, &facet) in sides.iter_mut().zip(&facets) {
            let f = p.facet(facet)?;
            *side = patch.add_facet(f.plane);
            patch.facet_mut(*side)?.speed = f.speed;
        }
        let a = patch.add_vertex(point);
        let b = patch.add_vertex(point);
        let middle = patch.add_edge(a, b).ok()?;
        let centres = if flipped {
            patch.attach_edge(middle, sides[0], sides[2]).ok()?;
            [b, a, a, b]
        } else {
            patch.attach_edge(middle, sides[3], sides[1]).ok()?;
            [a, a, b, b]
        };
        for (i, (&centre, &end)) in centres.iter().zip(&ends).enumerate() {
            let far = patch.add_vertex(end);
            let spoke = patch.add_edge(centre, far).ok()?;
            patch.attach_edge(spoke, sides[i], sides[(i + 3) % 4]).ok()?;
        }
        Some(patch)
    }

    /// Whether the patch stays free of self-intersections one unit further
    /// in.
    pub(super) fn edge_patch_is_valid(&self, edge: EdgeKey, point: Point3, facets: [FacetKey; 4], flipped: bool) -> bool {
        self.edge_patch(edge, point, facets, flipped)
            .and_then(|patch| self_intersection::shifted(&patch, 1.0))
            .is_some_and(|moved| !self_intersection::has_self_intersecting_surface(&moved))
    }

    /// Choice of the configured policy between two valid orientations.
    fn prefers_flip(&self, facets: [FacetKey; 4]) -> bool {
        let planes: SmallVec<[Plane3; 4]> = facets.iter().filter_map(|&f| self.plane(f)).collect();
        if planes.len() < 4 {
            return false;
        }
        // the end facets must meet for the edge to run between them
        if ActiveKernel::intersect_planes(&planes[0], &planes[2]).is_none() {
            return false;
        }
        let across = ActiveKernel::angle_planes(&planes[0], &planes[2]);
        let along = ActiveKernel::angle_planes(&planes[1], &planes[3]);
        match self.config.edge_event_policy {
            EdgeEventPolicy::Convex => across <= along,
            EdgeEventPolicy::Reflex => across >= along,
            EdgeEventPolicy::FlipAlways => true,
        }
    }

    /// Whether an edge vanishing between `facet_1`/`facet_3` reappears
    /// between the end facets `facet_0`/`facet_2`.
    fn flips(&self, edge: EdgeKey, point: Point3, facets: [FacetKey; 4]) -> bool {
        let kept = self.edge_patch_is_valid(edge, point, facets, false);
        let flipped = self.edge_patch_is_valid(edge, point, facets, true);
        match (kept, flipped) {
            (true, false) => false,
            (false, true) => true,
            (true, true) => self.prefers_flip(facets),
            (false, false) => {
                tracing::warn!(
                    offset = self.offset,
                    "Both edge orientations self-intersect, falling back to the edge event policy"
                );
                self.prefers_flip(facets)
            }
        }
    }

    fn handle_edge(&mut self, edge: EdgeKey, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "edge";
        let e = require(self.polyhedron.edge(edge), EVENT, "edge")?;
        let (src, dst) = (e.src(), e.dst());
        let facet_3 = require(e.facet_l(), EVENT, "left facet")?;
        let facet_1 = require(e.facet_r(), EVENT, "right facet")?;
        let facet_0 = require(self.polyhedron.facet_next_around(facet_3, src), EVENT, "source facet")?;
        let facet_2 = require(self.polyhedron.facet_next_around(facet_1, dst), EVENT, "destination facet")?;

        if self.flips(edge, point, [facet_0, facet_1, facet_2, facet_3]) {
            let edge_0 = require(self.polyhedron.next_around(edge, src), EVENT, "edge around source")?;
            let edge_2 = require(self.polyhedron.next_around(edge, dst), EVENT, "edge around destination")?;
            let p = &mut self.polyhedron;
            p.facet_remove_vertex(facet_3, src);
            p.facet_add_vertex(facet_2, src);
            p.facet_remove_vertex(facet_1, dst);
            p.facet_add_vertex(facet_0, dst);
            p.facet_remove_edge(facet_1, edge);
            p.facet_remove_edge(facet_3, edge);
            p.attach_edge(edge, facet_0, facet_2)?;
            p.replace_vertex(edge_0, src, dst)?;
            p.replace_vertex(edge_2, dst, src)?;
            tracing::trace!(offset = self.offset, "Edge flipped");
        }

        self.place(src, point, node);
        self.place(dst, point, node);
        self.restart(EVENT, &[src, dst], &[edge])
    }

    fn handle_edge_merge(
        &mut self,
        facet: FacetKey,
        edge_1: EdgeKey,
        edge_2: EdgeKey,
        point: Point3,
        node: NodeKey,
    ) -> Result<()> {
        const EVENT: &str = "edge merge";
        let p = &self.polyhedron;
        let gone_1 = require(p.next_in(edge_1, facet), EVENT, "first vanishing edge")?;
        let gone_2 = require(p.next_in(gone_1, facet), EVENT, "second vanishing edge")?;
        let vertex = require(p.dst_in(gone_1, facet), EVENT, "middle vertex")?;
        let vertex_1 = require(p.dst_in(edge_1, facet), EVENT, "first merged vertex")?;
        let vertex_2 = require(p.src_in(edge_2, facet), EVENT, "second merged vertex")?;
        let other = require(p.other_facet(edge_1, facet), EVENT, "facet across")?;
        let outer_1 = require(p.prev_in(edge_1, other), EVENT, "edge before")?;
        let outer_2 = require(p.next_in(edge_2, other), EVENT, "edge after")?;
        let far = self.far_end(edge_2, vertex_2, EVENT)?;

        let p = &mut self.polyhedron;
        p.facet_remove_vertex(facet, vertex);
        p.facet_add_vertex(other, vertex);
        p.replace_vertex(outer_1, vertex_1, vertex)?;
        p.replace_vertex(outer_2, vertex_2, vertex)?;
        p.replace_vertex(edge_1, vertex_1, far)?;
        self.drop_edge(gone_1);
        self.drop_edge(gone_2);
        self.drop_edge(edge_2);
        self.drop_vertex(vertex_1);
        self.drop_vertex(vertex_2);

        self.place(vertex, point, node);
        self.restart(EVENT, &[vertex], &[])
    }

    fn handle_triangle(&mut self, facet: FacetKey, edge: EdgeKey, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "triangle";
        let corners = require(self.triangle_vertices(facet, edge), EVENT, "triangle corners")?;
        let sides = require(self.triangle_edges(facet, edge), EVENT, "triangle sides")?;

        if self.polyhedron.facet(facet).is_some_and(|f| f.vertices().len() == 3) {
            self.polyhedron.remove_facet(facet);
        }
        for e in sides {
            self.drop_edge(e);
        }

        let vertex = self.polyhedron.add_vertex(point);
        for corner in corners {
            let rest: SmallVec<[EdgeKey; 2]> = self
                .polyhedron
                .vertex(corner)
                .map(|v| v.edges().iter().copied().collect())
                .unwrap_or_default();
            for e in rest {
                self.polyhedron.replace_vertex(e, corner, vertex)?;
                let facets: SmallVec<[FacetKey; 2]> = self
                    .polyhedron
                    .edge(e)
                    .map(|edge| [edge.facet_l(), edge.facet_r()].into_iter().flatten().collect())
                    .unwrap_or_default();
                for f in facets {
                    self.polyhedron.facet_remove_vertex(f, corner);
                    self.polyhedron.facet_add_vertex(f, vertex);
                }
            }
            self.drop_vertex(corner);
        }

        self.place(vertex, point, node);
        self.restart(EVENT, &[vertex], &[])
    }

    fn handle_dbl_edge_merge(
        &mut self,
        facet_1: FacetKey,
        facet_2: FacetKey,
        edges: [EdgeKey; 4],
        node: NodeKey,
    ) -> Result<()> {
        const EVENT: &str = "double edge merge";
        let [edge_11, edge_12, edge_21, edge_22] = edges;
        let corners = require(self.dbl_merge_vertices(facet_1, facet_2, edges), EVENT, "merged corners")?;
        let gone = require(self.dbl_merge_edges(facet_1, edge_11, edge_12), EVENT, "vanishing edges")?;
        let far_1 = self.far_end(edge_12, corners[2], EVENT)?;
        let far_2 = self.far_end(edge_22, corners[3], EVENT)?;

        for e in gone {
            self.drop_edge(e);
        }
        self.polyhedron.replace_vertex(edge_11, corners[0], far_1)?;
        self.drop_edge(edge_12);
        self.polyhedron.replace_vertex(edge_21, corners[1], far_2)?;
        self.drop_edge(edge_22);
        for v in corners {
            self.drop_vertex(v);
        }
        for e in [edge_11, edge_21] {
            if let Some(sheet) = self.sheet_of(e) {
                self.skel.sheet_add_node(sheet, node);
            }
        }
        Ok(())
    }

    fn handle_dbl_triangle(&mut self, edge: EdgeKey, node: NodeKey) -> Result<()> {
        const EVENT: &str = "double triangle";
        let p = &self.polyhedron;
        let e = require(p.edge(edge), EVENT, "edge")?;
        let (src, dst) = (e.src(), e.dst());
        let facet_l = require(e.facet_l(), EVENT, "left facet")?;
        let facet_r = require(e.facet_r(), EVENT, "right facet")?;
        let next_l = require(p.next_in(edge, facet_l), EVENT, "left next")?;
        let next_r = require(p.next_in(edge, facet_r), EVENT, "right next")?;
        let vertex_l = require(p.dst_in(next_l, facet_l), EVENT, "left apex")?;
        let vertex_r = require(p.dst_in(next_r, facet_r), EVENT, "right apex")?;
        let across_l = require(p.other_facet(next_l, facet_l), EVENT, "facet across left")?;
        let across_r = require(p.other_facet(next_r, facet_r), EVENT, "facet across right")?;
        let outer_l = require(p.prev_in(next_l, across_l), EVENT, "left outer edge")?;
        let outer_r = require(p.prev_in(next_r, across_r), EVENT, "right outer edge")?;
        let sides = require(self.dbl_triangle_edges(edge), EVENT, "triangle sides")?;
        let far_r = self.far_end(outer_r, vertex_r, EVENT)?;

        for f in [facet_l, facet_r] {
            if self.polyhedron.facet(f).is_some_and(|f| f.edges().len() == 3) {
                self.polyhedron.remove_facet(f);
            }
        }
        for e in sides {
            self.drop_edge(e);
        }
        self.polyhedron.replace_vertex(outer_l, vertex_l, far_r)?;
        self.drop_edge(outer_r);
        for v in [src, dst, vertex_l, vertex_r] {
            self.drop_vertex(v);
        }
        if let Some(sheet) = self.sheet_of(outer_l) {
            self.skel.sheet_add_node(sheet, node);
        }
        Ok(())
    }

    fn handle_tetrahedron(&mut self, edge: EdgeKey) -> Result<()> {
        const EVENT: &str = "tetrahedron";
        let corners = require(self.tetrahedron_vertices(edge), EVENT, "corners")?;
        let facets = require(self.tetrahedron_facets(edge), EVENT, "facets")?;
        for v in corners {
            self.drop_vertex(v);
        }
        for f in facets {
            self.polyhedron.remove_facet(f);
        }
        Ok(())
    }
}

// ============================================================================
// Meeting vertices
// ============================================================================

/// Edges and facets around the two vertices of a [`VertexPair`].
struct PairParts {
    /// Edge between the shared facets at `vertex_1`.
    merge_1: EdgeKey,
    /// Edge between the shared facets at `vertex_2`.
    merge_2: EdgeKey,
    facet_1b: FacetKey,
    facet_2b: FacetKey,
}

impl SimpleSkel3d {
    fn pair_parts(&self, pair: &VertexPair, event: &'static str) -> Result<PairParts> {
        let (f1, f2) = (pair.facet_1, pair.facet_2);
        Ok(PairParts {
            merge_1: require(self.edge_between_at(pair.vertex_1, f1, f2), event, "first merging edge")?,
            merge_2: require(self.edge_between_at(pair.vertex_2, f1, f2), event, "second merging edge")?,
            facet_1b: require(self.third_facet(pair.vertex_1, f1, f2), event, "first outer facet")?,
            facet_2b: require(self.third_facet(pair.vertex_2, f1, f2), event, "second outer facet")?,
        })
    }

    /// Merges the edges between the shared facets and swaps the corners of
    /// both vertices over to the outer facets.
    fn merge_pair(&mut self, pair: &VertexPair, parts: &PairParts, event: &'static str) -> Result<()> {
        let (v1, v2) = (pair.vertex_1, pair.vertex_2);
        let far_2 = self.far_end(parts.merge_2, v2, event)?;
        let p = &mut self.polyhedron;
        p.replace_vertex(parts.merge_1, v1, far_2)?;
        p.facet_remove_vertex(pair.facet_1, v2);
        p.facet_remove_vertex(pair.facet_2, v1);
        p.facet_add_vertex(parts.facet_1b, v2);
        p.facet_add_vertex(parts.facet_2b, v1);
        p.replace_vertex(pair.edge_12, v1, v2)?;
        p.replace_vertex(pair.edge_21, v2, v1)?;
        Ok(())
    }

    fn handle_vertex(&mut self, pair: &VertexPair, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "vertex";
        let parts = self.pair_parts(pair, EVENT)?;
        self.merge_pair(pair, &parts, EVENT)?;

        let joint = parts.merge_2;
        let p = &mut self.polyhedron;
        p.replace_src(joint, pair.vertex_1)?;
        p.replace_dst(joint, pair.vertex_2)?;
        p.replace_facet_l(joint, parts.facet_1b)?;
        p.replace_facet_r(joint, parts.facet_2b)?;

        self.place(pair.vertex_1, point, node);
        self.place(pair.vertex_2, point, node);
        self.restart(EVENT, &[pair.vertex_1, pair.vertex_2], &[joint])
    }

    fn handle_flip_vertex(&mut self, pair: &VertexPair, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "flip vertex";
        let (v1, v2) = (pair.vertex_1, pair.vertex_2);
        let edge_1 = require(self.edge_between_at(v1, pair.facet_1, pair.facet_2), EVENT, "first edge")?;
        let edge_2 = require(self.edge_between_at(v2, pair.facet_1, pair.facet_2), EVENT, "second edge")?;
        self.polyhedron.replace_vertex(edge_1, v1, v2)?;
        self.polyhedron.replace_vertex(edge_2, v2, v1)?;

        self.place(v1, point, node);
        self.place(v2, point, node);
        self.restart(EVENT, &[v1, v2], &[])
    }

    fn handle_split_merge(&mut self, pair: &VertexPair, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "split merge";
        let parts = self.pair_parts(pair, EVENT)?;
        let split = require(
            self.walk_to_facet(pair.edge_11, parts.facet_1b, parts.facet_2b),
            EVENT,
            "edge to split",
        )?;
        let s = require(self.polyhedron.edge(split), EVENT, "edge to split")?;
        let (split_src, split_dst) = (s.src(), s.dst());
        let (split_l, split_r) = (
            require(s.facet_l(), EVENT, "left facet")?,
            require(s.facet_r(), EVENT, "right facet")?,
        );
        let forward = split_l == parts.facet_1b && split_r == parts.facet_2b;

        self.merge_pair(pair, &parts, EVENT)?;
        let joint = parts.merge_2;
        let p = &mut self.polyhedron;
        if forward {
            p.replace_src(joint, split_src)?;
            p.replace_dst(joint, pair.vertex_2)?;
            p.replace_src(split, pair.vertex_1)?;
        } else {
            p.replace_dst(joint, split_dst)?;
            p.replace_src(joint, pair.vertex_2)?;
            p.replace_dst(split, pair.vertex_1)?;
        }
        p.replace_facet_l(joint, split_l)?;
        p.replace_facet_r(joint, split_r)?;
        if let Some(sheet) = self.sheet_of(split) {
            self.edge_sheet.insert(joint, sheet);
            self.skel.sheet_add_node(sheet, node);
        }

        self.place(pair.vertex_1, point, node);
        self.place(pair.vertex_2, point, node);
        self.restart(EVENT, &[pair.vertex_1, pair.vertex_2], &[])
    }
}

// ============================================================================
// Crossing edges and piercing vertices
// ============================================================================

impl SimpleSkel3d {
    fn handle_surface(&mut self, edge_1: EdgeKey, edge_2: EdgeKey, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "surface";
        let p = &self.polyhedron;
        let e1 = require(p.edge(edge_1), EVENT, "first edge")?;
        let e2 = require(p.edge(edge_2), EVENT, "second edge")?;
        let (l1, r1) = (require(e1.facet_l(), EVENT, "left facet")?, require(e1.facet_r(), EVENT, "right facet")?);
        let (l2, r2) = (require(e2.facet_l(), EVENT, "left facet")?, require(e2.facet_r(), EVENT, "right facet")?);
        let facet_src = self.facet_src(edge_1);
        let facet_dst = self.facet_dst(edge_1);

        let (at_src, before, after) = if Some(l2) == facet_src {
            (true, p.prev_in(edge_1, l1), p.next_in(edge_1, r1))
        } else if Some(r2) == facet_src {
            (true, p.next_in(edge_1, r1), p.prev_in(edge_1, l1))
        } else if Some(l2) == facet_dst {
            (false, p.prev_in(edge_1, r1), p.next_in(edge_1, l1))
        } else if Some(r2) == facet_dst {
            (false, p.next_in(edge_1, l1), p.prev_in(edge_1, r1))
        } else {
            return Err(Error::degenerate(EVENT, "facet of the crossed edge"));
        };
        let vertex = if at_src { e1.src() } else { e1.dst() };
        let before = require(before, EVENT, "edge before")?;
        let after = require(after, EVENT, "edge after")?;

        let vertex_21 = self.polyhedron.add_vertex(point);
        let vertex_22 = self.polyhedron.add_vertex(point);
        for (edge, split) in [(before, vertex_21), (after, vertex_22)] {
            self.polyhedron.replace_vertex(edge, vertex, split)?;
            let facets: SmallVec<[FacetKey; 2]> = self
                .polyhedron
                .edge(edge)
                .map(|e| [e.facet_l(), e.facet_r()].into_iter().flatten().collect())
                .unwrap_or_default();
            for f in facets {
                self.polyhedron.facet_add_vertex(f, split);
            }
        }

        let tail = self.polyhedron.split_edge(edge_2, vertex)?;
        let edge_21 = self.polyhedron.split_edge(edge_2, vertex_21)?;
        let edge_22 = tail;
        let rest = self.polyhedron.split_edge(edge_22, vertex_22)?;

        let crossed_left = Some(l2) == facet_src || Some(l2) == facet_dst;
        let (side_21, side_22) = if at_src == crossed_left { (l1, r1) } else { (r1, l1) };
        let p = &mut self.polyhedron;
        if crossed_left {
            p.facet_remove_vertex(l2, vertex);
            p.replace_facet_l(edge_21, side_21)?;
            p.replace_facet_l(edge_22, side_22)?;
        } else {
            p.facet_remove_vertex(r2, vertex);
            p.replace_facet_r(edge_21, side_21)?;
            p.replace_facet_r(edge_22, side_22)?;
        }
        if let Some(sheet) = self.sheet_of(edge_2) {
            self.edge_sheet.insert(rest, sheet);
            self.skel.sheet_add_node(sheet, node);
        }

        self.place(vertex, point, node);
        self.place(vertex_21, point, node);
        self.place(vertex_22, point, node);
        self.restart(EVENT, &[vertex, vertex_21, vertex_22], &[edge_21, edge_22])
    }

    fn handle_polyhedron_split(
        &mut self,
        edge_1: EdgeKey,
        edge_2: EdgeKey,
        point: Point3,
        node: NodeKey,
    ) -> Result<()> {
        const EVENT: &str = "polyhedron split";
        let p = &self.polyhedron;
        let e1 = require(p.edge(edge_1), EVENT, "first edge")?;
        let e2 = require(p.edge(edge_2), EVENT, "second edge")?;
        let (l1, r1) = (require(e1.facet_l(), EVENT, "left facet")?, require(e1.facet_r(), EVENT, "right facet")?);
        let (l2, r2) = (require(e2.facet_l(), EVENT, "left facet")?, require(e2.facet_r(), EVENT, "right facet")?);
        let dst_2 = e2.dst();
        let facet_src = self.facet_src(edge_1);
        let facet_dst = self.facet_dst(edge_1);

        let forward = Some(l2) == facet_src && Some(r2) == facet_dst;
        let (vertex_l, vertex_r, around_l, around_r) = if forward {
            (
                e1.src(),
                e1.dst(),
                p.prev_around(edge_1, e1.dst()),
                p.prev_around(edge_1, e1.src()),
            )
        } else {
            (
                e1.dst(),
                e1.src(),
                p.next_around(edge_1, e1.src()),
                p.next_around(edge_1, e1.dst()),
            )
        };
        let around_l = require(around_l, EVENT, "edge around left")?;
        let around_r = require(around_r, EVENT, "edge around right")?;

        let p = &mut self.polyhedron;
        p.replace_vertex(around_l, vertex_r, vertex_l)?;
        p.replace_vertex(around_r, vertex_l, vertex_r)?;
        p.facet_remove_vertex(r1, vertex_l);
        p.facet_add_vertex(r2, vertex_l);
        p.facet_remove_vertex(l1, vertex_r);
        p.facet_add_vertex(l2, vertex_r);

        // edge_1 becomes the far half of edge_2
        p.replace_dst(edge_1, dst_2)?;
        if forward {
            p.replace_dst(edge_2, vertex_l)?;
            p.replace_src(edge_1, vertex_r)?;
        } else {
            p.replace_dst(edge_2, vertex_r)?;
            p.replace_src(edge_1, vertex_l)?;
        }
        p.replace_facet_l(edge_1, l2)?;
        p.replace_facet_r(edge_1, r2)?;
        match self.sheet_of(edge_2) {
            Some(sheet) => {
                self.edge_sheet.insert(edge_1, sheet);
            }
            None => {
                self.edge_sheet.remove(edge_1);
            }
        }

        self.place(vertex_l, point, node);
        self.place(vertex_r, point, node);
        self.restart(EVENT, &[vertex_l, vertex_r], &[])
    }

    fn handle_edge_split(&mut self, edge_1: EdgeKey, edge_2: EdgeKey, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "edge split";
        let p = &self.polyhedron;
        let e1 = require(p.edge(edge_1), EVENT, "first edge")?;
        let e2 = require(p.edge(edge_2), EVENT, "second edge")?;
        let (l1, r1) = (require(e1.facet_l(), EVENT, "left facet")?, require(e1.facet_r(), EVENT, "right facet")?);
        let (l2, r2) = (require(e2.facet_l(), EVENT, "left facet")?, require(e2.facet_r(), EVENT, "right facet")?);
        let line_1 = require(self.line(edge_1), EVENT, "first edge line")?;
        let line_2 = require(self.line(edge_2), EVENT, "second edge line")?;
        let sides = if ActiveKernel::orientation(&line_1, &line_2) > 0 {
            [(r2, r1), (l2, r1), (l2, l1), (r2, l1)]
        } else {
            [(l1, l2), (l1, r2), (r1, r2), (r1, l2)]
        };

        let corners: [VertexKey; 4] = std::array::from_fn(|_| self.polyhedron.add_vertex(point));
        let tail_1 = self.polyhedron.split_edge(edge_1, corners[2])?;
        let tail_2 = self.polyhedron.split_edge(edge_2, corners[3])?;
        self.polyhedron.replace_dst(edge_1, corners[0])?;
        self.polyhedron.replace_dst(edge_2, corners[1])?;
        for (tail, edge) in [(tail_1, edge_1), (tail_2, edge_2)] {
            if let Some(sheet) = self.sheet_of(edge) {
                self.edge_sheet.insert(tail, sheet);
                self.skel.sheet_add_node(sheet, node);
            }
        }

        let mut ring = [edge_1; 4];
        for (i, &(left, right)) in sides.iter().enumerate() {
            let e = self.polyhedron.add_edge(corners[i], corners[(i + 1) % 4])?;
            self.polyhedron.attach_edge(e, left, right)?;
            ring[i] = e;
        }

        for v in corners {
            self.place(v, point, node);
        }
        self.restart(EVENT, &corners, &ring)
    }

    fn handle_pierce(&mut self, vertex: VertexKey, facet: FacetKey, point: Point3, node: NodeKey) -> Result<()> {
        const EVENT: &str = "pierce";
        let first = require(
            self.polyhedron.vertex(vertex).and_then(|v| v.edges().first().copied()),
            EVENT,
            "vertex edge",
        )?;
        let mut edges = [first; 3];
        for i in 1..3 {
            edges[i] = require(self.polyhedron.next_around(edges[i - 1], vertex), EVENT, "edge around vertex")?;
        }
        let mut facets = [facet; 3];
        for (i, &e) in edges.iter().enumerate() {
            let edge = require(self.polyhedron.edge(e), EVENT, "vertex edge")?;
            let side = if edge.src() == vertex { edge.facet_l() } else { edge.facet_r() };
            facets[i] = require(side, EVENT, "facet around vertex")?;
        }

        let corners: [VertexKey; 3] = std::array::from_fn(|_| self.polyhedron.add_vertex(point));
        for i in 0..3 {
            let p = &mut self.polyhedron;
            p.facet_add_vertex(facet, corners[i]);
            p.replace_vertex(edges[i], vertex, corners[i])?;
            p.facet_remove_vertex(facets[i], vertex);
            p.facet_add_vertex(facets[i], corners[i]);
            p.facet_add_vertex(facets[(i + 2) % 3], corners[i]);
        }
        self.drop_vertex(vertex);

        let mut ring = [first; 3];
        for i in 0..3 {
            let e = self.polyhedron.add_edge(corners[i], corners[(i + 1) % 3])?;
            self.polyhedron.attach_edge(e, facet, facets[i])?;
            ring[i] = e;
        }

        for v in corners {
            self.place(v, point, node);
        }
        self.restart(EVENT, &corners, &ring)
    }
}

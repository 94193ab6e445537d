// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event detection against the current wavefront.
//!
//! Every detector scans the whole wavefront and schedules each candidate
//! it finds; the queue decides which one comes first. Offsets are measured
//! from the current offset, so a detector only sees events ahead of the
//! wavefront.

use smallvec::SmallVec;
use straightskel_kernel::{ActiveKernel, Kernel, Line3, Plane3, Point3};
use straightskel_mesh::{EdgeKey, FacetKey, VertexKey};

use super::SimpleSkel3d;
use crate::events::{Event3d, Scheduled, VertexPair};
use crate::keys::ArcKey;
use crate::line_in_facet::is_line_in_facet;

type Candidate = Scheduled<Event3d>;

/// Upper bound on boundary walks inside one facet.
const MAX_WALK: usize = 4096;

// ============================================================================
// Entry point
// ============================================================================

impl SimpleSkel3d {
    /// Schedules every event the current wavefront admits.
    pub(super) fn detect(&mut self) {
        let mut found: Vec<Candidate> = Vec::new();
        self.detect_edge_events(&mut found);
        self.detect_edge_merge_events(&mut found);
        self.detect_triangle_events(&mut found);
        self.detect_dbl_edge_merge_events(&mut found);
        self.detect_dbl_triangle_events(&mut found);
        self.detect_tetrahedron_events(&mut found);
        self.detect_vertex_pair_events(&mut found);
        self.detect_surface_events(&mut found);
        self.detect_polyhedron_split_events(&mut found);
        self.detect_edge_split_events(&mut found);
        self.detect_pierce_events(&mut found);

        for event in found {
            tracing::trace!(
                kind = %event.kind(),
                offset = event.offset,
                x = event.point.x,
                y = event.point.y,
                z = event.point.z,
                "Event candidate"
            );
            self.queue.push(event);
        }
    }
}

// ============================================================================
// Shape queries
// ============================================================================

impl SimpleSkel3d {
    /// `true` if `facet` is bounded by exactly three edges, one of them
    /// `edge`.
    pub(super) fn is_triangle(&self, facet: FacetKey, edge: EdgeKey) -> bool {
        let Some(f) = self.polyhedron.facet(facet) else {
            return false;
        };
        if !f.contains_edge(edge) {
            return false;
        }
        let mut current = edge;
        for _ in 0..3 {
            match self.polyhedron.next_in(current, facet) {
                Some(next) => current = next,
                None => return false,
            }
        }
        current == edge
    }

    /// The corners of the tetrahedron around `edge`: its endpoints and the
    /// far corners of its two facets.
    pub(super) fn tetrahedron_vertices(&self, edge: EdgeKey) -> Option<[VertexKey; 4]> {
        let e = self.polyhedron.edge(edge)?;
        let (l, r) = (e.facet_l()?, e.facet_r()?);
        let far_l = self.polyhedron.dst_in(self.polyhedron.next_in(edge, l)?, l)?;
        let far_r = self.polyhedron.dst_in(self.polyhedron.next_in(edge, r)?, r)?;
        Some([e.src(), e.dst(), far_l, far_r])
    }

    pub(super) fn tetrahedron_edges(&self, edge: EdgeKey) -> Option<[EdgeKey; 6]> {
        let e = self.polyhedron.edge(edge)?;
        let (l, r) = (e.facet_l()?, e.facet_r()?);
        let next_l = self.polyhedron.next_in(edge, l)?;
        let other = self.polyhedron.other_facet(next_l, l)?;
        Some([
            edge,
            self.polyhedron.prev_in(edge, l)?,
            next_l,
            self.polyhedron.prev_in(edge, r)?,
            self.polyhedron.next_in(edge, r)?,
            self.polyhedron.prev_in(next_l, other)?,
        ])
    }

    pub(super) fn tetrahedron_facets(&self, edge: EdgeKey) -> Option<[FacetKey; 4]> {
        let e = self.polyhedron.edge(edge)?;
        let (l, r) = (e.facet_l()?, e.facet_r()?);
        Some([
            l,
            r,
            self.polyhedron.facet_prev_around(l, e.dst())?,
            self.polyhedron.facet_prev_around(r, e.src())?,
        ])
    }

    /// `true` if the four corners around `edge` are pairwise joined.
    pub(super) fn is_tetrahedron(&self, edge: EdgeKey) -> bool {
        let Some(vertices) = self.tetrahedron_vertices(edge) else {
            return false;
        };
        (0..4).all(|i| {
            (1..4).all(|j| {
                self.polyhedron
                    .find_edge_to(vertices[i], vertices[(i + j) % 4])
                    .is_some()
            })
        })
    }

    pub(super) fn triangle_vertices(&self, facet: FacetKey, edge: EdgeKey) -> Option<[VertexKey; 3]> {
        let next = self.polyhedron.next_in(edge, facet)?;
        Some([
            self.polyhedron.src_in(edge, facet)?,
            self.polyhedron.dst_in(edge, facet)?,
            self.polyhedron.dst_in(next, facet)?,
        ])
    }

    pub(super) fn triangle_edges(&self, facet: FacetKey, edge: EdgeKey) -> Option<[EdgeKey; 3]> {
        Some([
            edge,
            self.polyhedron.next_in(edge, facet)?,
            self.polyhedron.prev_in(edge, facet)?,
        ])
    }

    pub(super) fn dbl_triangle_vertices(&self, edge: EdgeKey) -> Option<[VertexKey; 4]> {
        self.tetrahedron_vertices(edge)
    }

    pub(super) fn dbl_triangle_edges(&self, edge: EdgeKey) -> Option<[EdgeKey; 5]> {
        let e = self.polyhedron.edge(edge)?;
        let (l, r) = (e.facet_l()?, e.facet_r()?);
        Some([
            edge,
            self.polyhedron.next_in(edge, l)?,
            self.polyhedron.prev_in(edge, l)?,
            self.polyhedron.next_in(edge, r)?,
            self.polyhedron.prev_in(edge, r)?,
        ])
    }

    /// Corners that meet in a double edge merge: the ends of `edge_11` and
    /// `edge_21` and the starts of `edge_12` and `edge_22`.
    pub(super) fn dbl_merge_vertices(
        &self,
        facet_1: FacetKey,
        facet_2: FacetKey,
        edges: [EdgeKey; 4],
    ) -> Option<[VertexKey; 4]> {
        let [edge_11, edge_12, edge_21, edge_22] = edges;
        Some([
            self.polyhedron.dst_in(edge_11, facet_1)?,
            self.polyhedron.dst_in(edge_21, facet_2)?,
            self.polyhedron.src_in(edge_12, facet_1)?,
            self.polyhedron.src_in(edge_22, facet_2)?,
        ])
    }

    /// Edges that vanish in a double edge merge: the two after `edge_11`
    /// in `facet_1` and the two after `edge_12` on its other side.
    pub(super) fn dbl_merge_edges(
        &self,
        facet_1: FacetKey,
        edge_11: EdgeKey,
        edge_12: EdgeKey,
    ) -> Option<[EdgeKey; 4]> {
        let first = self.polyhedron.next_in(edge_11, facet_1)?;
        let second = self.polyhedron.next_in(first, facet_1)?;
        let other = self.polyhedron.other_facet(edge_11, facet_1)?;
        let third = self.polyhedron.next_in(edge_12, other)?;
        let fourth = self.polyhedron.next_in(third, other)?;
        Some([first, second, third, fourth])
    }

    /// The edge reached by zig-zagging around `edge` through four facets.
    ///
    /// Starting on the left the walk goes next, prev, next, prev; starting
    /// on the right it goes prev, next, prev, next. Returning to `edge`
    /// means both neighbouring facets merge at once.
    fn merge_loop_end(&self, edge: EdgeKey, from_left: bool) -> Option<EdgeKey> {
        let e = self.polyhedron.edge(edge)?;
        let mut facet = if from_left { e.facet_l()? } else { e.facet_r()? };
        let mut current = edge;
        for step in 0..4 {
            let forward = (step % 2 == 0) == from_left;
            current = if forward {
                self.polyhedron.next_in(current, facet)?
            } else {
                self.polyhedron.prev_in(current, facet)?
            };
            if step < 3 {
                facet = self.polyhedron.other_facet(current, facet)?;
            }
        }
        Some(current)
    }

    fn closes_merge_loop(&self, edge: EdgeKey, from_left: bool) -> bool {
        self.merge_loop_end(edge, from_left) == Some(edge)
    }

    /// The edge pairs around `edge` in `facet` that would merge if `edge`
    /// and one neighbour vanished: `(prev, next.next)` and
    /// `(prev.prev, next)`.
    fn merge_pairs(&self, edge: EdgeKey, facet: FacetKey) -> SmallVec<[(EdgeKey, EdgeKey); 2]> {
        let mut pairs = SmallVec::new();
        let p = &self.polyhedron;
        let prev = p.prev_in(edge, facet);
        let next = p.next_in(edge, facet);
        if let (Some(a), Some(b)) = (prev, next.and_then(|n| p.next_in(n, facet))) {
            pairs.push((a, b));
        }
        if let (Some(a), Some(b)) = (prev.and_then(|n| p.prev_in(n, facet)), next) {
            pairs.push((a, b));
        }
        pairs
    }

    /// `true` if any endpoint of `a` coincides with an endpoint of `b`.
    fn shares_point(&self, a: EdgeKey, b: EdgeKey) -> bool {
        let (Some(ea), Some(eb)) = (self.polyhedron.edge(a), self.polyhedron.edge(b)) else {
            return true;
        };
        [ea.src(), ea.dst()]
            .into_iter()
            .any(|v| self.same_point(v, eb.src()) || self.same_point(v, eb.dst()))
    }

    /// `true` if an edge joins an endpoint of `a` to an endpoint of `b`.
    fn ends_joined(&self, a: EdgeKey, b: EdgeKey) -> bool {
        let (Some(ea), Some(eb)) = (self.polyhedron.edge(a), self.polyhedron.edge(b)) else {
            return true;
        };
        [ea.src(), ea.dst()].into_iter().any(|v| {
            self.polyhedron.find_edge_to(v, eb.src()).is_some()
                || self.polyhedron.find_edge_to(v, eb.dst()).is_some()
        })
    }

    fn facets_of(&self, edge: EdgeKey) -> Option<(FacetKey, FacetKey)> {
        let e = self.polyhedron.edge(edge)?;
        Some((e.facet_l()?, e.facet_r()?))
    }
}

// ============================================================================
// Meeting points
// ============================================================================

impl SimpleSkel3d {
    /// Where the sheets of `edge` and of its neighbours in its left facet
    /// meet, if that point is not ahead of the facet.
    pub(super) fn vanishes_at(&self, edge: EdgeKey) -> Option<Point3> {
        let e = self.polyhedron.edge(edge)?;
        let facet = e.facet_l().or(e.facet_r())?;
        let prev = self.polyhedron.prev_in(edge, facet)?;
        let next = self.polyhedron.next_in(edge, facet)?;
        let point = ActiveKernel::intersect_planes3(
            &self.sheet_plane(edge)?,
            &self.sheet_plane(prev)?,
            &self.sheet_plane(next)?,
        )?;
        (ActiveKernel::side_plane(&self.plane(facet)?, point) <= 0).then_some(point)
    }

    /// Where `edge_1` and `edge_2` run into each other.
    ///
    /// Both edges travel along the line where their sheets meet. The point
    /// must lie within the wedges swept by each edge, bounded by the arcs
    /// of endpoints that do not touch the other edge.
    pub(super) fn crash_at(&self, edge_1: EdgeKey, edge_2: EdgeKey) -> Option<Point3> {
        let sheet_1 = self.sheet_plane(edge_1)?;
        let sheet_2 = self.sheet_plane(edge_2)?;
        let line = ActiveKernel::intersect_planes(&sheet_1, &sheet_2)?;

        let e1 = self.polyhedron.edge(edge_1)?;
        let e2 = self.polyhedron.edge(edge_2)?;
        let (facet_1, facet_2) = (e1.facet_l()?, e2.facet_l()?);
        let plane_1 = self.plane(facet_1)?;
        let plane_2 = self.plane(facet_2)?;
        let point_1 = ActiveKernel::intersect_plane_line(&plane_1, &line)?;
        let point_2 = ActiveKernel::intersect_plane_line(&plane_2, &line)?;
        let direction = point_2 - point_1;
        let distance = direction.length();

        let moved_1 = ActiveKernel::intersect_plane_line(&self.moved_plane(facet_1, 1.0)?, &line)?;
        let moved_2 = ActiveKernel::intersect_plane_line(&self.moved_plane(facet_2, 1.0)?, &line)?;
        let mut speed_1 = (moved_1 - point_1).length();
        if (moved_1 - point_1).dot(direction) < 0.0 {
            speed_1 = -speed_1;
        }
        let mut speed_2 = (moved_2 - point_2).length();
        if (moved_2 - point_2).dot(direction) < 0.0 {
            speed_2 = -speed_2;
        }
        let point = if distance == 0.0 {
            point_1
        } else {
            if speed_1 == speed_2 {
                return None;
            }
            let dist_1 = distance * speed_1 / (speed_1 - speed_2);
            ActiveKernel::offset_point3(point_1, direction, dist_1)
        };

        let bounded = self.within_wedge(edge_1, edge_2, &sheet_1, point)?
            && self.within_wedge(edge_2, edge_1, &sheet_2, point)?;
        bounded.then_some(point)
    }

    /// `true` if `point` lies within the wedge swept by `edge`. Endpoints
    /// next to a facet of `other` do not bound the wedge.
    fn within_wedge(
        &self,
        edge: EdgeKey,
        other: EdgeKey,
        sheet: &Plane3,
        point: Point3,
    ) -> Option<bool> {
        let e = self.polyhedron.edge(edge)?;
        let o = self.polyhedron.edge(other)?;
        let normal = Line3::new(point, sheet.normal());
        if ActiveKernel::orientation(&self.line(edge)?, &normal) <= 0 {
            return Some(false);
        }
        let touches = |facet: Option<FacetKey>| facet.is_some_and(|f| o.has_facet(f));
        if !touches(self.facet_src(edge))
            && ActiveKernel::orientation(&self.arc_line(e.src())?, &normal) > 0
        {
            return Some(false);
        }
        if !touches(self.facet_dst(edge))
            && ActiveKernel::orientation(&self.arc_line(e.dst())?, &normal) < 0
        {
            return Some(false);
        }
        Some(true)
    }

    /// `true` if `point` lies in the region bounded by `edge` and the arcs
    /// at both its ends.
    fn bounds_point(&self, edge: EdgeKey, point: Point3) -> bool {
        let bounded = || -> Option<bool> {
            let e = self.polyhedron.edge(edge)?;
            let normal = Line3::new(point, self.sheet_plane(edge)?.normal());
            Some(
                ActiveKernel::orientation(&self.line(edge)?, &normal) >= 0
                    && ActiveKernel::orientation(&self.arc_line(e.src())?, &normal) <= 0
                    && ActiveKernel::orientation(&self.arc_line(e.dst())?, &normal) >= 0,
            )
        };
        bounded().unwrap_or(false)
    }
}

// ============================================================================
// Vanishing edges
// ============================================================================

impl SimpleSkel3d {
    fn detect_edge_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if self.has_zero_length(edge) {
                continue;
            }
            let Some(e) = self.polyhedron.edge(edge) else {
                continue;
            };
            let (src, dst) = (e.src(), e.dst());
            let Some((facet_l, facet_r)) = self.facets_of(edge) else {
                continue;
            };
            if self.is_triangle(facet_l, edge) || self.is_triangle(facet_r, edge) {
                continue;
            }
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            // an edge between the end facets that bounds the point turns
            // this into a polyhedron split
            if let (Some(facet_src), Some(facet_dst)) = (self.facet_src(edge), self.facet_dst(edge)) {
                let splits = self
                    .polyhedron
                    .find_edges_between(facet_src, facet_dst)
                    .into_iter()
                    .any(|other| self.bounds_point(other, point));
                if splits {
                    continue;
                }
            }
            let merges = [facet_l, facet_r].into_iter().any(|f| {
                self.merge_pairs(edge, f)
                    .into_iter()
                    .any(|(a, b)| self.polyhedron.has_same_facets(a, b))
            });
            if merges {
                continue;
            }
            let Some(offset) = self.offset_at(facet_l, point) else {
                continue;
            };
            found.push(
                Scheduled::new(Event3d::Edge { edge }, offset, point)
                    .with_arcs([self.arc_of(src), self.arc_of(dst)])
                    .with_sheets([self.sheet_of(edge)]),
            );
        }
    }

    fn detect_edge_merge_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if self.has_zero_length(edge) {
                continue;
            }
            let Some((facet_l, facet_r)) = self.facets_of(edge) else {
                continue;
            };
            if self.is_triangle(facet_l, edge) || self.is_triangle(facet_r, edge) {
                continue;
            }
            if self.closes_merge_loop(edge, true) || self.closes_merge_loop(edge, false) {
                continue;
            }
            let mut chosen = None;
            for facet in [facet_l, facet_r] {
                for (a, b) in self.merge_pairs(edge, facet) {
                    if a != b && self.polyhedron.has_same_facets(a, b) {
                        chosen = Some((facet, a, b));
                    }
                }
            }
            let Some((facet, edge_1, edge_2)) = chosen else {
                continue;
            };
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            let Some(offset) = self.offset_at(facet_l, point) else {
                continue;
            };
            let p = &self.polyhedron;
            let Some(gone_1) = p.next_in(edge_1, facet) else {
                continue;
            };
            let Some(gone_2) = p.next_in(gone_1, facet) else {
                continue;
            };
            let vertices = [
                p.src_in(gone_1, facet),
                p.dst_in(gone_1, facet),
                p.dst_in(gone_2, facet),
            ];
            found.push(
                Scheduled::new(
                    Event3d::EdgeMerge {
                        edge,
                        facet,
                        edge_1,
                        edge_2,
                    },
                    offset,
                    point,
                )
                .with_arcs(vertices.into_iter().map(|v| v.and_then(|v| self.arc_of(v))))
                .with_sheets([self.sheet_of(gone_1), self.sheet_of(gone_2)]),
            );
        }
    }

    fn detect_triangle_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if self.has_zero_length(edge) || self.is_tetrahedron(edge) {
                continue;
            }
            let Some((facet_l, facet_r)) = self.facets_of(edge) else {
                continue;
            };
            let facet = if self.is_triangle(facet_l, edge) {
                facet_l
            } else if self.is_triangle(facet_r, edge) {
                facet_r
            } else {
                continue;
            };
            let Some(edges) = self.triangle_edges(facet, edge) else {
                continue;
            };
            let double = edges.iter().any(|&t| {
                self.facets_of(t)
                    .is_some_and(|(l, r)| self.is_triangle(l, t) && self.is_triangle(r, t))
            });
            if double {
                continue;
            }
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            // a triangle left behind by a pierce may open outwards
            let outside = [facet_l, facet_r].into_iter().any(|f| {
                self.plane(f)
                    .is_some_and(|plane| ActiveKernel::side_plane(&plane, point) > 0)
            });
            if outside {
                continue;
            }
            let Some(offset) = self.offset_at(facet, point) else {
                continue;
            };
            let Some(vertices) = self.triangle_vertices(facet, edge) else {
                continue;
            };
            found.push(
                Scheduled::new(Event3d::Triangle { facet, edge }, offset, point)
                    .with_arcs(vertices.map(|v| self.arc_of(v)))
                    .with_sheets(edges.map(|e| self.sheet_of(e))),
            );
        }
    }

    fn detect_dbl_edge_merge_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if !self.is_reflex(edge) {
                continue;
            }
            let Some((facet_l, facet_r)) = self.facets_of(edge) else {
                continue;
            };
            let p = &self.polyhedron;
            let twice_next = |f: FacetKey| p.next_in(edge, f).and_then(|n| p.next_in(n, f));
            let twice_prev = |f: FacetKey| p.prev_in(edge, f).and_then(|n| p.prev_in(n, f));

            let mut chosen = None;
            if self.closes_merge_loop(edge, true) {
                chosen = Some((
                    facet_l,
                    facet_r,
                    [p.prev_in(edge, facet_l), twice_next(facet_l)],
                    [p.prev_in(edge, facet_r), twice_next(facet_r)],
                ));
            }
            if self.closes_merge_loop(edge, false) {
                chosen = Some((
                    facet_r,
                    facet_l,
                    [twice_prev(facet_r), p.next_in(edge, facet_r)],
                    [twice_prev(facet_l), p.next_in(edge, facet_l)],
                ));
            }
            let Some((facet_1, facet_2, [Some(edge_11), Some(edge_12)], [Some(edge_21), Some(edge_22)])) =
                chosen
            else {
                continue;
            };
            if edge_11 == edge_12 || edge_21 == edge_22 {
                continue;
            }
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            let Some(offset) = self.offset_at(facet_l, point) else {
                continue;
            };
            let (Some(vertices), Some(edges)) = (
                self.dbl_merge_vertices(facet_1, facet_2, [edge_11, edge_12, edge_21, edge_22]),
                self.dbl_merge_edges(facet_1, edge_11, edge_12),
            ) else {
                continue;
            };
            found.push(
                Scheduled::new(
                    Event3d::DblEdgeMerge {
                        edge,
                        facet_1,
                        facet_2,
                        edge_11,
                        edge_12,
                        edge_21,
                        edge_22,
                    },
                    offset,
                    point,
                )
                .with_arcs(vertices.map(|v| self.arc_of(v)))
                .with_sheets(edges.map(|e| self.sheet_of(e))),
            );
        }
    }

    fn detect_dbl_triangle_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if self.is_tetrahedron(edge) {
                continue;
            }
            let Some((facet_l, facet_r)) = self.facets_of(edge) else {
                continue;
            };
            if !(self.is_triangle(facet_l, edge) && self.is_triangle(facet_r, edge)) {
                continue;
            }
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            let Some(offset) = self.offset_at(facet_l, point) else {
                continue;
            };
            let (Some(vertices), Some(edges)) =
                (self.dbl_triangle_vertices(edge), self.dbl_triangle_edges(edge))
            else {
                continue;
            };
            found.push(
                Scheduled::new(Event3d::DblTriangle { edge }, offset, point)
                    .with_arcs(vertices.map(|v| self.arc_of(v)))
                    .with_sheets(edges.map(|e| self.sheet_of(e))),
            );
        }
    }

    fn detect_tetrahedron_events(&self, found: &mut Vec<Candidate>) {
        for edge in self.polyhedron.edge_keys() {
            if !self.is_tetrahedron(edge) {
                continue;
            }
            let Some((facet_l, _)) = self.facets_of(edge) else {
                continue;
            };
            let Some(point) = self.vanishes_at(edge) else {
                continue;
            };
            let Some(offset) = self.offset_at(facet_l, point) else {
                continue;
            };
            let (Some(vertices), Some(edges)) =
                (self.tetrahedron_vertices(edge), self.tetrahedron_edges(edge))
            else {
                continue;
            };
            found.push(
                Scheduled::new(Event3d::Tetrahedron { edge }, offset, point)
                    .with_arcs(vertices.map(|v| self.arc_of(v)))
                    .with_sheets(edges.map(|e| self.sheet_of(e))),
            );
        }
    }
}

// ============================================================================
// Meeting vertices
// ============================================================================

/// How the edges at two vertices sharing two facets are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairKind {
    Vertex,
    FlipVertex,
    SplitMerge,
}

impl SimpleSkel3d {
    /// Non-convex vertices that share exactly two facets without sharing an
    /// edge, with the facets ordered so that `facet_2` follows `facet_1`
    /// around `vertex_1`.
    pub(super) fn vertex_pairs(&self) -> Vec<VertexPair> {
        let p = &self.polyhedron;
        let mut pairs = Vec::new();
        for vertex_1 in p.vertex_keys() {
            if self.is_convex_vertex(vertex_1) {
                continue;
            }
            let Some(v1) = p.vertex(vertex_1) else {
                continue;
            };
            let mut others: Vec<VertexKey> = v1
                .facets()
                .iter()
                .filter_map(|&f| p.facet(f))
                .flat_map(|f| f.vertices().iter().copied())
                .collect();
            others.sort_unstable();
            others.dedup();

            for vertex_2 in others {
                if vertex_1 == vertex_2
                    || self.same_point(vertex_1, vertex_2)
                    || self.is_convex_vertex(vertex_2)
                    || p.find_edge_to(vertex_1, vertex_2).is_some()
                {
                    continue;
                }
                if let Some(pair) = self.vertex_pair(vertex_1, vertex_2) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    fn vertex_pair(&self, vertex_1: VertexKey, vertex_2: VertexKey) -> Option<VertexPair> {
        let p = &self.polyhedron;
        let v1 = p.vertex(vertex_1)?;
        let v2 = p.vertex(vertex_2)?;
        let shared: SmallVec<[FacetKey; 2]> = v1
            .facets()
            .iter()
            .copied()
            .filter(|f| v2.facets().contains(f))
            .collect();
        if shared.len() != 2 {
            return None;
        }
        let (mut facet_1, mut facet_2) = (shared[0], shared[1]);
        if p.facet_next_around(facet_1, vertex_1) != Some(facet_2) {
            std::mem::swap(&mut facet_1, &mut facet_2);
        }
        // two corners apart along a shared facet is an edge merge
        for f in [facet_1, facet_2] {
            let next2 = p.vertex_next_in(vertex_1, f).and_then(|v| p.vertex_next_in(v, f));
            let prev2 = p.vertex_prev_in(vertex_1, f).and_then(|v| p.vertex_prev_in(v, f));
            if next2 == Some(vertex_2) || prev2 == Some(vertex_2) {
                return None;
            }
        }

        let (edge_11, edge_12) = self.edges_along(vertex_1, facet_1, facet_2);
        let (edge_21, edge_22) = self.edges_along(vertex_2, facet_1, facet_2);
        Some(VertexPair {
            vertex_1,
            vertex_2,
            facet_1,
            facet_2,
            edge_11: edge_11?,
            edge_12: edge_12?,
            edge_21: edge_21?,
            edge_22: edge_22?,
        })
    }

    /// The edges at `vertex` bordering `facet_1` but not `facet_2`, and
    /// bordering `facet_2` but not `facet_1`.
    pub(super) fn edges_along(
        &self,
        vertex: VertexKey,
        facet_1: FacetKey,
        facet_2: FacetKey,
    ) -> (Option<EdgeKey>, Option<EdgeKey>) {
        let mut along_1 = None;
        let mut along_2 = None;
        let Some(v) = self.polyhedron.vertex(vertex) else {
            return (None, None);
        };
        for &edge in v.edges() {
            let Some(e) = self.polyhedron.edge(edge) else {
                continue;
            };
            if e.has_facet(facet_1) && !e.has_facet(facet_2) {
                along_1 = Some(edge);
            } else if e.has_facet(facet_2) && !e.has_facet(facet_1) {
                along_2 = Some(edge);
            }
        }
        (along_1, along_2)
    }

    /// `true` if some edge of `facet_b` other than `start` also borders
    /// `facet_c`.
    pub(super) fn facet_reaches(&self, start: EdgeKey, facet_b: FacetKey, facet_c: FacetKey) -> bool {
        self.walk_to_facet(start, facet_b, facet_c).is_some()
    }

    /// Walks the boundary of `facet_b` from `start` to the first edge that
    /// also borders `facet_c`.
    pub(super) fn walk_to_facet(
        &self,
        start: EdgeKey,
        facet_b: FacetKey,
        facet_c: FacetKey,
    ) -> Option<EdgeKey> {
        let mut current = self.polyhedron.next_in(start, facet_b)?;
        for _ in 0..MAX_WALK {
            if current == start {
                return None;
            }
            let e = self.polyhedron.edge(current)?;
            if e.has_facet(facet_b) && e.has_facet(facet_c) {
                return Some(current);
            }
            current = self.polyhedron.next_in(current, facet_b)?;
        }
        None
    }

    fn classify_pair(&self, pair: &VertexPair) -> Option<PairKind> {
        let p = &self.polyhedron;
        let (v1, v2) = (pair.vertex_1, pair.vertex_2);
        let facet_1b = p.facet_next_around(pair.facet_2, v1)?;

        let mut facet_2b_split = p.facet_next_around(pair.facet_1, v2)?;
        if facet_2b_split == pair.facet_2 {
            facet_2b_split = p.facet_next_around(facet_2b_split, v2)?;
        }
        if self.facet_reaches(pair.edge_11, facet_1b, facet_2b_split) {
            return Some(PairKind::SplitMerge);
        }

        let ccw = p.next_around(pair.edge_11, v1) == Some(pair.edge_12)
            && p.next_around(pair.edge_22, v2) == Some(pair.edge_21);
        let cw = p.next_around(pair.edge_12, v1) == Some(pair.edge_11)
            && p.next_around(pair.edge_21, v2) == Some(pair.edge_22);
        if ccw || cw {
            let facet_2b = p.facet_next_around(pair.facet_1, v2)?;
            return (!self.facet_reaches(pair.edge_11, facet_1b, facet_2b)).then_some(PairKind::Vertex);
        }

        let flipped = p.next_around(pair.edge_12, v1) == Some(pair.edge_11)
            && p.next_around(pair.edge_22, v2) == Some(pair.edge_21);
        if flipped {
            let facet_2b = p.facet_next_around(pair.facet_2, v2)?;
            return (!self.facet_reaches(pair.edge_11, facet_1b, facet_2b))
                .then_some(PairKind::FlipVertex);
        }
        None
    }

    fn detect_vertex_pair_events(&self, found: &mut Vec<Candidate>) {
        for pair in self.vertex_pairs() {
            let Some(kind) = self.classify_pair(&pair) else {
                continue;
            };
            let Some(point) = self.crash_at(pair.edge_11, pair.edge_22) else {
                continue;
            };
            let Some(facet) = self.polyhedron.edge(pair.edge_11).and_then(|e| e.facet_l()) else {
                continue;
            };
            let Some(offset) = self.offset_at(facet, point) else {
                continue;
            };
            let event = match kind {
                PairKind::Vertex => Event3d::Vertex(pair),
                PairKind::FlipVertex => Event3d::FlipVertex(pair),
                PairKind::SplitMerge => Event3d::SplitMerge(pair),
            };
            found.push(
                Scheduled::new(event, offset, point)
                    .with_arcs([self.arc_of(pair.vertex_1), self.arc_of(pair.vertex_2)]),
            );
        }
    }
}

// ============================================================================
// Crossing edges
// ============================================================================

impl SimpleSkel3d {
    /// Arcs of the endpoints of `edge_1` whose third facet is a facet of
    /// `edge_2`.
    fn touching_arcs(&self, edge_1: EdgeKey, edge_2: EdgeKey) -> [Option<ArcKey>; 2] {
        let (Some(e1), Some(e2)) = (self.polyhedron.edge(edge_1), self.polyhedron.edge(edge_2)) else {
            return [None, None];
        };
        let touches = |facet: Option<FacetKey>| facet.is_some_and(|f| e2.has_facet(f));
        [
            touches(self.facet_src(edge_1))
                .then(|| self.arc_of(e1.src()))
                .flatten(),
            touches(self.facet_dst(edge_1))
                .then(|| self.arc_of(e1.dst()))
                .flatten(),
        ]
    }

    fn push_crossing(&self, found: &mut Vec<Candidate>, event: Event3d, edge_1: EdgeKey, edge_2: EdgeKey) {
        let Some(point) = self.crash_at(edge_1, edge_2) else {
            return;
        };
        let Some(facet) = self.polyhedron.edge(edge_1).and_then(|e| e.facet_l()) else {
            return;
        };
        let Some(offset) = self.offset_at(facet, point) else {
            return;
        };
        found.push(
            Scheduled::new(event, offset, point)
                .with_sheets([self.sheet_of(edge_1), self.sheet_of(edge_2)])
                .with_arcs(self.touching_arcs(edge_1, edge_2)),
        );
    }

    /// `true` if exactly one facet of `edge` is `a` or `b` while the other
    /// is not the partner: the edge is touched at one end only.
    fn touches_one_end(&self, edge: EdgeKey, a: FacetKey, b: FacetKey) -> bool {
        let Some((l, r)) = self.facets_of(edge) else {
            return false;
        };
        (l == a && r != b) || (l == b && r != a) || (r == a && l != b) || (r == b && l != a)
    }

    fn detect_surface_events(&self, found: &mut Vec<Candidate>) {
        let p = &self.polyhedron;
        for edge_1 in p.edge_keys() {
            let (Some(facet_1_src), Some(facet_1_dst)) = (self.facet_src(edge_1), self.facet_dst(edge_1)) else {
                continue;
            };
            let Some((l1, r1)) = self.facets_of(edge_1) else {
                continue;
            };
            let candidates: Vec<EdgeKey> = [facet_1_src, facet_1_dst]
                .into_iter()
                .filter_map(|f| p.facet(f))
                .flat_map(|f| f.edges().iter().copied())
                .collect();
            for edge_2 in candidates {
                if edge_1 == edge_2 {
                    continue;
                }
                let Some((l2, r2)) = self.facets_of(edge_2) else {
                    continue;
                };
                if l1 == l2 || l1 == r2 || r1 == l2 || r1 == r2 {
                    continue;
                }
                if self.shares_point(edge_1, edge_2) {
                    continue;
                }
                if !self.touches_one_end(edge_2, facet_1_src, facet_1_dst) {
                    continue;
                }
                let (Some(facet_2_src), Some(facet_2_dst)) = (self.facet_src(edge_2), self.facet_dst(edge_2)) else {
                    continue;
                };
                // edge_2 reaching back to a facet of edge_1 is a flip vertex
                if self.touches_one_end(edge_1, facet_2_src, facet_2_dst) {
                    continue;
                }
                // a single edge in between cannot split the surface
                if self.ends_joined(edge_1, edge_2) {
                    continue;
                }
                let vertex_event = (l1 == facet_2_src && facet_1_src == l2)
                    || (l1 == facet_2_dst && facet_1_src == r2)
                    || (r1 == facet_2_src && facet_1_dst == l2)
                    || (r1 == facet_2_dst && facet_1_dst == r2)
                    || (r1 == facet_2_src && facet_1_src == r2)
                    || (r1 == facet_2_dst && facet_1_src == l2)
                    || (l1 == facet_2_src && facet_1_dst == r2)
                    || (l1 == facet_2_dst && facet_1_dst == l2);
                if vertex_event {
                    continue;
                }
                let split_merge = p.find_edges_between(l1, r1).into_iter().any(|other| {
                    if other == edge_1 {
                        return false;
                    }
                    let ends = [self.facet_src(other), self.facet_dst(other)];
                    if facet_1_src == l2 || facet_1_dst == l2 {
                        ends.contains(&Some(r2))
                    } else if facet_1_src == r2 || facet_1_dst == r2 {
                        ends.contains(&Some(l2))
                    } else {
                        false
                    }
                });
                if split_merge {
                    continue;
                }
                self.push_crossing(found, Event3d::Surface { edge_1, edge_2 }, edge_1, edge_2);
            }
        }
    }

    fn detect_polyhedron_split_events(&self, found: &mut Vec<Candidate>) {
        let p = &self.polyhedron;
        for edge_1 in p.edge_keys() {
            if !self.is_reflex(edge_1) {
                continue;
            }
            let (Some(facet_1_src), Some(facet_1_dst)) = (self.facet_src(edge_1), self.facet_dst(edge_1)) else {
                continue;
            };
            let candidates: Vec<EdgeKey> = p
                .facet(facet_1_src)
                .map(|f| f.edges().to_vec())
                .unwrap_or_default();
            for edge_2 in candidates {
                if edge_1 == edge_2 || self.shares_point(edge_1, edge_2) {
                    continue;
                }
                let Some((l2, r2)) = self.facets_of(edge_2) else {
                    continue;
                };
                let between = (l2 == facet_1_src && r2 == facet_1_dst)
                    || (l2 == facet_1_dst && r2 == facet_1_src);
                if !between || self.ends_joined(edge_1, edge_2) {
                    continue;
                }
                self.push_crossing(found, Event3d::PolyhedronSplit { edge_1, edge_2 }, edge_1, edge_2);
            }
        }
    }

    fn detect_edge_split_events(&self, found: &mut Vec<Candidate>) {
        let reflex: Vec<EdgeKey> = self
            .polyhedron
            .edge_keys()
            .into_iter()
            .filter(|&e| self.is_reflex(e))
            .collect();
        for (i, &edge_1) in reflex.iter().enumerate() {
            let (Some(facet_1_src), Some(facet_1_dst)) = (self.facet_src(edge_1), self.facet_dst(edge_1)) else {
                continue;
            };
            let Some((l1, r1)) = self.facets_of(edge_1) else {
                continue;
            };
            for &edge_2 in &reflex[i + 1..] {
                let Some((l2, r2)) = self.facets_of(edge_2) else {
                    continue;
                };
                if l1 == l2 || l1 == r2 || r1 == l2 || r1 == r2 {
                    continue;
                }
                if self.shares_point(edge_1, edge_2) {
                    continue;
                }
                let between = (l2 == facet_1_src && r2 == facet_1_dst)
                    || (l2 == facet_1_dst && r2 == facet_1_src);
                if between {
                    continue;
                }
                let (Some(facet_2_src), Some(facet_2_dst)) = (self.facet_src(edge_2), self.facet_dst(edge_2)) else {
                    continue;
                };
                if self.touches_one_end(edge_2, facet_1_src, facet_1_dst)
                    || self.touches_one_end(edge_1, facet_2_src, facet_2_dst)
                {
                    continue;
                }
                self.push_crossing(found, Event3d::EdgeSplit { edge_1, edge_2 }, edge_1, edge_2);
            }
        }
    }
}

// ============================================================================
// Piercing vertices
// ============================================================================

impl SimpleSkel3d {
    /// Offset and point at which reflex `vertex` moving along its arc meets
    /// the moving plane of `facet`.
    fn pierce_at(&self, vertex: VertexKey, facet: FacetKey) -> Option<(f64, Point3)> {
        let point = self.polyhedron.point(vertex)?;
        let arc = self.skel.arc(self.arc_of(vertex)?)?;
        let f = self.polyhedron.facet(facet)?;
        let norm = f.plane.normal().length();
        if norm == 0.0 {
            return None;
        }
        let unit = f.plane.normal() / norm;
        let distance = f.plane.eval(point) / norm;
        let approach = unit.dot(arc.direction) + f.speed;
        if approach <= 0.0 {
            return None;
        }
        let t = (-distance / approach).max(0.0);
        Some((self.offset + t, point + arc.direction * t))
    }

    fn detect_pierce_events(&self, found: &mut Vec<Candidate>) {
        let p = &self.polyhedron;
        for vertex in p.vertex_keys() {
            if !self.is_reflex_vertex(vertex) {
                continue;
            }
            let (Some(v), Some(point), Some(arc_line)) = (p.vertex(vertex), p.point(vertex), self.arc_line(vertex))
            else {
                continue;
            };
            for (facet, f) in p.facets() {
                if f.vertices().iter().any(|&w| self.same_point(w, vertex)) {
                    continue;
                }
                let adjacent = v.edges().iter().any(|&edge| {
                    p.edge(edge).is_some_and(|e| {
                        let src = e.facet_l().and_then(|l| p.facet_next_around(l, e.src()));
                        let dst = e.facet_r().and_then(|r| p.facet_next_around(r, e.dst()));
                        src == Some(facet) || dst == Some(facet)
                    })
                });
                if adjacent {
                    continue;
                }
                if ActiveKernel::side_plane(&f.plane, point) > 0 {
                    continue;
                }
                if !is_line_in_facet(p, facet, &arc_line) {
                    continue;
                }
                let Some((offset, hit)) = self.pierce_at(vertex, facet) else {
                    continue;
                };
                found.push(
                    Scheduled::new(Event3d::Pierce { vertex, facet }, offset, hit)
                        .with_arcs([self.arc_of(vertex)]),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkeletonConfig;
    use crate::events::EventKind;
    use crate::skel3d::fixtures;
    use approx::assert_relative_eq;
    use straightskel_mesh::Polyhedron;

    fn engine(polyhedron: &Polyhedron) -> SimpleSkel3d {
        let mut engine = SimpleSkel3d::new(polyhedron, SkeletonConfig::default()).unwrap();
        engine.init().unwrap();
        engine
    }

    fn tall_box() -> Polyhedron {
        Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 4.0)).unwrap()
    }

    #[test]
    fn short_edges_vanish_at_the_box_axis() {
        let engine = engine(&tall_box());
        let mut short = 0;
        for edge in engine.polyhedron.edge_keys() {
            let (src, dst) = {
                let e = engine.polyhedron.edge(edge).unwrap();
                (engine.polyhedron.point(e.src()).unwrap(), engine.polyhedron.point(e.dst()).unwrap())
            };
            if (dst - src).length() > 2.5 {
                continue;
            }
            short += 1;
            let p = engine.vanishes_at(edge).unwrap();
            assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
            assert_relative_eq!(p.y, 1.0, epsilon = 1e-9);
            assert!((p.z - 1.0).abs() < 1e-9 || (p.z - 3.0).abs() < 1e-9);
            let facet = engine.polyhedron.edge(edge).unwrap().facet_l().unwrap();
            assert_relative_eq!(engine.offset_at(facet, p).unwrap(), 1.0, epsilon = 1e-9);
        }
        assert_eq!(short, 8);
    }

    #[test]
    fn box_schedules_edge_events_first() {
        let mut engine = engine(&tall_box());
        engine.detect();
        let first = engine.queue.pop().unwrap();
        assert_eq!(first.kind(), crate::events::EventKind::Edge);
        assert_relative_eq!(first.offset, 1.0, epsilon = 1e-9);
        assert_eq!(first.arcs.len(), 2);
        assert_eq!(first.sheets.len(), 1);
    }

    #[test]
    fn tetrahedron_is_recognised_from_every_edge() {
        let tetra = Polyhedron::make_tetrahedron(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        let engine = engine(&tetra);
        for edge in engine.polyhedron.edge_keys() {
            assert!(engine.is_tetrahedron(edge));
            let (l, r) = engine.facets_of(edge).unwrap();
            assert!(engine.is_triangle(l, edge));
            assert!(engine.is_triangle(r, edge));
        }
    }

    #[test]
    fn box_has_no_triangles_or_tetrahedra() {
        let engine = engine(&tall_box());
        for edge in engine.polyhedron.edge_keys() {
            assert!(!engine.is_tetrahedron(edge));
            let (l, r) = engine.facets_of(edge).unwrap();
            assert!(!engine.is_triangle(l, edge));
            assert!(!engine.is_triangle(r, edge));
        }
        assert!(engine.vertex_pairs().is_empty());
    }

    /// Every candidate scheduled on the input wavefront, earliest first.
    fn scheduled(polyhedron: &Polyhedron) -> Vec<Candidate> {
        let mut engine = engine(polyhedron);
        engine.detect();
        std::iter::from_fn(|| engine.queue.pop()).collect()
    }

    fn assert_scheduled(events: &[Candidate], kind: EventKind, offset: f64, point: Point3) {
        let hit = events
            .iter()
            .any(|e| e.kind() == kind && (e.offset - offset).abs() < 1e-9 && (e.point - point).length() < 1e-9);
        assert!(hit, "no {kind} event at offset {offset} at {point:?}");
    }

    fn first_offset(events: &[Candidate]) -> f64 {
        events.first().map(|e| e.offset).unwrap()
    }

    #[test]
    fn right_prism_ends_in_two_triangles() {
        let events = scheduled(&fixtures::right_prism());
        assert_relative_eq!(first_offset(&events), 1.0, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::Triangle, 1.0, Point3::new(1.0, 1.0, 1.0));
        assert_scheduled(&events, EventKind::Triangle, 1.0, Point3::new(1.0, 1.0, 9.0));
    }

    #[test]
    fn tooth_on_an_edge_merges_its_footprint() {
        // the tooth's footprint is a triangle with inradius (sqrt(5) - 1) / 2
        let r = (5f64.sqrt() - 1.0) / 2.0;
        let events = scheduled(&fixtures::edge_tooth());
        assert_relative_eq!(first_offset(&events), r, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::EdgeMerge, r, Point3::new(3.0, r, 4.0 - r));
        assert_scheduled(&events, EventKind::Triangle, r, Point3::new(3.0, r, 5.0 - r));
    }

    #[test]
    fn bump_on_an_edge_meets_the_block_corner() {
        let events = scheduled(&fixtures::edge_bump());
        assert_relative_eq!(first_offset(&events), 1.0, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::Vertex, 1.0, Point3::new(3.0, 1.0, 3.0));
        assert_scheduled(&events, EventKind::Edge, 1.0, Point3::new(3.0, 1.0, 4.0));
    }

    #[test]
    fn groove_corners_pierce_the_side_faces() {
        let events = scheduled(&fixtures::edge_groove());
        assert_relative_eq!(first_offset(&events), 1.0, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::Pierce, 1.0, Point3::new(1.0, 4.0, 2.0));
        assert_scheduled(&events, EventKind::Pierce, 1.0, Point3::new(5.0, 4.0, 2.0));
        assert_scheduled(&events, EventKind::Surface, 1.0, Point3::new(1.0, 4.0, 3.0));
        assert_scheduled(&events, EventKind::Surface, 1.0, Point3::new(5.0, 1.0, 2.0));
    }

    #[test]
    fn crossed_slots_split_each_other() {
        let events = scheduled(&fixtures::cross_slotted_block());
        assert_relative_eq!(first_offset(&events), 0.5, epsilon = 1e-9);
        for (x, y) in [(6.5, 3.5), (6.5, 7.0), (3.0, 3.5), (3.0, 7.0)] {
            assert_scheduled(&events, EventKind::EdgeSplit, 0.5, Point3::new(x, y, 2.0));
        }
        assert!(events
            .iter()
            .take_while(|e| e.offset < 0.5 + 1e-9)
            .all(|e| e.kind() == EventKind::EdgeSplit));
    }

    #[test]
    fn wedge_edge_runs_into_the_slot() {
        // along the slot wall x = 4 - t the top sinks to (4 - t) / 2 - t * sqrt(5) / 2
        // and the bottom rises to t: they meet at the slot corner
        let t = 2.0 / (1.5 + 1.25f64.sqrt());
        let events = scheduled(&fixtures::slotted_wedge());
        assert_relative_eq!(first_offset(&events), t, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::PolyhedronSplit, t, Point3::new(4.0 - t, 5.0 - t, t));
    }

    #[test]
    fn shelf_in_a_corner_pairs_vertices_both_ways() {
        let events = scheduled(&fixtures::shelved_corner());
        assert_relative_eq!(first_offset(&events), 1.5, epsilon = 1e-9);
        assert_scheduled(&events, EventKind::Vertex, 1.5, Point3::new(8.5, 6.0, 3.0));
        assert_scheduled(&events, EventKind::FlipVertex, 2.0, Point3::new(9.0, 6.5, 3.5));
    }
}


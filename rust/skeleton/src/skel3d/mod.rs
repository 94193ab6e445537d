// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Straight skeleton of a polyhedron by wavefront simulation.
//!
//! Every facet moves inward along its plane normal at its own speed. A
//! vertex of degree three travels along an arc, an edge sweeps a sheet.
//! Vertices of higher degree are split into degree-three vertices joined
//! by zero-length edges before the simulation starts.
//!
//! Each round detects every kind of event against the current wavefront,
//! handles every event at the smallest offset as one batch and detects
//! again. The
//! detectors live in `detect.rs`, the topology changes in `handle.rs`.

mod detect;
#[cfg(test)]
mod fixtures;
mod handle;

use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SecondaryMap;
use smallvec::SmallVec;
use straightskel_kernel::{ActiveKernel, Kernel, Line3, Plane3, Point3, Vector3};
use straightskel_mesh::{EdgeKey, FacetKey, Highlight, Polyhedron, VertexKey};

use crate::config::SkeletonConfig;
use crate::error::{Error, Result};
use crate::events::{next_const_offset, Event3d, EventKind, EventQueue, Scheduled};
use crate::graph::StraightSkeleton;
use crate::keys::{ArcKey, NodeKey, SheetKey};
use crate::splitter;

/// Smallest volume spanned by three unit facet normals that still pins a
/// vertex down.
const CORNER_EPS: f64 = 1e-9;

/// Degenerate shape of a wavefront part without volume.
#[derive(Debug, Clone, Copy)]
enum FlatShape {
    Point,
    /// Through the point, along the axis.
    Line(Point3, Vector3),
    Plane,
}

/// Skeleton state of a wavefront vertex.
#[derive(Debug, Clone, Copy)]
struct VertexData {
    node: NodeKey,
    arc: Option<ArcKey>,
}

/// Polyhedron skeleton engine.
///
/// # Example
///
/// ```
/// use straightskel_kernel::Point3;
/// use straightskel_mesh::Polyhedron;
/// use straightskel_skeleton::{EventKind, SimpleSkel3d, SkeletonConfig};
///
/// let tetra = Polyhedron::make_tetrahedron(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// )
/// .unwrap();
/// let skel = SimpleSkel3d::compute(&tetra, SkeletonConfig::default()).unwrap();
/// assert_eq!(skel.count_events(EventKind::Tetrahedron), 1);
/// assert!(skel.arcs().all(|(_, arc)| !arc.is_ray()));
/// ```
#[derive(Debug)]
pub struct SimpleSkel3d {
    config: SkeletonConfig,
    polyhedron: Polyhedron,
    skel: StraightSkeleton,
    vertex_data: SecondaryMap<VertexKey, VertexData>,
    edge_sheet: SecondaryMap<EdgeKey, SheetKey>,
    queue: EventQueue<Event3d>,
    offset: f64,
    handled: usize,
    /// Distance below which wavefront vertices coincide.
    tolerance: f64,
}

impl SimpleSkel3d {
    /// Prepares a run on a copy of `polyhedron`.
    ///
    /// The input must be closed: every edge borders two facets and every
    /// facet moves at a positive speed.
    pub fn new(polyhedron: &Polyhedron, config: SkeletonConfig) -> Result<Self> {
        config.validate()?;
        if polyhedron.facet_count() < 4 {
            return Err(Error::InvalidInput(format!(
                "polyhedron needs at least 4 facets, got {}",
                polyhedron.facet_count()
            )));
        }
        polyhedron.check_consistency()?;
        if let Some((_, e)) = polyhedron
            .edges()
            .find(|(_, e)| e.facet_l().is_none() || e.facet_r().is_none())
        {
            return Err(Error::InvalidInput(format!(
                "edge {} does not border two facets",
                e.id()
            )));
        }
        if let Some((_, f)) = polyhedron.facets().find(|(_, f)| !(f.speed > 0.0)) {
            return Err(Error::InvalidInput(format!(
                "facet {} has non-positive speed {}",
                f.id(),
                f.speed
            )));
        }

        let tolerance = match polyhedron.bounding_box() {
            Some((min, max)) => config.eps * (max - min).length().max(1.0),
            None => config.eps,
        };
        let mut working = polyhedron.clone();
        working.sort()?;
        Ok(Self {
            config,
            polyhedron: working,
            skel: StraightSkeleton::new(),
            vertex_data: SecondaryMap::new(),
            edge_sheet: SecondaryMap::new(),
            queue: EventQueue::new(),
            offset: 0.0,
            handled: 0,
            tolerance,
        })
    }

    /// Computes the skeleton of `polyhedron`.
    pub fn compute(polyhedron: &Polyhedron, config: SkeletonConfig) -> Result<StraightSkeleton> {
        Self::new(polyhedron, config)?.run()
    }

    /// The wavefront in its current state.
    pub fn polyhedron(&self) -> &Polyhedron {
        &self.polyhedron
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Runs the simulation to the end and returns the skeleton.
    pub fn run(mut self) -> Result<StraightSkeleton> {
        let start = Instant::now();
        tracing::info!(
            vertices = self.polyhedron.vertex_count(),
            edges = self.polyhedron.edge_count(),
            facets = self.polyhedron.facet_count(),
            "Starting polyhedron skeleton"
        );
        self.init()?;
        if self.config.const_offset > 0.0 {
            let next = next_const_offset(0.0, self.config.const_offset);
            self.queue.push(Scheduled::at_offset(Event3d::ConstOffset, next));
        }
        for &offset in &self.config.save_offsets {
            self.queue.push(Scheduled::at_offset(Event3d::SaveOffset, offset));
        }
        self.detect();

        while !self.polyhedron.is_empty() && self.queue.has_topological() {
            let Some(mut event) = self.queue.pop() else {
                break;
            };
            if event.offset > self.config.max_offset {
                tracing::debug!(offset = event.offset, "Next event beyond max offset");
                break;
            }
            match event.event {
                Event3d::ConstOffset => {
                    self.record_offset(event.offset, EventKind::ConstOffset)?;
                    let next = next_const_offset(event.offset, self.config.const_offset);
                    self.queue.push(Scheduled::at_offset(Event3d::ConstOffset, next));
                    continue;
                }
                Event3d::SaveOffset => {
                    self.record_offset(event.offset, EventKind::SaveOffset)?;
                    continue;
                }
                _ => {}
            }

            event.set_highlight(true);
            let offset = event.offset.max(self.offset);
            let mut batch = vec![event];
            while let Some(next) = self.queue.peek_offset() {
                if next > offset + self.config.eps {
                    break;
                }
                match self.queue.pop() {
                    Some(e) if matches!(e.event, Event3d::ConstOffset | Event3d::SaveOffset) => {
                        self.queue.push(e);
                        break;
                    }
                    Some(e) => batch.push(e),
                    None => break,
                }
            }

            self.shift_facets(offset - self.offset)?;
            self.offset = offset;
            self.collapse_flat_components();
            for event in batch {
                if self.handled >= self.config.max_events {
                    return Err(Error::EventLimit(self.config.max_events));
                }
                if !self.still_valid(&event) {
                    self.record_consumed(&event);
                    continue;
                }
                self.handle(event)?;
                self.settle_vertices();
                self.collapse_flat_components();
            }
            self.queue.advance_epoch();
            self.detect();
        }

        tracing::info!(
            nodes = self.skel.node_count(),
            arcs = self.skel.arc_count(),
            sheets = self.skel.sheet_count(),
            events = self.skel.events().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Polyhedron skeleton finished"
        );
        Ok(self.skel)
    }

    // ========================================================================
    // Initialisation
    // ========================================================================

    fn init(&mut self) -> Result<()> {
        for v in self.polyhedron.vertex_keys() {
            if self.polyhedron.degree(v) < 3 {
                continue;
            }
            let Some(point) = self.polyhedron.point(v) else {
                continue;
            };
            let node = self.skel.add_node(point, 0.0);
            self.vertex_data.insert(v, VertexData { node, arc: None });
        }

        let splits = splitter::split_vertices(&mut self.polyhedron, self.config.vertex_splitter)?;
        for (vertex, split) in splits {
            if let Some(&data) = self.vertex_data.get(vertex) {
                self.vertex_data.insert(split, VertexData { node: data.node, arc: None });
            }
        }

        for v in self.polyhedron.vertex_keys() {
            if self.create_arc(v).is_none() {
                tracing::warn!(
                    vertex = self.polyhedron.vertex(v).map_or(0, |v| v.id()),
                    degree = self.polyhedron.degree(v),
                    "No arc for vertex"
                );
            }
        }
        for e in self.polyhedron.edge_keys() {
            if self.create_sheet(e).is_none() {
                return Err(Error::degenerate("init", "sheet plane"));
            }
        }
        Ok(())
    }

    /// Starts the arc of a degree-3 vertex at its node.
    ///
    /// The direction is the displacement of the corner of its three facet
    /// planes when every plane moves one unit of offset.
    fn create_arc(&mut self, vertex: VertexKey) -> Option<ArcKey> {
        if self.polyhedron.degree(vertex) != 3 {
            return None;
        }
        let v = self.polyhedron.vertex(vertex)?;
        let facets: SmallVec<[FacetKey; 3]> = v.facets().iter().copied().take(3).collect();
        let edges: SmallVec<[EdgeKey; 3]> = v.edges().iter().copied().collect();
        if facets.len() < 3 {
            return None;
        }
        let planes: SmallVec<[Plane3; 3]> =
            facets.iter().filter_map(|&f| self.plane(f)).collect();
        let moved: SmallVec<[Plane3; 3]> = facets
            .iter()
            .filter_map(|&f| self.moved_plane(f, 1.0))
            .collect();
        if planes.len() < 3 || moved.len() < 3 {
            return None;
        }
        let src = ActiveKernel::intersect_planes3(&planes[0], &planes[1], &planes[2])?;
        let dst = ActiveKernel::intersect_planes3(&moved[0], &moved[1], &moved[2])?;

        let data = self.vertex_data.get_mut(vertex)?;
        let arc = self.skel.add_arc(data.node, dst - src);
        data.arc = Some(arc);
        for e in edges {
            if let Some(&sheet) = self.edge_sheet.get(e) {
                self.skel.sheet_add_arc(sheet, arc);
            }
        }
        Some(arc)
    }

    /// Creates the sheet swept by `edge` and makes it the edge's sheet.
    ///
    /// Between facets of equal speed the sheet is their bisector; otherwise
    /// it passes through the edge line and the line where both facets meet
    /// after one unit of offset.
    fn create_sheet(&mut self, edge: EdgeKey) -> Option<SheetKey> {
        let e = self.polyhedron.edge(edge)?;
        let (src, dst) = (e.src(), e.dst());
        let facet_l = self.polyhedron.facet(e.facet_l()?)?;
        let facet_r = self.polyhedron.facet(e.facet_r()?)?;
        let (plane_l, plane_r) = (facet_l.plane, facet_r.plane);
        let (speed_l, speed_r) = (facet_l.speed, facet_r.speed);
        let (facet_b, facet_f) = (facet_l.id(), facet_r.id());
        let reflex = self.is_reflex(edge);

        let plane = if speed_l == speed_r {
            if reflex {
                ActiveKernel::bisector_planes(&ActiveKernel::opposite_plane(&plane_l), &plane_r)?
            } else {
                ActiveKernel::bisector_planes(&plane_l, &ActiveKernel::opposite_plane(&plane_r))?
            }
        } else {
            let line = ActiveKernel::intersect_planes(&plane_l, &plane_r)?;
            let moved = ActiveKernel::intersect_planes(
                &ActiveKernel::offset_plane(&plane_l, -speed_l),
                &ActiveKernel::offset_plane(&plane_r, -speed_r),
            )?;
            let p1 = line.point;
            let p2 = p1 + line.direction;
            let p3 = moved.point;
            if reflex {
                Plane3::from_points(p3, p2, p1)
            } else {
                Plane3::from_points(p1, p2, p3)
            }
        };

        let sheet = self.skel.add_sheet(plane, facet_b, facet_f);
        self.edge_sheet.insert(edge, sheet);
        for v in [src, dst] {
            if let Some(&data) = self.vertex_data.get(v) {
                self.skel.sheet_add_node(sheet, data.node);
                if let Some(arc) = data.arc {
                    self.skel.sheet_add_arc(sheet, arc);
                }
            }
        }
        Some(sheet)
    }

    // ========================================================================
    // Wavefront queries
    // ========================================================================

    fn plane(&self, facet: FacetKey) -> Option<Plane3> {
        self.polyhedron.facet(facet).map(|f| f.plane)
    }

    /// The plane of `facet` after `delta` more units of offset.
    fn moved_plane(&self, facet: FacetKey, delta: f64) -> Option<Plane3> {
        let f = self.polyhedron.facet(facet)?;
        Some(ActiveKernel::offset_plane(&f.plane, -delta * f.speed))
    }

    fn same_point(&self, a: VertexKey, b: VertexKey) -> bool {
        match (self.polyhedron.point(a), self.polyhedron.point(b)) {
            (Some(p), Some(q)) => p == q,
            _ => false,
        }
    }

    fn has_zero_length(&self, edge: EdgeKey) -> bool {
        self.polyhedron
            .edge(edge)
            .is_some_and(|e| self.same_point(e.src(), e.dst()))
    }

    /// The third facet at the source of `edge`, after its left facet.
    fn facet_src(&self, edge: EdgeKey) -> Option<FacetKey> {
        let e = self.polyhedron.edge(edge)?;
        if self.polyhedron.degree(e.src()) != 3 {
            return None;
        }
        self.polyhedron.facet_next_around(e.facet_l()?, e.src())
    }

    /// The third facet at the destination of `edge`, after its right facet.
    fn facet_dst(&self, edge: EdgeKey) -> Option<FacetKey> {
        let e = self.polyhedron.edge(edge)?;
        if self.polyhedron.degree(e.dst()) != 3 {
            return None;
        }
        self.polyhedron.facet_next_around(e.facet_r()?, e.dst())
    }

    /// Where both endpoints of a zero-length edge will be after one unit of
    /// offset.
    fn zero_length_ends(&self, edge: EdgeKey) -> Option<(Point3, Point3, Plane3, Plane3)> {
        let e = self.polyhedron.edge(edge)?;
        let moved_l = self.moved_plane(e.facet_l()?, 1.0)?;
        let moved_r = self.moved_plane(e.facet_r()?, 1.0)?;
        let moved_src = self.moved_plane(self.facet_src(edge)?, 1.0)?;
        let moved_dst = self.moved_plane(self.facet_dst(edge)?, 1.0)?;
        let p_src = ActiveKernel::intersect_planes3(&moved_src, &moved_l, &moved_r)?;
        let p_dst = ActiveKernel::intersect_planes3(&moved_dst, &moved_l, &moved_r)?;
        Some((p_src, p_dst, moved_l, moved_r))
    }

    /// Reflexivity of an edge. A zero-length edge is judged by the edge it
    /// grows into.
    fn is_reflex(&self, edge: EdgeKey) -> bool {
        if !self.has_zero_length(edge) {
            return self.polyhedron.is_reflex(edge);
        }
        let Some((p_src, p_dst, moved_l, moved_r)) = self.zero_length_ends(edge) else {
            return false;
        };
        let p = p_src + moved_l.normal().cross(p_dst - p_src);
        ActiveKernel::side_plane(&moved_r, p) > 0
    }

    fn is_reflex_vertex(&self, vertex: VertexKey) -> bool {
        self.polyhedron.vertex(vertex).is_some_and(|v| {
            !v.edges().is_empty() && v.edges().iter().all(|&e| self.is_reflex(e))
        })
    }

    fn is_convex_vertex(&self, vertex: VertexKey) -> bool {
        self.polyhedron.vertex(vertex).is_some_and(|v| {
            !v.edges().is_empty() && v.edges().iter().all(|&e| !self.is_reflex(e))
        })
    }

    /// Supporting line of `edge`, directed `src → dst`. A zero-length edge
    /// points the way it grows.
    fn line(&self, edge: EdgeKey) -> Option<Line3> {
        if !self.has_zero_length(edge) {
            return self.polyhedron.edge_line(edge);
        }
        let e = self.polyhedron.edge(edge)?;
        let point = self.polyhedron.point(e.src())?;
        let (p_src, p_dst, _, _) = self.zero_length_ends(edge)?;
        Some(Line3::new(point, p_dst - p_src))
    }

    fn arc_of(&self, vertex: VertexKey) -> Option<ArcKey> {
        self.vertex_data.get(vertex)?.arc
    }

    fn arc_line(&self, vertex: VertexKey) -> Option<Line3> {
        self.skel.arc_line3(self.arc_of(vertex)?)
    }

    fn sheet_of(&self, edge: EdgeKey) -> Option<SheetKey> {
        self.edge_sheet.get(edge).copied()
    }

    fn sheet_plane(&self, edge: EdgeKey) -> Option<Plane3> {
        self.skel.sheet(self.sheet_of(edge)?).map(|s| s.plane)
    }

    /// Offset at which the plane of `facet` reaches `point`, or `None` if
    /// the point lies behind the wavefront.
    fn offset_at(&self, facet: FacetKey, point: Point3) -> Option<f64> {
        let f = self.polyhedron.facet(facet)?;
        let norm = f.plane.normal().length();
        if norm == 0.0 {
            return None;
        }
        let depth = -f.plane.eval(point) / norm / f.speed;
        if depth < -self.config.eps {
            return None;
        }
        Some(self.offset + depth.max(0.0))
    }

    // ========================================================================
    // Wavefront propagation
    // ========================================================================

    /// Moves every facet `delta` further inward, scaled by its speed.
    ///
    /// A vertex is placed where three of its facet planes meet. A vertex
    /// whose planes are degenerate follows its arc, and a dangling vertex
    /// follows its neighbour. A vertex with neither stays where it is.
    pub fn shift_facets(&mut self, delta: f64) -> Result<()> {
        if delta == 0.0 {
            return Ok(());
        }
        for f in self.polyhedron.facet_keys() {
            if let Some(plane) = self.moved_plane(f, delta) {
                if let Some(facet) = self.polyhedron.facet_mut(f) {
                    facet.plane = plane;
                }
            }
        }

        let mut displaced: FxHashMap<VertexKey, Vector3> = FxHashMap::default();
        let mut pending = Vec::new();
        for v in self.polyhedron.vertex_keys() {
            let Some(old) = self.polyhedron.point(v) else {
                continue;
            };
            let moved = self.corner_point(v).or_else(|| {
                let arc = self.skel.arc(self.arc_of(v)?)?;
                Some(old + arc.direction * delta)
            });
            match moved {
                Some(p) => {
                    displaced.insert(v, p - old);
                }
                None => pending.push(v),
            }
        }
        // vertices without a corner of their own follow a placed neighbour
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|&v| {
                let d = self.polyhedron.vertex(v).and_then(|vertex| {
                    vertex.edges().iter().find_map(|&e| {
                        let n = self.polyhedron.other_vertex(e, v)?;
                        displaced.get(&n).copied()
                    })
                });
                match d {
                    Some(d) => {
                        displaced.insert(v, d);
                        false
                    }
                    None => true,
                }
            });
            if pending.len() == before {
                tracing::warn!(vertices = pending.len(), offset = self.offset, "Vertices left in place by shift");
                break;
            }
        }
        for (v, d) in displaced {
            if let Some(vertex) = self.polyhedron.vertex_mut(v) {
                vertex.point = vertex.point + d;
            }
        }
        Ok(())
    }

    /// Meeting point of the facet planes at `vertex`, taken from the triple
    /// whose unit normals span the largest volume.
    fn corner_point(&self, vertex: VertexKey) -> Option<Point3> {
        let facets = self.polyhedron.vertex(vertex)?.facets();
        let planes: SmallVec<[Plane3; 4]> = facets.iter().filter_map(|&f| self.plane(f)).collect();
        let units: SmallVec<[Vector3; 4]> = planes
            .iter()
            .map(|p| {
                let n = p.normal();
                n / n.length()
            })
            .collect();
        let n = planes.len();
        let mut best: Option<(f64, [usize; 3])> = None;
        for i in 0..n {
            for j in i + 1..n {
                for k in j + 1..n {
                    let volume = units[i].dot(units[j].cross(units[k])).abs();
                    if best.map_or(true, |(v, _)| volume > v) {
                        best = Some((volume, [i, j, k]));
                    }
                }
            }
        }
        match best {
            Some((volume, [i, j, k])) if volume > CORNER_EPS => {
                ActiveKernel::intersect_planes3(&planes[i], &planes[j], &planes[k])
            }
            _ => None,
        }
    }

    /// Puts every vertex back on the corner of its facet planes after a
    /// handler has rewired the wavefront.
    fn settle_vertices(&mut self) {
        for v in self.polyhedron.vertex_keys() {
            let Some(p) = self.corner_point(v) else {
                continue;
            };
            if let Some(vertex) = self.polyhedron.vertex_mut(v) {
                vertex.point = p;
            }
        }
    }

    /// `event` can still be applied: its elements are on the wavefront and
    /// none of its arcs has ended.
    fn still_valid(&self, event: &Scheduled<Event3d>) -> bool {
        self.is_live(&event.event)
            && event
                .arcs
                .iter()
                .all(|&a| self.skel.arc(a).is_some_and(|arc| arc.is_ray()))
    }

    /// Records an event that a collapse or an earlier event of its batch
    /// already carried out, once for every node.
    fn record_consumed(&mut self, event: &Scheduled<Event3d>) {
        let kind = event.kind();
        let Some(node) = self.skel.find_node(event.point, self.offset, self.tolerance) else {
            tracing::debug!(kind = %kind, offset = event.offset, "Dropping superseded event");
            return;
        };
        if self.skel.events().iter().any(|r| r.node == Some(node)) {
            return;
        }
        self.skel.record_event(kind, event.offset, Some(node));
        self.handled += 1;
    }

    /// Removes every connected part of the wavefront whose vertices lie on
    /// one point, one line or one plane.
    ///
    /// Such a part has no volume left to shrink. Each distinct position
    /// becomes a node where the arcs of its vertices end. Along a line,
    /// consecutive nodes are joined by finished arcs; in a plane, every
    /// remaining edge becomes a chain of finished arcs through the nodes
    /// lying on it.
    fn collapse_flat_components(&mut self) {
        for component in self.components() {
            let points: Vec<(VertexKey, Point3)> = component
                .iter()
                .filter_map(|&v| Some((v, self.polyhedron.point(v)?)))
                .collect();
            let Some(shape) = self.flat_shape(&points) else {
                continue;
            };

            let mut node_of: FxHashMap<VertexKey, NodeKey> = FxHashMap::default();
            let mut stops: Vec<(NodeKey, Point3)> = Vec::new();
            for &(v, p) in &points {
                let node = match self.skel.find_node(p, self.offset, self.tolerance) {
                    Some(node) => node,
                    None => self.skel.add_node(p, self.offset),
                };
                if let Some(arc) = self.arc_of(v) {
                    let still = self
                        .skel
                        .arc(arc)
                        .is_some_and(|a| a.is_ray() && a.node_src() == node);
                    if still {
                        self.skel.remove_arc(arc);
                    } else {
                        self.skel.end_arc(arc, node);
                    }
                }
                let edges: SmallVec<[EdgeKey; 4]> = self
                    .polyhedron
                    .vertex(v)
                    .map(|vertex| vertex.edges().iter().copied().collect())
                    .unwrap_or_default();
                for e in edges {
                    if let Some(sheet) = self.sheet_of(e) {
                        self.skel.sheet_add_node(sheet, node);
                    }
                }
                node_of.insert(v, node);
                if !stops.iter().any(|&(n, _)| n == node) {
                    stops.push((node, p));
                }
            }

            match shape {
                FlatShape::Point => {}
                FlatShape::Line(first, axis) => {
                    let mut along: Vec<(f64, NodeKey)> =
                        stops.iter().map(|&(n, p)| ((p - first).dot(axis), n)).collect();
                    along.sort_by(|a, b| a.0.total_cmp(&b.0));
                    for pair in along.windows(2) {
                        if !self.skel.linked(pair[0].1, pair[1].1) {
                            self.skel.connect(pair[0].1, pair[1].1);
                        }
                    }
                }
                FlatShape::Plane => {
                    let edges: FxHashSet<EdgeKey> = component
                        .iter()
                        .filter_map(|&v| self.polyhedron.vertex(v))
                        .flat_map(|v| v.edges().iter().copied())
                        .collect();
                    for e in edges {
                        let Some(edge) = self.polyhedron.edge(e) else {
                            continue;
                        };
                        let (Some(&a), Some(&b)) = (node_of.get(&edge.src()), node_of.get(&edge.dst())) else {
                            continue;
                        };
                        self.connect_through(a, b, &stops);
                    }
                }
            }

            let facets: FxHashSet<FacetKey> = component
                .iter()
                .filter_map(|&v| self.polyhedron.vertex(v))
                .flat_map(|v| v.facets().iter().copied())
                .collect();
            for &v in &component {
                self.polyhedron.remove_vertex(v);
                self.vertex_data.remove(v);
            }
            for f in facets {
                self.polyhedron.remove_facet(f);
            }
            tracing::debug!(
                vertices = component.len(),
                nodes = stops.len(),
                offset = self.offset,
                "Collapsed flat wavefront component"
            );
        }
    }

    /// How `points` degenerate, if they no longer span a volume.
    fn flat_shape(&self, points: &[(VertexKey, Point3)]) -> Option<FlatShape> {
        let &(_, first) = points.first()?;
        let farthest = |from: &dyn Fn(Point3) -> f64| {
            points
                .iter()
                .map(|&(_, p)| p)
                .max_by(|a, b| from(*a).total_cmp(&from(*b)))
                .unwrap_or(first)
        };
        let far = farthest(&|p| (p - first).length());
        let axis = far - first;
        if axis.length() <= self.tolerance {
            return Some(FlatShape::Point);
        }
        let line = Line3::new(first, axis);
        let wide = farthest(&|p| ActiveKernel::distance_line3_point(&line, p));
        if ActiveKernel::distance_line3_point(&line, wide) <= self.tolerance {
            return Some(FlatShape::Line(first, axis));
        }
        let plane = Plane3::from_points(first, far, wide);
        let norm = plane.normal().length();
        let flat = norm > 0.0
            && points
                .iter()
                .all(|&(_, p)| (plane.eval(p) / norm).abs() <= self.tolerance);
        flat.then_some(FlatShape::Plane)
    }

    /// Finished arcs from `a` to `b` through every node of `stops` lying
    /// strictly between them. Segments already present are skipped.
    fn connect_through(&mut self, a: NodeKey, b: NodeKey, stops: &[(NodeKey, Point3)]) {
        if a == b {
            return;
        }
        let (Some(pa), Some(pb)) = (self.skel.node(a).map(|n| n.point), self.skel.node(b).map(|n| n.point)) else {
            return;
        };
        let along = pb - pa;
        let length = along.length();
        let line = Line3::new(pa, along);
        let mut chain: Vec<(f64, NodeKey)> = stops
            .iter()
            .filter(|&&(n, _)| n != a && n != b)
            .filter_map(|&(n, p)| {
                let t = (p - pa).dot(along) / length;
                let on = ActiveKernel::distance_line3_point(&line, p) <= self.tolerance;
                (on && t > self.tolerance && t < length - self.tolerance).then_some((t, n))
            })
            .collect();
        chain.sort_by(|x, y| x.0.total_cmp(&y.0));
        let mut from = a;
        for (_, to) in chain.into_iter().chain(std::iter::once((length, b))) {
            if from != to && !self.skel.linked(from, to) {
                self.skel.connect(from, to);
            }
            from = to;
        }
    }

    /// Vertex sets of the edge-connected parts of the wavefront.
    fn components(&self) -> Vec<Vec<VertexKey>> {
        let mut seen: FxHashSet<VertexKey> = FxHashSet::default();
        let mut result = Vec::new();
        for start in self.polyhedron.vertex_keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut stack = vec![start];
            while let Some(v) = stack.pop() {
                let Some(vertex) = self.polyhedron.vertex(v) else {
                    continue;
                };
                for &e in vertex.edges() {
                    if let Some(w) = self.polyhedron.other_vertex(e, v) {
                        if seen.insert(w) {
                            component.push(w);
                            stack.push(w);
                        }
                    }
                }
            }
            result.push(component);
        }
        result
    }

    fn record_offset(&mut self, offset: f64, kind: EventKind) -> Result<()> {
        self.shift_facets(offset - self.offset)?;
        self.offset = offset;
        tracing::debug!(offset, kind = %kind, "Recording offset polyhedron");
        self.skel.record_event(kind, offset, None);
        self.skel.offset_polyhedra.push((offset, self.polyhedron.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Polyhedron {
        Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)).unwrap()
    }

    fn engine(polyhedron: &Polyhedron) -> SimpleSkel3d {
        let mut engine = SimpleSkel3d::new(polyhedron, SkeletonConfig::default()).unwrap();
        engine.init().unwrap();
        engine
    }

    #[test]
    fn cube_corner_arcs_point_to_the_centre() {
        let engine = engine(&cube());
        assert_eq!(engine.skel.arc_count(), 8);
        assert_eq!(engine.skel.sheet_count(), 12);
        for v in engine.polyhedron.vertex_keys() {
            let p = engine.polyhedron.point(v).unwrap();
            let arc = engine.skel.arc(engine.arc_of(v).unwrap()).unwrap();
            let expected = Vector3::new(1.0 - p.x, 1.0 - p.y, 1.0 - p.z);
            assert_relative_eq!(arc.direction.x, expected.x, epsilon = 1e-12);
            assert_relative_eq!(arc.direction.y, expected.y, epsilon = 1e-12);
            assert_relative_eq!(arc.direction.z, expected.z, epsilon = 1e-12);
        }
    }

    #[test]
    fn configured_splitter_runs_before_the_arcs() {
        let pyramid = Polyhedron::from_faces(
            &[
                Point3::new(-1.0, -1.0, 0.0),
                Point3::new(1.0, -1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(-1.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            &[vec![0, 3, 2, 1], vec![0, 1, 4], vec![1, 2, 4], vec![2, 3, 4], vec![3, 0, 4]],
        )
        .unwrap();
        let config = SkeletonConfig {
            vertex_splitter: crate::config::VertexSplitterKind::Angle,
            ..SkeletonConfig::default()
        };
        let mut engine = SimpleSkel3d::new(&pyramid, config).unwrap();
        engine.init().unwrap();

        assert_eq!(engine.polyhedron.vertex_count(), 6);
        assert!(engine.polyhedron.vertex_keys().into_iter().all(|v| engine.polyhedron.degree(v) == 3));
        // both halves of the apex start from the apex node
        assert_eq!(engine.skel.node_count(), 5);
        assert!(engine.polyhedron.vertex_keys().into_iter().all(|v| engine.arc_of(v).is_some()));
    }

    #[test]
    fn sheets_bisect_the_inner_dihedral_angle() {
        let engine = engine(&cube());
        let centre = Point3::new(1.0, 1.0, 1.0);
        for (_, sheet) in engine.skel.sheets() {
            let d = sheet.plane.eval(centre) / sheet.plane.normal().length();
            assert_relative_eq!(d, 0.0, epsilon = 1e-12);
            assert_eq!(sheet.nodes().len(), 2);
            assert_eq!(sheet.arcs().len(), 2);
        }
    }

    #[test]
    fn shift_moves_facets_inward() {
        let mut engine = engine(&cube());
        engine.shift_facets(0.5).unwrap();
        let (min, max) = engine.polyhedron().bounding_box().unwrap();
        assert_relative_eq!(min.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(min.z, 0.5, epsilon = 1e-12);
        assert_relative_eq!(max.y, 1.5, epsilon = 1e-12);
        assert!(engine.polyhedron().is_consistent());
    }

    #[test]
    fn offset_is_measured_from_the_moving_plane() {
        let mut engine = engine(&cube());
        let top = engine
            .polyhedron
            .facets()
            .find(|(_, f)| f.plane.normal().z > 0.5)
            .map(|(k, _)| k)
            .unwrap();
        let offset = engine.offset_at(top, Point3::new(1.0, 1.0, 1.5)).unwrap();
        assert_relative_eq!(offset, 0.5, epsilon = 1e-12);
        assert!(engine.offset_at(top, Point3::new(1.0, 1.0, 2.5)).is_none());
        engine.shift_facets(0.25).unwrap();
        engine.offset = 0.25;
        let offset = engine.offset_at(top, Point3::new(1.0, 1.0, 1.5)).unwrap();
        assert_relative_eq!(offset, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn open_input_rejected() {
        let mut open = cube();
        let f = open.facet_keys()[0];
        open.remove_facet(f);
        assert!(matches!(
            SimpleSkel3d::new(&open, SkeletonConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn non_positive_speed_rejected() {
        let mut slow = cube();
        let f = slow.facet_keys()[0];
        slow.facet_mut(f).unwrap().speed = 0.0;
        assert!(matches!(
            SimpleSkel3d::new(&slow, SkeletonConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn caller_polyhedron_is_untouched() {
        let input = cube();
        SimpleSkel3d::compute(&input, SkeletonConfig::default()).unwrap();
        assert_eq!(input.vertex_count(), 8);
        let (min, _) = input.bounding_box().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Straight skeleton of a polygon by wavefront simulation.
//!
//! Every edge moves inward along its left normal at its own speed. Each
//! vertex travels along an arc between its two edges until an event changes
//! the topology:
//!
//! - **edge**: an edge shrinks to zero and its endpoints merge;
//! - **split**: a reflex vertex reaches a non-adjacent edge and cuts the
//!   ring in two (or joins a hole to its neighbour);
//! - **triangle**: a three-edge ring collapses to a point.
//!
//! All events within `eps` of the smallest offset are handled as one batch.
//! Vertices that end up on top of each other without an event of their own
//! are then merged, rings that have collapsed to segments become arcs, and
//! every event is detected again against the shifted polygon.
//!
//! Edge positions are never read back from the vertices: each edge keeps
//! its supporting line at offset 0 and is moved from there, so a vertex
//! pair that has just met still has well defined edge directions.

use std::f64::consts::{PI, TAU};
use std::time::Instant;

use slotmap::SecondaryMap;
use straightskel_kernel::{ActiveKernel, Kernel, Line2, Point2, Point3, Vector2};
use straightskel_mesh::{Edge2Key, Highlight, Polygon, Vertex2Key};

use crate::config::SkeletonConfig;
use crate::error::{Error, Result};
use crate::events::{next_const_offset, Event2d, EventKind, EventQueue, Scheduled};
use crate::graph::StraightSkeleton;
use crate::keys::{ArcKey, NodeKey};

/// Skeleton state of a wavefront vertex. `arc` is `None` between the
/// event that stopped the vertex and the end of its batch.
#[derive(Debug, Clone, Copy)]
struct VertexData {
    node: NodeKey,
    arc: Option<ArcKey>,
}

/// Polygon skeleton engine.
///
/// # Example
///
/// ```
/// use straightskel_kernel::Point2;
/// use straightskel_mesh::Polygon;
/// use straightskel_skeleton::{SimpleSkel2d, SkeletonConfig};
///
/// let square = Polygon::from_points(&[
///     Point2::new(0.0, 0.0),
///     Point2::new(4.0, 0.0),
///     Point2::new(4.0, 4.0),
///     Point2::new(0.0, 4.0),
/// ])
/// .unwrap();
/// let skel = SimpleSkel2d::compute(&square, SkeletonConfig::default()).unwrap();
/// assert_eq!(skel.node_count(), 5);
/// assert!(skel.arcs().all(|(_, arc)| !arc.is_ray()));
/// ```
#[derive(Debug)]
pub struct SimpleSkel2d {
    config: SkeletonConfig,
    polygon: Polygon,
    skel: StraightSkeleton,
    vertex_data: SecondaryMap<Vertex2Key, VertexData>,
    edge_origin: SecondaryMap<Edge2Key, usize>,
    /// Supporting line of every edge at offset 0.
    base_lines: SecondaryMap<Edge2Key, Line2>,
    queue: EventQueue<Event2d>,
    offset: f64,
    handled: usize,
}

impl SimpleSkel2d {
    /// Prepares a run on a copy of `polygon`.
    pub fn new(polygon: &Polygon, config: SkeletonConfig) -> Result<Self> {
        config.validate()?;
        if polygon.edge_count() < 3 {
            return Err(Error::InvalidInput(format!(
                "polygon needs at least 3 edges, got {}",
                polygon.edge_count()
            )));
        }
        for (_, v) in polygon.vertices() {
            if v.edge_in().is_none() || v.edge_out().is_none() {
                return Err(Error::InvalidInput(format!(
                    "polygon vertex {} is not on a closed ring",
                    v.id()
                )));
            }
        }
        if let Some((_, e)) = polygon.edges().find(|(_, e)| !(e.speed > 0.0)) {
            return Err(Error::InvalidInput(format!(
                "edge {} has non-positive speed {}",
                e.id(),
                e.speed
            )));
        }

        let mut working = polygon.clone();
        working.sort_edges()?;
        let mut edge_origin = SecondaryMap::new();
        let mut base_lines = SecondaryMap::new();
        for (key, edge) in working.edges() {
            let line = working
                .edge_line(key)
                .ok_or_else(|| Error::InvalidInput(format!("edge {} has zero length", edge.id())))?;
            base_lines.insert(key, line);
            edge_origin.insert(key, edge.id());
        }
        Ok(Self {
            config,
            polygon: working,
            skel: StraightSkeleton::new(),
            vertex_data: SecondaryMap::new(),
            edge_origin,
            base_lines,
            queue: EventQueue::new(),
            offset: 0.0,
            handled: 0,
        })
    }

    /// Computes the skeleton of `polygon`.
    pub fn compute(polygon: &Polygon, config: SkeletonConfig) -> Result<StraightSkeleton> {
        Self::new(polygon, config)?.run()
    }

    /// The wavefront in its current state.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Runs the simulation to the end and returns the skeleton.
    pub fn run(mut self) -> Result<StraightSkeleton> {
        let start = Instant::now();
        tracing::info!(
            vertices = self.polygon.vertex_count(),
            edges = self.polygon.edge_count(),
            "Starting polygon skeleton"
        );
        self.init();
        if self.config.const_offset > 0.0 {
            let next = next_const_offset(0.0, self.config.const_offset);
            self.queue.push(Scheduled::at_offset(Event2d::ConstOffset, next));
        }
        self.detect();

        while self.polygon.edge_count() > 0 && self.queue.has_topological() {
            let Some(mut first) = self.queue.pop() else {
                break;
            };
            if first.offset > self.config.max_offset {
                tracing::debug!(offset = first.offset, "Next event beyond max offset");
                break;
            }
            if let Event2d::ConstOffset = first.event {
                self.record_offset(first.offset);
                let next = next_const_offset(first.offset, self.config.const_offset);
                self.queue.push(Scheduled::at_offset(Event2d::ConstOffset, next));
                continue;
            }

            first.set_highlight(true);
            let offset = first.offset;
            let mut batch = vec![first];
            while let Some(next) = self.queue.peek_offset() {
                if next > offset + self.config.eps {
                    break;
                }
                match self.queue.pop() {
                    Some(event) if matches!(event.event, Event2d::ConstOffset) => {
                        self.queue.push(event);
                        break;
                    }
                    Some(event) => batch.push(event),
                    None => break,
                }
            }

            self.shift_edges(offset - self.offset);
            self.offset = offset;
            self.handle_batch(batch)?;
            self.close_flat_rings();
            self.start_arcs()?;
            self.queue.advance_epoch();
            self.detect();
        }

        tracing::info!(
            nodes = self.skel.node_count(),
            arcs = self.skel.arc_count(),
            events = self.skel.events().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Polygon skeleton finished"
        );
        Ok(self.skel)
    }

    // ========================================================================
    // Initialisation
    // ========================================================================

    fn init(&mut self) {
        let vertices: Vec<Vertex2Key> = self.polygon.vertex_keys().to_vec();
        for &v in &vertices {
            let Some(point) = self.polygon.point(v) else {
                continue;
            };
            let node = self.skel.add_node(Point3::new(point.x, point.y, 0.0), 0.0);
            self.vertex_data.insert(v, VertexData { node, arc: None });
        }
        for &v in &vertices {
            let arc = self.create_arc(v);
            if let Some(data) = self.vertex_data.get_mut(v) {
                data.arc = arc;
            }
        }
    }

    /// Direction in which `vertex` travels per unit of offset.
    ///
    /// The crossing of the edge lines one unit further in, minus their
    /// crossing now; a vertex between collinear edges moves along their
    /// normal. `None` between antiparallel edges.
    fn arc_direction(&self, vertex: Vertex2Key) -> Option<Vector2> {
        let edge_in = self.polygon.edge_in(vertex)?;
        let edge_out = self.polygon.edge_out(vertex)?;
        let line_in = self.base_lines.get(edge_in)?;
        let line_out = self.base_lines.get(edge_out)?;
        let speed_in = self.speed(edge_in);
        let speed_out = self.speed(edge_out);
        match ActiveKernel::intersect_lines(line_in, line_out) {
            Some(p) => {
                let q = ActiveKernel::intersect_lines(
                    &ActiveKernel::offset_line(line_in, speed_in),
                    &ActiveKernel::offset_line(line_out, speed_out),
                )?;
                Some(q - p)
            }
            None if line_in.direction().dot(line_out.direction()) > 0.0 => {
                Some(ActiveKernel::normalize2(line_in.normal()) * speed_in)
            }
            None => None,
        }
    }

    fn create_arc(&mut self, vertex: Vertex2Key) -> Option<ArcKey> {
        let direction = self.arc_direction(vertex)?;
        let node = self.vertex_data.get(vertex)?.node;
        let edge_left = self
            .polygon
            .edge_in(vertex)
            .and_then(|e| self.edge_origin.get(e).copied());
        let edge_right = self
            .polygon
            .edge_out(vertex)
            .and_then(|e| self.edge_origin.get(e).copied());
        Some(self.skel.add_arc2(node, direction, edge_left, edge_right))
    }

    fn speed(&self, edge: Edge2Key) -> f64 {
        self.polygon.edge(edge).map_or(1.0, |e| e.speed)
    }

    /// Geometric tolerance for coincident vertices and nodes.
    fn tolerance(&self) -> f64 {
        self.config.eps.sqrt()
    }

    /// Supporting line of `edge` at the current offset.
    fn line(&self, edge: Edge2Key) -> Option<Line2> {
        let base = self.base_lines.get(edge)?;
        Some(ActiveKernel::offset_line(base, self.offset * self.speed(edge)))
    }

    /// Turning right between the incoming and the outgoing edge.
    fn is_reflex(&self, vertex: Vertex2Key) -> bool {
        let line_in = self.polygon.edge_in(vertex).and_then(|e| self.base_lines.get(e));
        let line_out = self.polygon.edge_out(vertex).and_then(|e| self.base_lines.get(e));
        match (line_in, line_out) {
            (Some(a), Some(b)) => a.direction().cross(b.direction()) < 0.0,
            _ => false,
        }
    }

    fn arc_of(&self, vertex: Vertex2Key) -> Option<ArcKey> {
        self.vertex_data.get(vertex)?.arc
    }

    fn arc_line(&self, vertex: Vertex2Key) -> Option<Line2> {
        self.skel.arc_line2(self.arc_of(vertex)?)
    }

    fn distance(&self, a: Vertex2Key, b: Vertex2Key) -> Option<f64> {
        Some(ActiveKernel::distance_points2(self.polygon.point(a)?, self.polygon.point(b)?))
    }

    // ========================================================================
    // Detection
    // ========================================================================

    fn detect(&mut self) {
        let mut found = self.next_edge_events();
        found.extend(self.next_split_events());
        for event in found {
            tracing::trace!(kind = %event.kind(), offset = event.offset, "Event candidate");
            self.queue.push(event);
        }
    }

    /// Edges whose endpoint arcs meet in front of them, and the rings of
    /// three edges that collapse.
    fn next_edge_events(&self) -> Vec<Scheduled<Event2d>> {
        let mut result = Vec::new();
        let mut triangles: Vec<[Edge2Key; 3]> = Vec::new();
        for &edge in self.polygon.edge_keys() {
            let (Some(src), Some(dst)) = (self.polygon.src(edge), self.polygon.dst(edge)) else {
                continue;
            };
            let Some(line) = self.line(edge) else {
                continue;
            };
            let (Some(arc_src), Some(arc_dst)) = (self.arc_line(src), self.arc_line(dst)) else {
                continue;
            };
            let Some(p) = ActiveKernel::intersect_lines(&arc_src, &arc_dst) else {
                continue;
            };
            if ActiveKernel::side_line(&line, p) < 0 {
                continue;
            }
            let height = ActiveKernel::distance_line_point(&line, p) / self.speed(edge);
            if !(height > 0.0) {
                continue;
            }
            let point = Point3::new(p.x, p.y, 0.0);
            let offset = self.offset + height;

            let next = self.polygon.next_edge(edge);
            let after = next.and_then(|n| self.polygon.next_edge(n));
            match (next, after) {
                (Some(next), Some(after)) if self.polygon.next_edge(after) == Some(edge) => {
                    let mut ring = [edge, next, after];
                    ring.sort();
                    if triangles.contains(&ring) {
                        continue;
                    }
                    triangles.push(ring);
                    result.push(Scheduled::new(
                        Event2d::Triangle { edges: [edge, next, after] },
                        offset,
                        point,
                    ));
                }
                _ => result.push(Scheduled::new(Event2d::Edge { edge }, offset, point)),
            }
        }
        result
    }

    /// Reflex vertices reaching an edge other than their own and their
    /// neighbours'.
    fn next_split_events(&self) -> Vec<Scheduled<Event2d>> {
        let mut result = Vec::new();
        for &vertex in self.polygon.vertex_keys() {
            let (Some(edge_in), Some(edge_out)) =
                (self.polygon.edge_in(vertex), self.polygon.edge_out(vertex))
            else {
                continue;
            };
            if !self.is_reflex(vertex) {
                continue;
            }
            let skip = [
                Some(edge_in),
                Some(edge_out),
                self.polygon.prev_edge(edge_in),
                self.polygon.next_edge(edge_out),
            ];
            for &edge in self.polygon.edge_keys() {
                if skip.contains(&Some(edge)) {
                    continue;
                }
                let Some(p) = self.crash_at(vertex, edge) else {
                    continue;
                };
                let Some(line) = self.line(edge) else {
                    continue;
                };
                let height = ActiveKernel::distance_line_point(&line, p) / self.speed(edge);
                if !(height > 0.0) {
                    continue;
                }
                result.push(Scheduled::new(
                    Event2d::Split { vertex, edge },
                    self.offset + height,
                    Point3::new(p.x, p.y, 0.0),
                ));
            }
        }
        result
    }

    /// Where `vertex`, moving along its arc, meets the moving `edge`.
    ///
    /// The gap between the vertex and the edge's supporting line along the
    /// arc closes at the sum of both speeds. The point must lie in front of
    /// the edge and between the arcs of its endpoints.
    fn crash_at(&self, vertex: Vertex2Key, edge: Edge2Key) -> Option<Point2> {
        let arc = self.skel.arc(self.arc_of(vertex)?)?;
        let dir = Vector2::new(arc.direction.x, arc.direction.y);
        let arc_line = self.arc_line(vertex)?;
        let p_vertex = self.polygon.point(vertex)?;

        let edge_out = self.polygon.edge_out(vertex)?;
        let line_out = self.line(edge_out)?;
        let moved = ActiveKernel::intersect_lines(
            &arc_line,
            &ActiveKernel::offset_line(&line_out, self.speed(edge_out)),
        )?;
        let speed_vertex = ActiveKernel::distance_points2(moved, p_vertex);

        let line = self.line(edge)?;
        let p_edge = ActiveKernel::intersect_lines(&arc_line, &line)?;
        let moved = ActiveKernel::intersect_lines(
            &arc_line,
            &ActiveKernel::offset_line(&line, self.speed(edge)),
        )?;
        let speed_edge = ActiveKernel::distance_points2(moved, p_edge);

        if (p_edge - p_vertex).dot(dir) <= 0.0 {
            return None;
        }
        let dist = ActiveKernel::distance_points2(p_edge, p_vertex) * speed_vertex
            / (speed_vertex + speed_edge);
        let p = ActiveKernel::offset_point2(p_vertex, dir, dist);

        if self.side(&line, p) < 0 {
            return None;
        }
        let arc_src = self.arc_line(self.polygon.src(edge)?)?;
        let arc_dst = self.arc_line(self.polygon.dst(edge)?)?;
        if self.side(&arc_src, p) > 0 || self.side(&arc_dst, p) < 0 {
            return None;
        }
        Some(p)
    }

    /// Side of `p` relative to `line`, zero within tolerance. A vertex
    /// meeting an edge right at its endpoint still splits it.
    fn side(&self, line: &Line2, p: Point2) -> i32 {
        let length = line.normal().length();
        if length > 0.0 && (line.eval(p) / length).abs() <= self.tolerance() {
            0
        } else {
            ActiveKernel::side_line(line, p)
        }
    }

    // ========================================================================
    // Wavefront propagation
    // ========================================================================

    /// Moves every edge `delta` further inward, scaled by its speed.
    ///
    /// Each vertex is placed at the crossing of its moved edge lines. A
    /// vertex between antiparallel edges stays where it is.
    pub fn shift_edges(&mut self, delta: f64) {
        if delta == 0.0 {
            return;
        }
        let target = self.offset + delta;
        let moved: Vec<(Vertex2Key, Point2)> = self
            .polygon
            .vertex_keys()
            .iter()
            .filter_map(|&v| Some((v, self.shifted_point(v, target)?)))
            .collect();
        for (v, p) in moved {
            if let Some(vertex) = self.polygon.vertex_mut(v) {
                vertex.point = p;
            }
        }
        self.offset = target;
    }

    fn shifted_point(&self, vertex: Vertex2Key, target: f64) -> Option<Point2> {
        let edge_in = self.polygon.edge_in(vertex)?;
        let edge_out = self.polygon.edge_out(vertex)?;
        let line_in = self.base_lines.get(edge_in)?;
        let line_out = self.base_lines.get(edge_out)?;
        let speed_in = self.speed(edge_in);
        match ActiveKernel::intersect_lines(
            &ActiveKernel::offset_line(line_in, target * speed_in),
            &ActiveKernel::offset_line(line_out, target * self.speed(edge_out)),
        ) {
            Some(p) => Some(p),
            None if line_in.direction().dot(line_out.direction()) > 0.0 => {
                let p = self.polygon.point(vertex)?;
                Some(ActiveKernel::offset_point2(
                    p,
                    line_in.normal(),
                    (target - self.offset) * speed_in,
                ))
            }
            None => None,
        }
    }

    fn record_offset(&mut self, offset: f64) {
        self.shift_edges(offset - self.offset);
        self.offset = offset;
        tracing::debug!(offset, "Recording offset polygon");
        self.skel.record_event(EventKind::ConstOffset, offset, None);
        self.skel.offset_polygons.push((offset, self.polygon.clone()));
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Handles a batch of simultaneous events.
    ///
    /// The vertices of every event stop at its node. The topology is then
    /// rebuilt from the geometry: a stopped vertex inside an edge splits the
    /// edge, vertices at one point merge, and the edges around the point are
    /// re-paired into new vertices by angle.
    fn handle_batch(&mut self, batch: Vec<Scheduled<Event2d>>) -> Result<()> {
        for event in &batch {
            if self.handled >= self.config.max_events {
                return Err(Error::EventLimit(self.config.max_events));
            }
            let node = self.node_at(event.point);
            tracing::debug!(kind = %event.kind(), offset = event.offset, "Handling event");
            for vertex in self.event_vertices(&event.event) {
                self.stop_vertex(vertex, node);
            }
            self.skel.record_event(event.kind(), event.offset, Some(node));
            self.handled += 1;
        }
        self.split_touched_edges();
        for cluster in self.clusters() {
            if cluster.len() > 1 {
                self.merge_cluster(&cluster)?;
            }
        }
        Ok(())
    }

    fn event_vertices(&self, event: &Event2d) -> Vec<Vertex2Key> {
        match *event {
            Event2d::ConstOffset => Vec::new(),
            Event2d::Edge { edge } => [self.polygon.src(edge), self.polygon.dst(edge)]
                .into_iter()
                .flatten()
                .collect(),
            Event2d::Split { vertex, .. } => vec![vertex],
            Event2d::Triangle { edges } => edges.iter().filter_map(|&e| self.polygon.src(e)).collect(),
        }
    }

    /// The node at `point` and the current offset, shared with earlier
    /// events of the batch.
    fn node_at(&mut self, point: Point3) -> NodeKey {
        match self.skel.find_node(point, self.offset, self.tolerance()) {
            Some(node) => node,
            None => self.skel.add_node(point, self.offset),
        }
    }

    /// The node of `vertex` if it stopped in this batch.
    fn stopped_at(&self, vertex: Vertex2Key) -> Option<NodeKey> {
        let data = self.vertex_data.get(vertex)?;
        if data.arc.is_some() {
            return None;
        }
        let node = self.skel.node(data.node)?;
        ((node.offset - self.offset).abs() <= self.tolerance()).then_some(data.node)
    }

    /// The node where `vertex` stands now: the node it stopped at in this
    /// batch, or a new one at its position.
    fn current_node(&mut self, vertex: Vertex2Key) -> Option<NodeKey> {
        if let Some(node) = self.stopped_at(vertex) {
            return Some(node);
        }
        let p = self.polygon.point(vertex)?;
        Some(self.node_at(Point3::new(p.x, p.y, 0.0)))
    }

    /// Ends the arc `vertex` is travelling on at `node`. The vertex waits
    /// there for a new arc until the batch is over.
    fn stop_vertex(&mut self, vertex: Vertex2Key, node: NodeKey) {
        let Some(data) = self.vertex_data.get_mut(vertex) else {
            return;
        };
        data.node = node;
        let Some(arc) = data.arc.take() else {
            return;
        };
        let empty = self
            .skel
            .arc(arc)
            .is_some_and(|a| a.node_src == node && a.node_dst.is_none());
        if empty {
            self.skel.remove_arc(arc);
        } else {
            self.skel.end_arc(arc, node);
        }
    }

    fn point_of(&self, node: NodeKey) -> Option<Point2> {
        self.skel.node(node).map(|n| n.point2())
    }

    /// Splits every edge that a stopped vertex touches between its
    /// endpoints. The new vertex stops at the same node.
    fn split_touched_edges(&mut self) {
        let tol = self.tolerance();
        let stopped: Vec<(Vertex2Key, NodeKey)> = self
            .polygon
            .vertex_keys()
            .iter()
            .filter_map(|&v| Some((v, self.stopped_at(v)?)))
            .collect();
        for (vertex, node) in stopped {
            let Some(p) = self.polygon.point(vertex) else {
                continue;
            };
            let touched = self
                .polygon
                .edge_keys()
                .iter()
                .copied()
                .find(|&e| self.inside(e, vertex, p, tol));
            let Some(edge) = touched else {
                continue;
            };
            let Some((middle, second)) = self.polygon.split_edge(edge, p) else {
                continue;
            };
            tracing::trace!(offset = self.offset, "Vertex lands inside an edge");
            if let Some(&origin) = self.edge_origin.get(edge) {
                self.edge_origin.insert(second, origin);
            }
            if let Some(&line) = self.base_lines.get(edge) {
                self.base_lines.insert(second, line);
            }
            self.vertex_data.insert(middle, VertexData { node, arc: None });
        }
    }

    /// `p`, the position of `vertex`, lies on `edge` strictly between its
    /// endpoints.
    fn inside(&self, edge: Edge2Key, vertex: Vertex2Key, p: Point2, tol: f64) -> bool {
        let (Some(src), Some(dst)) = (self.polygon.src(edge), self.polygon.dst(edge)) else {
            return false;
        };
        if vertex == src || vertex == dst {
            return false;
        }
        let (Some(a), Some(b), Some(line)) =
            (self.polygon.point(src), self.polygon.point(dst), self.line(edge))
        else {
            return false;
        };
        if ActiveKernel::distance_line_point(&line, p) > tol {
            return false;
        }
        let along = b - a;
        let length = along.length();
        let t = (p - a).dot(along) / length;
        length > 0.0 && t > tol && t < length - tol
    }

    /// Groups the vertices that lie within tolerance of each other.
    fn clusters(&self) -> Vec<Vec<Vertex2Key>> {
        let tol = self.tolerance();
        let points: Vec<(Vertex2Key, Point2)> = self
            .polygon
            .vertices()
            .map(|(k, v)| (k, v.point))
            .collect();
        let mut parent: Vec<usize> = (0..points.len()).collect();
        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                if ActiveKernel::distance_points2(points[i].1, points[j].1) <= tol {
                    let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                    if a != b {
                        parent[b] = a;
                    }
                }
            }
        }
        let mut groups: Vec<(usize, Vec<Vertex2Key>)> = Vec::new();
        for i in 0..points.len() {
            let r = root(&mut parent, i);
            match groups.iter_mut().find(|(g, _)| *g == r) {
                Some((_, members)) => members.push(points[i].0),
                None => groups.push((r, vec![points[i].0])),
            }
        }
        groups.into_iter().map(|(_, members)| members).collect()
    }

    /// Replaces the vertices of `cluster` by one vertex per wedge of the
    /// wavefront around their common point.
    ///
    /// Edges between cluster vertices have zero length and are dropped.
    /// Going counter-clockwise from each outgoing edge, the first incoming
    /// edge (seen from the point) closes its wedge. An outgoing and an
    /// incoming edge along the same ray close an empty wedge, which leaves a
    /// flat spike.
    fn merge_cluster(&mut self, cluster: &[Vertex2Key]) -> Result<()> {
        let node = match cluster.iter().find_map(|&v| self.stopped_at(v)) {
            Some(node) => node,
            None => self
                .current_node(cluster[0])
                .ok_or_else(|| Error::degenerate("vertex", "position"))?,
        };
        for &v in cluster {
            self.stop_vertex(v, node);
        }
        let point = self
            .point_of(node)
            .ok_or_else(|| Error::degenerate("vertex", "node"))?;

        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        for &v in cluster {
            if let Some(e) = self.polygon.edge_in(v) {
                if self.polygon.src(e).is_some_and(|s| !cluster.contains(&s)) {
                    incoming.push(e);
                }
            }
            if let Some(e) = self.polygon.edge_out(v) {
                if self.polygon.dst(e).is_some_and(|d| !cluster.contains(&d)) {
                    outgoing.push(e);
                }
            }
        }
        if incoming.len() != outgoing.len() {
            return Err(Error::degenerate("vertex", "matching edges around a node"));
        }
        tracing::trace!(
            vertices = cluster.len(),
            wedges = outgoing.len(),
            offset = self.offset,
            "Merging coincident vertices"
        );

        let in_angles: Vec<f64> = incoming.iter().map(|&e| self.heading(e) + PI).collect();
        let mut used = vec![false; incoming.len()];
        for &out in &outgoing {
            let from = self.heading(out);
            let best = (0..incoming.len())
                .filter(|&i| !used[i])
                .min_by(|&i, &j| ccw_turn(from, in_angles[i]).total_cmp(&ccw_turn(from, in_angles[j])));
            let Some(i) = best else {
                continue;
            };
            used[i] = true;
            let w = self.polygon.add_vertex(point);
            self.polygon.set_edge_dst(incoming[i], w);
            self.polygon.set_edge_src(out, w);
            self.vertex_data.insert(w, VertexData { node, arc: None });
        }
        for &v in cluster {
            self.polygon.remove_vertex(v);
            self.vertex_data.remove(v);
        }
        Ok(())
    }

    /// Direction angle of `edge`.
    fn heading(&self, edge: Edge2Key) -> f64 {
        self.base_lines.get(edge).map_or(0.0, |l| {
            let d = l.direction();
            d.y.atan2(d.x)
        })
    }

    // ========================================================================
    // End of batch
    // ========================================================================

    /// Closes rings that have collapsed to segments. Their edges become
    /// arcs between the nodes of their vertices, split at every node in
    /// between, and each segment is added once.
    fn close_flat_rings(&mut self) {
        let tol = self.tolerance();
        for ring in self.polygon.cycles() {
            let vertices: Vec<Vertex2Key> = ring.iter().filter_map(|&e| self.polygon.src(e)).collect();
            if ring.len() > 2 && !self.is_flat(&vertices, tol) {
                continue;
            }
            let mut nodes = Vec::with_capacity(vertices.len());
            for &v in &vertices {
                if let Some(node) = self.current_node(v) {
                    self.stop_vertex(v, node);
                    nodes.push(node);
                }
            }
            let sides = match ring[..] {
                [a, b] => (self.edge_origin.get(a).copied(), self.edge_origin.get(b).copied()),
                _ => (None, None),
            };
            self.connect_ring(&nodes, sides, tol);

            for e in ring {
                self.polygon.remove_edge(e);
            }
            for v in vertices {
                self.polygon.remove_vertex(v);
                self.vertex_data.remove(v);
            }
        }
    }

    /// Area within `tol` times the perimeter.
    fn is_flat(&self, vertices: &[Vertex2Key], tol: f64) -> bool {
        let points: Vec<Point2> = vertices.iter().filter_map(|&v| self.polygon.point(v)).collect();
        let n = points.len();
        let (mut twice, mut perimeter) = (0.0, 0.0);
        for i in 0..n {
            let (p, q) = (points[i], points[(i + 1) % n]);
            twice += p.x * q.y - q.x * p.y;
            perimeter += (q - p).length();
        }
        (twice / 2.0).abs() <= tol * perimeter
    }

    /// Adds an arc along every edge of a flat ring, split at each node of
    /// the current offset that lies on it. Segments already present are
    /// skipped, so an edge walked there and back gives one arc.
    fn connect_ring(&mut self, nodes: &[NodeKey], sides: (Option<usize>, Option<usize>), tol: f64) {
        let level: Vec<(NodeKey, Point2)> = self
            .skel
            .nodes()
            .filter(|(_, n)| (n.offset - self.offset).abs() <= tol)
            .map(|(k, n)| (k, n.point2()))
            .collect();
        let corners: Vec<(NodeKey, Point2)> = nodes
            .iter()
            .filter_map(|&n| Some((n, self.point_of(n)?)))
            .collect();
        let n = corners.len();
        for i in 0..n {
            let (a, pa) = corners[i];
            let (b, pb) = corners[(i + 1) % n];
            if a == b {
                continue;
            }
            let along = pb - pa;
            let length = along.length();
            let mut chain: Vec<(f64, NodeKey)> = level
                .iter()
                .filter(|(k, _)| *k != a && *k != b)
                .filter_map(|&(k, p)| {
                    let t = (p - pa).dot(along) / length;
                    let off = (p - (pa + along * (t / length))).length();
                    (t > tol && t < length - tol && off <= tol).then_some((t, k))
                })
                .collect();
            chain.sort_by(|x, y| x.0.total_cmp(&y.0));
            let mut from = a;
            for (_, to) in chain.into_iter().chain(std::iter::once((length, b))) {
                if from != to && !self.skel.linked(from, to) {
                    if let Some(arc) = self.skel.connect(from, to) {
                        if let Some(arc) = self.skel.arc_mut(arc) {
                            arc.edge_left = sides.0;
                            arc.edge_right = sides.1;
                        }
                    }
                }
                from = to;
            }
        }
    }

    /// New arcs for every vertex stopped in the batch.
    fn start_arcs(&mut self) -> Result<()> {
        self.polygon.sort_edges()?;
        let waiting: Vec<Vertex2Key> = self
            .polygon
            .vertex_keys()
            .iter()
            .copied()
            .filter(|&v| self.vertex_data.get(v).is_some_and(|d| d.arc.is_none()))
            .collect();
        for v in waiting {
            let arc = self.create_arc(v);
            if let Some(data) = self.vertex_data.get_mut(v) {
                data.arc = arc;
            }
        }
        Ok(())
    }
}

/// Counter-clockwise turn from angle `from` to angle `to`, in `[0, 2π)`.
/// A turn a hair short of a full circle counts as none.
fn ccw_turn(from: f64, to: f64) -> f64 {
    const ANGLE_EPS: f64 = 1e-9;
    let d = (to - from).rem_euclid(TAU);
    if d > TAU - ANGLE_EPS {
        0.0
    } else {
        d
    }
}

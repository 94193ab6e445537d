// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar polygon topology.
//!
//! A [`Polygon`] owns its vertices and directed edges in slot maps. Every
//! vertex links to its incoming and outgoing edge, every edge to its source
//! and destination vertex. A counter-clockwise ring bounds an area on its
//! left; clockwise rings inside it are holes.
//!
//! Vertex and edge lists keep insertion order, which [`Polygon::sort_edges`]
//! rearranges into boundary walk order.

use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use straightskel_kernel::{Line2, Point2, Segment2};

use crate::error::{Error, Result};
use crate::keys::{Edge2Key, Vertex2Key};

/// A polygon corner.
#[derive(Debug, Clone)]
pub struct Vertex2 {
    pub point: Point2,
    pub(crate) edge_in: Option<Edge2Key>,
    pub(crate) edge_out: Option<Edge2Key>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Vertex2 {
    /// Insertion id, unique within the owning polygon.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn edge_in(&self) -> Option<Edge2Key> {
        self.edge_in
    }

    pub fn edge_out(&self) -> Option<Edge2Key> {
        self.edge_out
    }
}

/// A directed polygon edge. The polygon interior lies to its left.
#[derive(Debug, Clone)]
pub struct Edge2 {
    pub(crate) src: Vertex2Key,
    pub(crate) dst: Vertex2Key,
    /// Distance the edge travels per unit of offset.
    pub speed: f64,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Edge2 {
    pub fn src(&self) -> Vertex2Key {
        self.src
    }

    pub fn dst(&self) -> Vertex2Key {
        self.dst
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

crate::impl_highlight!(Vertex2, Edge2);

/// A polygon with holes, stored as directed edge rings.
///
/// # Example
///
/// ```
/// use straightskel_kernel::Point2;
/// use straightskel_mesh::Polygon;
///
/// let square = Polygon::from_points(&[
///     Point2::new(0.0, 0.0),
///     Point2::new(4.0, 0.0),
///     Point2::new(4.0, 4.0),
///     Point2::new(0.0, 4.0),
/// ])
/// .unwrap();
///
/// assert_eq!(square.edge_count(), 4);
/// assert!(square.is_consistent());
/// ```
#[derive(Debug, Clone)]
pub struct Polygon {
    pub(crate) vertices: SlotMap<Vertex2Key, Vertex2>,
    pub(crate) edges: SlotMap<Edge2Key, Edge2>,
    vertex_order: Vec<Vertex2Key>,
    edge_order: Vec<Edge2Key>,
    next_id: usize,
}

impl Polygon {
    /// Creates a new, empty polygon.
    pub fn new() -> Self {
        Self {
            vertices: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            vertex_order: Vec::new(),
            edge_order: Vec::new(),
            next_id: 0,
        }
    }

    /// Builds a single ring from points in counter-clockwise order.
    pub fn from_points(points: &[Point2]) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::TooFewVertices(points.len()));
        }
        let mut polygon = Self::new();
        let keys: Vec<Vertex2Key> = points.iter().map(|&p| polygon.add_vertex(p)).collect();
        for i in 0..keys.len() {
            polygon.add_edge(keys[i], keys[(i + 1) % keys.len()])?;
        }
        Ok(polygon)
    }

    fn take_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- Vertex operations ---

    /// Adds an unconnected vertex.
    pub fn add_vertex(&mut self, point: Point2) -> Vertex2Key {
        let id = self.take_id();
        let key = self.vertices.insert(Vertex2 {
            point,
            edge_in: None,
            edge_out: None,
            id,
            highlighted: false,
        });
        self.vertex_order.push(key);
        key
    }

    /// Removes a vertex together with its incoming and outgoing edge.
    pub fn remove_vertex(&mut self, key: Vertex2Key) -> bool {
        let Some(vertex) = self.vertices.remove(key) else {
            return false;
        };
        self.vertex_order.retain(|&k| k != key);
        if let Some(e) = vertex.edge_in {
            self.remove_edge(e);
        }
        if let Some(e) = vertex.edge_out {
            self.remove_edge(e);
        }
        true
    }

    pub fn vertex(&self, key: Vertex2Key) -> Option<&Vertex2> {
        self.vertices.get(key)
    }

    pub fn vertex_mut(&mut self, key: Vertex2Key) -> Option<&mut Vertex2> {
        self.vertices.get_mut(key)
    }

    pub fn point(&self, key: Vertex2Key) -> Option<Point2> {
        self.vertices.get(key).map(|v| v.point)
    }

    pub fn contains_vertex(&self, key: Vertex2Key) -> bool {
        self.vertices.contains_key(key)
    }

    /// Vertex keys in list order.
    pub fn vertex_keys(&self) -> &[Vertex2Key] {
        &self.vertex_order
    }

    /// Iterates vertices in list order.
    pub fn vertices(&self) -> impl Iterator<Item = (Vertex2Key, &Vertex2)> {
        self.vertex_order
            .iter()
            .filter_map(move |&k| self.vertices.get(k).map(|v| (k, v)))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    // --- Edge operations ---

    /// Adds the edge `src → dst`, making it the source's outgoing and the
    /// destination's incoming edge.
    pub fn add_edge(&mut self, src: Vertex2Key, dst: Vertex2Key) -> Result<Edge2Key> {
        if src == dst {
            return Err(Error::DegenerateEdge);
        }
        if !self.vertices.contains_key(src) || !self.vertices.contains_key(dst) {
            return Err(Error::Inconsistent(
                "edge endpoint is not a polygon vertex".into(),
            ));
        }
        let id = self.take_id();
        let key = self.edges.insert(Edge2 {
            src,
            dst,
            speed: 1.0,
            id,
            highlighted: false,
        });
        self.edge_order.push(key);
        self.vertices[src].edge_out = Some(key);
        self.vertices[dst].edge_in = Some(key);
        Ok(key)
    }

    /// Removes an edge and clears the endpoint links that still point at it.
    pub fn remove_edge(&mut self, key: Edge2Key) -> bool {
        let Some(edge) = self.edges.remove(key) else {
            return false;
        };
        self.edge_order.retain(|&k| k != key);
        if let Some(src) = self.vertices.get_mut(edge.src) {
            if src.edge_out == Some(key) {
                src.edge_out = None;
            }
        }
        if let Some(dst) = self.vertices.get_mut(edge.dst) {
            if dst.edge_in == Some(key) {
                dst.edge_in = None;
            }
        }
        true
    }

    pub fn edge(&self, key: Edge2Key) -> Option<&Edge2> {
        self.edges.get(key)
    }

    pub fn edge_mut(&mut self, key: Edge2Key) -> Option<&mut Edge2> {
        self.edges.get_mut(key)
    }

    pub fn contains_edge(&self, key: Edge2Key) -> bool {
        self.edges.contains_key(key)
    }

    /// Edge keys in list order.
    pub fn edge_keys(&self) -> &[Edge2Key] {
        &self.edge_order
    }

    /// Iterates edges in list order.
    pub fn edges(&self) -> impl Iterator<Item = (Edge2Key, &Edge2)> {
        self.edge_order
            .iter()
            .filter_map(move |&k| self.edges.get(k).map(|e| (k, e)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Moves the source of `edge` to `vertex`, which takes the edge as its
    /// outgoing edge.
    pub fn set_edge_src(&mut self, edge: Edge2Key, vertex: Vertex2Key) -> bool {
        if !self.vertices.contains_key(vertex) {
            return false;
        }
        let Some(e) = self.edges.get_mut(edge) else {
            return false;
        };
        let old = std::mem::replace(&mut e.src, vertex);
        if let Some(v) = self.vertices.get_mut(old) {
            if v.edge_out == Some(edge) {
                v.edge_out = None;
            }
        }
        self.vertices[vertex].edge_out = Some(edge);
        true
    }

    /// Moves the destination of `edge` to `vertex`, which takes the edge as
    /// its incoming edge.
    pub fn set_edge_dst(&mut self, edge: Edge2Key, vertex: Vertex2Key) -> bool {
        if !self.vertices.contains_key(vertex) {
            return false;
        }
        let Some(e) = self.edges.get_mut(edge) else {
            return false;
        };
        let old = std::mem::replace(&mut e.dst, vertex);
        if let Some(v) = self.vertices.get_mut(old) {
            if v.edge_in == Some(edge) {
                v.edge_in = None;
            }
        }
        self.vertices[vertex].edge_in = Some(edge);
        true
    }

    /// Removes every vertex and edge. Ids keep counting.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.vertex_order.clear();
        self.edge_order.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    // --- Navigation ---

    pub fn src(&self, edge: Edge2Key) -> Option<Vertex2Key> {
        self.edges.get(edge).map(|e| e.src)
    }

    pub fn dst(&self, edge: Edge2Key) -> Option<Vertex2Key> {
        self.edges.get(edge).map(|e| e.dst)
    }

    pub fn edge_in(&self, vertex: Vertex2Key) -> Option<Edge2Key> {
        self.vertices.get(vertex)?.edge_in
    }

    pub fn edge_out(&self, vertex: Vertex2Key) -> Option<Edge2Key> {
        self.vertices.get(vertex)?.edge_out
    }

    /// The edge leaving the destination of `edge`.
    pub fn next_edge(&self, edge: Edge2Key) -> Option<Edge2Key> {
        self.edge_out(self.dst(edge)?)
    }

    /// The edge entering the source of `edge`.
    pub fn prev_edge(&self, edge: Edge2Key) -> Option<Edge2Key> {
        self.edge_in(self.src(edge)?)
    }

    pub fn next_vertex(&self, vertex: Vertex2Key) -> Option<Vertex2Key> {
        self.dst(self.edge_out(vertex)?)
    }

    pub fn prev_vertex(&self, vertex: Vertex2Key) -> Option<Vertex2Key> {
        self.src(self.edge_in(vertex)?)
    }

    /// Groups the edges into boundary rings, each in walk order.
    ///
    /// A chain that does not close is returned as far as it can be walked.
    pub fn cycles(&self) -> Vec<Vec<Edge2Key>> {
        let mut visited = FxHashSet::default();
        let mut result = Vec::new();
        for &start in &self.edge_order {
            if !self.edges.contains_key(start) || visited.contains(&start) {
                continue;
            }
            let mut ring = Vec::new();
            let mut current = Some(start);
            while let Some(e) = current {
                if !visited.insert(e) {
                    break;
                }
                ring.push(e);
                current = self.next_edge(e);
            }
            result.push(ring);
        }
        result
    }

    /// Reorders the edge list into boundary walk order, ring after ring, and
    /// the vertex list to match.
    pub fn sort_edges(&mut self) -> Result<()> {
        let mut sorted = Vec::with_capacity(self.edge_order.len());
        let mut visited = FxHashSet::default();
        for &start in &self.edge_order {
            if !self.edges.contains_key(start) || visited.contains(&start) {
                continue;
            }
            let mut current = start;
            loop {
                visited.insert(current);
                sorted.push(current);
                match self.next_edge(current) {
                    Some(next) if next == start => break,
                    Some(next) if !visited.contains(&next) => current = next,
                    _ => {
                        return Err(Error::Inconsistent(format!(
                            "polygon ring through edge {} does not close",
                            self.edges[start].id
                        )))
                    }
                }
            }
        }

        let mut vertex_order: Vec<Vertex2Key> = sorted.iter().map(|&e| self.edges[e].src).collect();
        let placed: FxHashSet<Vertex2Key> = vertex_order.iter().copied().collect();
        vertex_order.extend(
            self.vertex_order
                .iter()
                .copied()
                .filter(|k| self.vertices.contains_key(*k) && !placed.contains(k)),
        );
        self.edge_order = sorted;
        self.vertex_order = vertex_order;
        Ok(())
    }

    /// Inserts a vertex at `point` into `edge`, which keeps its source. The
    /// new second half inherits the speed.
    pub fn split_edge(&mut self, edge: Edge2Key, point: Point2) -> Option<(Vertex2Key, Edge2Key)> {
        let (src, dst, speed) = {
            let e = self.edges.get(edge)?;
            (e.src, e.dst, e.speed)
        };
        let middle = self.add_vertex(point);
        self.set_edge_dst(edge, middle);
        let second = self.add_edge(middle, dst).ok()?;
        self.edges[second].speed = speed;

        // keep list order along the boundary
        self.edge_order.pop();
        let at = self.edge_order.iter().position(|&k| k == edge).map_or(self.edge_order.len(), |i| i + 1);
        self.edge_order.insert(at, second);
        self.vertex_order.pop();
        let at = self.vertex_order.iter().position(|&k| k == src).map_or(self.vertex_order.len(), |i| i + 1);
        self.vertex_order.insert(at, middle);
        Some((middle, second))
    }

    /// Checks that every vertex-edge link is mirrored by the linked entity.
    pub fn is_consistent(&self) -> bool {
        for (key, vertex) in &self.vertices {
            if let Some(out) = vertex.edge_out {
                match self.edges.get(out) {
                    Some(e) if e.src == key => {}
                    _ => return false,
                }
            }
            if let Some(inc) = vertex.edge_in {
                match self.edges.get(inc) {
                    Some(e) if e.dst == key => {}
                    _ => return false,
                }
            }
        }
        self.edges.iter().all(|(key, edge)| {
            self.vertices.get(edge.src).and_then(|v| v.edge_out) == Some(key)
                && self.vertices.get(edge.dst).and_then(|v| v.edge_in) == Some(key)
        })
    }

    // --- Geometry ---

    /// Supporting line of an edge, directed `src → dst`. `None` for a
    /// zero-length edge.
    pub fn edge_line(&self, edge: Edge2Key) -> Option<Line2> {
        let e = self.edges.get(edge)?;
        let p = self.point(e.src)?;
        let q = self.point(e.dst)?;
        if p == q {
            return None;
        }
        Some(Line2::through(p, q))
    }

    pub fn edge_segment(&self, edge: Edge2Key) -> Option<Segment2> {
        let e = self.edges.get(edge)?;
        Some(Segment2::new(self.point(e.src)?, self.point(e.dst)?))
    }

    /// Interior angle at a vertex in `[0, 2π)`, measured counter-clockwise
    /// from the outgoing to the incoming edge. `0` for an open vertex.
    pub fn angle(&self, vertex: Vertex2Key) -> f64 {
        let (Some(prev), Some(next)) = (self.prev_vertex(vertex), self.next_vertex(vertex)) else {
            return 0.0;
        };
        let (Some(p), Some(a), Some(b)) = (self.point(vertex), self.point(prev), self.point(next))
        else {
            return 0.0;
        };
        let arc_in = (a.y - p.y).atan2(a.x - p.x);
        let arc_out = (b.y - p.y).atan2(b.x - p.x);
        let mut angle = arc_in - arc_out;
        if angle < 0.0 {
            angle += 2.0 * std::f64::consts::PI;
        }
        angle
    }

    /// A vertex whose interior angle exceeds `π`.
    pub fn is_reflex(&self, vertex: Vertex2Key) -> bool {
        self.angle(vertex) > std::f64::consts::PI
    }

    pub fn count_reflex(&self) -> usize {
        self.vertex_order.iter().filter(|&&v| self.is_reflex(v)).count()
    }

    /// Number of rings beyond the first.
    pub fn count_holes(&self) -> usize {
        self.cycles().len().saturating_sub(1)
    }

    /// Signed shoelace area over all rings; holes subtract.
    pub fn area(&self) -> f64 {
        let twice: f64 = self
            .edges
            .values()
            .filter_map(|e| Some((self.point(e.src)?, self.point(e.dst)?)))
            .map(|(p, q)| p.x * q.y - q.x * p.y)
            .sum();
        twice / 2.0
    }
}

impl Default for Polygon {
    fn default() -> Self {
        Self::new()
    }
}

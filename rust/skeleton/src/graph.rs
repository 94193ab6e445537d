// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The straight skeleton produced by an engine run.
//!
//! - **Nodes** are the points where wavefront vertices meet, with the offset
//!   at which they meet.
//! - **Arcs** trace single wavefront vertices from node to node. An arc
//!   without a destination is a ray along its direction.
//! - **Sheets** trace wavefront edges of a polyhedron: the bisector plane
//!   swept by the edge, bounded by its nodes and arcs.
//!
//! The skeleton also keeps the log of handled events and the offset meshes
//! recorded at constant and saved offsets.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use smallvec::SmallVec;
use straightskel_kernel::{Line2, Line3, Plane3, Point2, Point3, Vector2, Vector3};
use straightskel_mesh::{Polygon, Polyhedron};

use crate::events::EventKind;
use crate::keys::{ArcKey, NodeKey, SheetKey};

/// A point where the wavefront changes topology.
#[derive(Debug, Clone)]
pub struct Node {
    pub point: Point3,
    /// Inward distance travelled by the wavefront when it reaches the node.
    pub offset: f64,
    pub(crate) arcs: SmallVec<[ArcKey; 4]>,
    pub(crate) sheets: SmallVec<[SheetKey; 6]>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Node {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Arcs starting or ending here.
    pub fn arcs(&self) -> &[ArcKey] {
        &self.arcs
    }

    /// Sheets bounded by this node.
    pub fn sheets(&self) -> &[SheetKey] {
        &self.sheets
    }

    /// The point in the plane, for polygon skeletons.
    pub fn point2(&self) -> Point2 {
        Point2::new(self.point.x, self.point.y)
    }
}

/// The trace of a wavefront vertex.
#[derive(Debug, Clone)]
pub struct Arc {
    pub(crate) node_src: NodeKey,
    pub(crate) node_dst: Option<NodeKey>,
    /// Displacement of the vertex per unit of offset.
    pub direction: Vector3,
    pub(crate) edge_left: Option<usize>,
    pub(crate) edge_right: Option<usize>,
    pub(crate) sheets: SmallVec<[SheetKey; 3]>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Arc {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn node_src(&self) -> NodeKey {
        self.node_src
    }

    pub fn node_dst(&self) -> Option<NodeKey> {
        self.node_dst
    }

    /// Id of the input edge on the arc's left (polygon skeletons).
    pub fn edge_left(&self) -> Option<usize> {
        self.edge_left
    }

    /// Id of the input edge on the arc's right (polygon skeletons).
    pub fn edge_right(&self) -> Option<usize> {
        self.edge_right
    }

    /// Sheets the arc borders (polyhedron skeletons).
    pub fn sheets(&self) -> &[SheetKey] {
        &self.sheets
    }

    /// No destination node yet.
    pub fn is_ray(&self) -> bool {
        self.node_dst.is_none()
    }
}

/// The surface swept by a wavefront edge between two facets.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub plane: Plane3,
    pub(crate) facet_b: usize,
    pub(crate) facet_f: usize,
    pub(crate) nodes: Vec<NodeKey>,
    pub(crate) arcs: Vec<ArcKey>,
    pub(crate) id: usize,
    pub(crate) highlighted: bool,
}

impl Sheet {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Id of the input facet behind the sheet (the edge's left facet).
    pub fn facet_b(&self) -> usize {
        self.facet_b
    }

    /// Id of the input facet in front of the sheet (the edge's right facet).
    pub fn facet_f(&self) -> usize {
        self.facet_f
    }

    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    pub fn arcs(&self) -> &[ArcKey] {
        &self.arcs
    }
}

straightskel_mesh::impl_highlight!(Node, Arc, Sheet);

/// A handled event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub offset: f64,
    /// The node appended for the event; offset events have none.
    pub node: Option<NodeKey>,
}

/// Result of a skeleton run.
#[derive(Debug, Clone, Default)]
pub struct StraightSkeleton {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) arcs: SlotMap<ArcKey, Arc>,
    pub(crate) sheets: SlotMap<SheetKey, Sheet>,
    pub(crate) events: Vec<EventRecord>,
    pub(crate) offset_polygons: Vec<(f64, Polygon)>,
    pub(crate) offset_polyhedra: Vec<(f64, Polyhedron)>,
    next_id: usize,
}

impl StraightSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn add_node(&mut self, point: Point3, offset: f64) -> NodeKey {
        let id = self.take_id();
        self.nodes.insert(Node {
            point,
            offset,
            arcs: SmallVec::new(),
            sheets: SmallVec::new(),
            id,
            highlighted: false,
        })
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A node within `eps` of `point` at an offset within `eps` of `offset`.
    pub fn find_node(&self, point: Point3, offset: f64, eps: f64) -> Option<NodeKey> {
        self.nodes
            .iter()
            .find(|(_, n)| {
                (n.offset - offset).abs() <= eps && (n.point - point).length() <= eps
            })
            .map(|(k, _)| k)
    }

    // ========================================================================
    // Arcs
    // ========================================================================

    /// Starts a ray at `node_src` moving along `direction`.
    pub fn add_arc(&mut self, node_src: NodeKey, direction: Vector3) -> ArcKey {
        let id = self.take_id();
        let key = self.arcs.insert(Arc {
            node_src,
            node_dst: None,
            direction,
            edge_left: None,
            edge_right: None,
            sheets: SmallVec::new(),
            id,
            highlighted: false,
        });
        if let Some(node) = self.nodes.get_mut(node_src) {
            node.arcs.push(key);
        }
        key
    }

    /// Polygon arc between the input edges `edge_left` and `edge_right`.
    pub fn add_arc2(
        &mut self,
        node_src: NodeKey,
        direction: Vector2,
        edge_left: Option<usize>,
        edge_right: Option<usize>,
    ) -> ArcKey {
        let key = self.add_arc(node_src, Vector3::new(direction.x, direction.y, 0.0));
        let arc = &mut self.arcs[key];
        arc.edge_left = edge_left;
        arc.edge_right = edge_right;
        key
    }

    /// Ends `arc` at `node`. An arc that already ends elsewhere keeps its
    /// destination; returns whether the arc now ends at `node`.
    pub fn end_arc(&mut self, arc: ArcKey, node: NodeKey) -> bool {
        let Some(a) = self.arcs.get_mut(arc) else {
            return false;
        };
        match a.node_dst {
            Some(dst) => dst == node,
            None if a.node_src == node => false,
            None => {
                a.node_dst = Some(node);
                if let Some(n) = self.nodes.get_mut(node) {
                    if !n.arcs.contains(&arc) {
                        n.arcs.push(arc);
                    }
                }
                true
            }
        }
    }

    /// Adds the finished arc `src → dst`.
    pub fn connect(&mut self, src: NodeKey, dst: NodeKey) -> Option<ArcKey> {
        let from = self.nodes.get(src)?.point;
        let to = self.nodes.get(dst)?.point;
        let arc = self.add_arc(src, to - from);
        self.end_arc(arc, dst);
        Some(arc)
    }

    /// An arc joins `a` and `b`, in either direction.
    pub fn linked(&self, a: NodeKey, b: NodeKey) -> bool {
        self.nodes.get(a).is_some_and(|n| {
            n.arcs.iter().any(|&k| {
                self.arcs.get(k).is_some_and(|arc| {
                    (arc.node_src == a && arc.node_dst == Some(b)) || (arc.node_src == b && arc.node_dst == Some(a))
                })
            })
        })
    }

    /// Removes `arc` and unlinks it from its nodes and sheets.
    pub(crate) fn remove_arc(&mut self, arc: ArcKey) -> bool {
        let Some(a) = self.arcs.remove(arc) else {
            return false;
        };
        for n in std::iter::once(a.node_src).chain(a.node_dst) {
            if let Some(node) = self.nodes.get_mut(n) {
                node.arcs.retain(|k| *k != arc);
            }
        }
        for s in a.sheets {
            if let Some(sheet) = self.sheets.get_mut(s) {
                sheet.arcs.retain(|k| *k != arc);
            }
        }
        true
    }

    pub fn arc(&self, key: ArcKey) -> Option<&Arc> {
        self.arcs.get(key)
    }

    pub fn arc_mut(&mut self, key: ArcKey) -> Option<&mut Arc> {
        self.arcs.get_mut(key)
    }

    pub fn arcs(&self) -> impl Iterator<Item = (ArcKey, &Arc)> {
        self.arcs.iter()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Supporting line of a polygon arc, through its source node.
    pub fn arc_line2(&self, key: ArcKey) -> Option<Line2> {
        let arc = self.arcs.get(key)?;
        let p = self.nodes.get(arc.node_src)?.point2();
        let dir = Vector2::new(arc.direction.x, arc.direction.y);
        if dir.squared_length() == 0.0 {
            return None;
        }
        Some(Line2::from_point_dir(p, dir))
    }

    /// Supporting line of a polyhedron arc, through its source node.
    pub fn arc_line3(&self, key: ArcKey) -> Option<Line3> {
        let arc = self.arcs.get(key)?;
        let p = self.nodes.get(arc.node_src)?.point;
        if arc.direction.squared_length() == 0.0 {
            return None;
        }
        Some(Line3::new(p, arc.direction))
    }

    // ========================================================================
    // Sheets
    // ========================================================================

    pub fn add_sheet(&mut self, plane: Plane3, facet_b: usize, facet_f: usize) -> SheetKey {
        let id = self.take_id();
        self.sheets.insert(Sheet {
            plane,
            facet_b,
            facet_f,
            nodes: Vec::new(),
            arcs: Vec::new(),
            id,
            highlighted: false,
        })
    }

    /// Bounds `sheet` by `node`.
    pub fn sheet_add_node(&mut self, sheet: SheetKey, node: NodeKey) -> bool {
        let (Some(s), Some(n)) = (self.sheets.get_mut(sheet), self.nodes.get_mut(node)) else {
            return false;
        };
        if !s.nodes.contains(&node) {
            s.nodes.push(node);
        }
        if !n.sheets.contains(&sheet) {
            n.sheets.push(sheet);
        }
        true
    }

    /// Bounds `sheet` by `arc`.
    pub fn sheet_add_arc(&mut self, sheet: SheetKey, arc: ArcKey) -> bool {
        let (Some(s), Some(a)) = (self.sheets.get_mut(sheet), self.arcs.get_mut(arc)) else {
            return false;
        };
        if !s.arcs.contains(&arc) {
            s.arcs.push(arc);
        }
        if !a.sheets.contains(&sheet) {
            a.sheets.push(sheet);
        }
        true
    }

    pub fn sheet(&self, key: SheetKey) -> Option<&Sheet> {
        self.sheets.get(key)
    }

    pub fn sheet_mut(&mut self, key: SheetKey) -> Option<&mut Sheet> {
        self.sheets.get_mut(key)
    }

    pub fn sheets(&self) -> impl Iterator<Item = (SheetKey, &Sheet)> {
        self.sheets.iter()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    // ========================================================================
    // Events and offset meshes
    // ========================================================================

    pub(crate) fn record_event(&mut self, kind: EventKind, offset: f64, node: Option<NodeKey>) {
        self.events.push(EventRecord { kind, offset, node });
    }

    /// Handled events in order.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Number of handled events of `kind`.
    pub fn count_events(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Offset polygons recorded at constant offsets.
    pub fn offset_polygons(&self) -> &[(f64, Polygon)] {
        &self.offset_polygons
    }

    /// Offset polyhedra recorded at constant and saved offsets.
    pub fn offset_polyhedra(&self) -> &[(f64, Polyhedron)] {
        &self.offset_polyhedra
    }

    pub fn clear_highlights(&mut self) {
        use straightskel_mesh::Highlight;
        self.nodes.values_mut().for_each(|n| n.set_highlight(false));
        self.arcs.values_mut().for_each(|a| a.set_highlight(false));
        self.sheets.values_mut().for_each(|s| s.set_highlight(false));
    }

    /// Whether the nodes can be peeled from the boundary inwards.
    ///
    /// Nodes at offset 0 are reached first. A node is reached once two of
    /// its arc neighbours are. Passes alternate between nodes of vanish
    /// events and nodes of contact events, switching whenever a pass adds
    /// nothing. The check fails when both kinds stall in a row with nodes
    /// left over, or a node has no recorded event.
    pub fn check_graph(&self) -> bool {
        let mut kinds: FxHashMap<NodeKey, EventKind> = FxHashMap::default();
        for record in &self.events {
            if let Some(node) = record.node {
                kinds.entry(node).or_insert(record.kind);
            }
        }
        let (mut reached, mut hidden): (FxHashSet<NodeKey>, Vec<NodeKey>) = (FxHashSet::default(), Vec::new());
        for (key, node) in &self.nodes {
            if node.offset == 0.0 {
                reached.insert(key);
            } else {
                hidden.push(key);
            }
        }

        let mut contact = false;
        let mut layer = 0;
        let mut stalled = false;
        while !hidden.is_empty() {
            let before = hidden.len();
            let mut i = 0;
            while i < hidden.len() {
                let node = hidden[i];
                let ready = kinds.get(&node).is_some_and(|k| k.is_contact() == contact)
                    && self.reached_neighbours(&reached, node) >= 2;
                if ready {
                    reached.insert(node);
                    hidden.swap_remove(i);
                    layer += 1;
                } else {
                    i += 1;
                }
            }
            if hidden.len() == before {
                if layer == 0 && stalled {
                    tracing::debug!(left = hidden.len(), "Skeleton graph does not close");
                    return false;
                }
                stalled = layer == 0;
                contact = !contact;
                layer = 0;
            }
        }
        true
    }

    fn reached_neighbours(&self, reached: &FxHashSet<NodeKey>, node: NodeKey) -> usize {
        let Some(n) = self.nodes.get(node) else {
            return 0;
        };
        n.arcs
            .iter()
            .filter_map(|&k| self.arcs.get(k))
            .filter_map(|arc| {
                if arc.node_src == node {
                    arc.node_dst
                } else {
                    Some(arc.node_src)
                }
            })
            .filter(|other| reached.contains(other))
            .count()
    }

    /// Every finished arc ends no earlier than it starts and every link is
    /// mirrored.
    pub fn is_consistent(&self, eps: f64) -> bool {
        self.arcs.iter().all(|(key, arc)| {
            let Some(src) = self.nodes.get(arc.node_src) else {
                return false;
            };
            if !src.arcs.contains(&key) {
                return false;
            }
            let dst_ok = match arc.node_dst {
                None => true,
                Some(d) => self
                    .nodes
                    .get(d)
                    .is_some_and(|dst| dst.offset >= src.offset - eps && dst.arcs.contains(&key)),
            };
            dst_ok
                && arc
                    .sheets
                    .iter()
                    .all(|&s| self.sheets.get(s).is_some_and(|s| s.arcs.contains(&key)))
        }) && self.sheets.iter().all(|(key, sheet)| {
            sheet
                .nodes
                .iter()
                .all(|&n| self.nodes.get(n).is_some_and(|n| n.sheets.contains(&key)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arcs_link_both_nodes() {
        let mut skel = StraightSkeleton::new();
        let a = skel.add_node(Point3::new(0.0, 0.0, 0.0), 0.0);
        let b = skel.add_node(Point3::new(1.0, 1.0, 0.0), 1.0);
        let arc = skel.add_arc2(a, Vector2::new(1.0, 1.0), Some(3), Some(0));
        assert!(skel.arc(arc).unwrap().is_ray());
        assert!(skel.end_arc(arc, b));
        assert_eq!(skel.arc(arc).unwrap().node_dst(), Some(b));
        assert_eq!(skel.node(b).unwrap().arcs(), &[arc]);
        assert_eq!(skel.arc(arc).unwrap().edge_left(), Some(3));
        assert!(skel.is_consistent(0.0));
    }

    #[test]
    fn finished_arc_keeps_its_destination() {
        let mut skel = StraightSkeleton::new();
        let a = skel.add_node(Point3::new(0.0, 0.0, 0.0), 0.0);
        let b = skel.add_node(Point3::new(1.0, 0.0, 0.0), 1.0);
        let c = skel.add_node(Point3::new(2.0, 0.0, 0.0), 2.0);
        let arc = skel.connect(a, b).unwrap();
        assert!(!skel.end_arc(arc, c));
        assert!(skel.end_arc(arc, b));
        assert_eq!(skel.arc(arc).unwrap().node_dst(), Some(b));
        // an arc cannot end where it starts
        let ray = skel.add_arc(c, Vector3::new(1.0, 0.0, 0.0));
        assert!(!skel.end_arc(ray, c));
    }

    /// Boundary nodes at offset 0 plus an inner node linked to `links`.
    fn inner(skel: &mut StraightSkeleton, kind: EventKind, offset: f64, links: &[NodeKey]) -> NodeKey {
        let node = skel.add_node(Point3::new(offset, offset, offset), offset);
        for &l in links {
            skel.connect(l, node);
        }
        skel.record_event(kind, offset, Some(node));
        node
    }

    fn boundary(skel: &mut StraightSkeleton, n: usize) -> Vec<NodeKey> {
        (0..n).map(|i| skel.add_node(Point3::new(i as f64, 0.0, 0.0), 0.0)).collect()
    }

    #[test]
    fn graph_closes_through_vanish_events() {
        let mut skel = StraightSkeleton::new();
        let b = boundary(&mut skel, 4);
        let first = inner(&mut skel, EventKind::Edge, 1.0, &[b[0], b[1]]);
        inner(&mut skel, EventKind::Triangle, 2.0, &[first, b[2], b[3]]);
        assert!(skel.check_graph());
    }

    #[test]
    fn graph_alternates_into_contact_events() {
        let mut skel = StraightSkeleton::new();
        let b = boundary(&mut skel, 3);
        let touch = inner(&mut skel, EventKind::Pierce, 0.5, &[b[0], b[1]]);
        inner(&mut skel, EventKind::Edge, 1.0, &[touch, b[2]]);
        assert!(skel.check_graph());
    }

    #[test]
    fn node_with_one_link_leaves_the_graph_open() {
        let mut skel = StraightSkeleton::new();
        let b = boundary(&mut skel, 2);
        inner(&mut skel, EventKind::Edge, 1.0, &[b[0]]);
        assert!(!skel.check_graph());

        // without a recorded event a node is never reached
        let mut skel = StraightSkeleton::new();
        let b = boundary(&mut skel, 2);
        let node = skel.add_node(Point3::new(1.0, 1.0, 1.0), 1.0);
        skel.connect(b[0], node);
        skel.connect(b[1], node);
        assert!(!skel.check_graph());
    }

    #[test]
    fn backwards_arc_is_inconsistent() {
        let mut skel = StraightSkeleton::new();
        let a = skel.add_node(Point3::new(0.0, 0.0, 0.0), 2.0);
        let b = skel.add_node(Point3::new(1.0, 0.0, 0.0), 1.0);
        skel.connect(a, b);
        assert!(!skel.is_consistent(1e-9));
    }

    #[test]
    fn sheet_links_are_mirrored() {
        let mut skel = StraightSkeleton::new();
        let n = skel.add_node(Point3::new(0.0, 0.0, 0.0), 0.0);
        let arc = skel.add_arc(n, Vector3::new(0.0, 0.0, 1.0));
        let sheet = skel.add_sheet(Plane3::new(1.0, 0.0, 0.0, 0.0), 0, 1);
        assert!(skel.sheet_add_node(sheet, n));
        assert!(skel.sheet_add_arc(sheet, arc));
        assert!(skel.sheet_add_arc(sheet, arc));
        assert_eq!(skel.sheet(sheet).unwrap().arcs().len(), 1);
        assert_eq!(skel.arc(arc).unwrap().sheets(), &[sheet]);
        assert_eq!(skel.node(n).unwrap().sheets(), &[sheet]);
        assert!(skel.is_consistent(0.0));
    }

    #[test]
    fn arc_line_passes_through_source() {
        let mut skel = StraightSkeleton::new();
        let n = skel.add_node(Point3::new(1.0, 2.0, 0.0), 0.0);
        let arc = skel.add_arc2(n, Vector2::new(1.0, -1.0), None, None);
        let line = skel.arc_line2(arc).unwrap();
        assert_eq!(line.eval(Point2::new(1.0, 2.0)), 0.0);
        assert_eq!(line.eval(Point2::new(2.0, 1.0)), 0.0);
        let still = skel.add_arc(n, Vector3::new(0.0, 0.0, 0.0));
        assert!(skel.arc_line3(still).is_none());
    }

    #[test]
    fn removed_arc_leaves_no_links() {
        let mut skel = StraightSkeleton::new();
        let a = skel.add_node(Point3::new(0.0, 0.0, 0.0), 0.0);
        let b = skel.add_node(Point3::new(0.0, 0.0, 1.0), 1.0);
        let arc = skel.connect(a, b).unwrap();
        let sheet = skel.add_sheet(Plane3::new(1.0, 0.0, 0.0, 0.0), 0, 1);
        skel.sheet_add_arc(sheet, arc);
        assert!(skel.remove_arc(arc));
        assert!(!skel.remove_arc(arc));
        assert!(skel.node(a).unwrap().arcs().is_empty());
        assert!(skel.node(b).unwrap().arcs().is_empty());
        assert!(skel.sheet(sheet).unwrap().arcs().is_empty());
        assert!(skel.is_consistent(0.0));
    }

    #[test]
    fn nearby_node_is_found() {
        let mut skel = StraightSkeleton::new();
        let n = skel.add_node(Point3::new(2.0, 2.0, 0.0), 2.0);
        assert_eq!(skel.find_node(Point3::new(2.0, 2.0 + 1e-12, 0.0), 2.0, 1e-9), Some(n));
        assert_eq!(skel.find_node(Point3::new(2.0, 2.0, 0.0), 3.0, 1e-9), None);
    }
}

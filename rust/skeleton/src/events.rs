// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Skeleton events and the offset-ordered event queue.
//!
//! An event is one topological change of the wavefront (or an offset at
//! which the wavefront is recorded). The engines detect candidates against
//! the current mesh, schedule them in an [`EventQueue`] and handle them in
//! order of offset.
//!
//! Queue order is `(offset, kind rank, insertion sequence)`: the smallest
//! offset first, then the higher-ranked kind, then the earlier insertion.
//! Every topological event is stamped with the mesh epoch it was detected
//! in. The engine bumps the epoch after each round, which turns all older
//! candidates stale.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use straightskel_kernel::Point3;
use straightskel_mesh::{Edge2Key, EdgeKey, FacetKey, Highlight, Vertex2Key, VertexKey};

use crate::keys::{ArcKey, SheetKey};

/// Kinds of skeleton events across both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConstOffset,
    SaveOffset,
    Edge,
    Split,
    Triangle,
    EdgeMerge,
    DblEdgeMerge,
    DblTriangle,
    Tetrahedron,
    Vertex,
    FlipVertex,
    Surface,
    PolyhedronSplit,
    SplitMerge,
    EdgeSplit,
    Pierce,
}

impl EventKind {
    /// Tie-break rank among events at the same offset; higher goes first.
    pub fn rank(self) -> u8 {
        match self {
            EventKind::ConstOffset | EventKind::SaveOffset => 0,
            EventKind::Split => 1,
            EventKind::Edge => 2,
            EventKind::EdgeMerge => 3,
            EventKind::Triangle => 4,
            EventKind::DblEdgeMerge => 5,
            EventKind::DblTriangle => 6,
            EventKind::Tetrahedron => 7,
            EventKind::Vertex => 8,
            EventKind::FlipVertex => 9,
            EventKind::Surface => 10,
            EventKind::PolyhedronSplit => 11,
            EventKind::SplitMerge => 12,
            EventKind::EdgeSplit => 13,
            EventKind::Pierce => 14,
        }
    }

    /// Whether the event joins two parts of the wavefront that were apart,
    /// rather than letting a part of it vanish.
    pub fn is_contact(self) -> bool {
        self.rank() >= EventKind::Vertex.rank()
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::ConstOffset => "const offset",
            EventKind::SaveOffset => "save offset",
            EventKind::Edge => "edge",
            EventKind::Split => "split",
            EventKind::Triangle => "triangle",
            EventKind::EdgeMerge => "edge merge",
            EventKind::DblEdgeMerge => "double edge merge",
            EventKind::DblTriangle => "double triangle",
            EventKind::Tetrahedron => "tetrahedron",
            EventKind::Vertex => "vertex",
            EventKind::FlipVertex => "flip vertex",
            EventKind::Surface => "surface",
            EventKind::PolyhedronSplit => "polyhedron split",
            EventKind::SplitMerge => "split merge",
            EventKind::EdgeSplit => "edge split",
            EventKind::Pierce => "pierce",
        }
    }

    /// Offset events record the wavefront and never go stale.
    pub fn is_offset(self) -> bool {
        matches!(self, EventKind::ConstOffset | EventKind::SaveOffset)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An event payload that can be scheduled.
pub trait SkeletonEvent {
    fn kind(&self) -> EventKind;
}

/// Events of the polygon engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event2d {
    ConstOffset,
    /// `edge` shrinks to zero length.
    Edge { edge: Edge2Key },
    /// Reflex `vertex` runs into `edge`.
    Split { vertex: Vertex2Key, edge: Edge2Key },
    /// The 3-cycle of `edges` collapses.
    Triangle { edges: [Edge2Key; 3] },
}

impl SkeletonEvent for Event2d {
    fn kind(&self) -> EventKind {
        match self {
            Event2d::ConstOffset => EventKind::ConstOffset,
            Event2d::Edge { .. } => EventKind::Edge,
            Event2d::Split { .. } => EventKind::Split,
            Event2d::Triangle { .. } => EventKind::Triangle,
        }
    }
}

/// The two facets shared by a pair of vertices and the edges that border
/// them at each vertex: `edge_11`/`edge_12` at `vertex_1`, `edge_21`/`edge_22`
/// at `vertex_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexPair {
    pub vertex_1: VertexKey,
    pub vertex_2: VertexKey,
    pub facet_1: FacetKey,
    pub facet_2: FacetKey,
    pub edge_11: EdgeKey,
    pub edge_12: EdgeKey,
    pub edge_21: EdgeKey,
    pub edge_22: EdgeKey,
}

/// Events of the polyhedron engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event3d {
    ConstOffset,
    SaveOffset,
    /// `edge` vanishes between its two neighbours.
    Edge { edge: EdgeKey },
    /// `edge` vanishes in `facet` and `edge_1`, `edge_2` merge.
    EdgeMerge {
        edge: EdgeKey,
        facet: FacetKey,
        edge_1: EdgeKey,
        edge_2: EdgeKey,
    },
    /// The triangular `facet` vanishes.
    Triangle { facet: FacetKey, edge: EdgeKey },
    /// Reflex `edge` vanishes with merges on both sides.
    DblEdgeMerge {
        edge: EdgeKey,
        facet_1: FacetKey,
        facet_2: FacetKey,
        edge_11: EdgeKey,
        edge_12: EdgeKey,
        edge_21: EdgeKey,
        edge_22: EdgeKey,
    },
    /// Both triangles next to `edge` vanish.
    DblTriangle { edge: EdgeKey },
    /// The tetrahedron around `edge` vanishes.
    Tetrahedron { edge: EdgeKey },
    Vertex(VertexPair),
    FlipVertex(VertexPair),
    /// A vertex of `edge_1` runs into `edge_2`.
    Surface { edge_1: EdgeKey, edge_2: EdgeKey },
    /// Reflex `edge_1` cuts through `edge_2`, splitting the component.
    PolyhedronSplit { edge_1: EdgeKey, edge_2: EdgeKey },
    SplitMerge(VertexPair),
    /// Reflex edges `edge_1` and `edge_2` cross.
    EdgeSplit { edge_1: EdgeKey, edge_2: EdgeKey },
    /// Reflex `vertex` pierces `facet`.
    Pierce { vertex: VertexKey, facet: FacetKey },
}

impl SkeletonEvent for Event3d {
    fn kind(&self) -> EventKind {
        match self {
            Event3d::ConstOffset => EventKind::ConstOffset,
            Event3d::SaveOffset => EventKind::SaveOffset,
            Event3d::Edge { .. } => EventKind::Edge,
            Event3d::EdgeMerge { .. } => EventKind::EdgeMerge,
            Event3d::Triangle { .. } => EventKind::Triangle,
            Event3d::DblEdgeMerge { .. } => EventKind::DblEdgeMerge,
            Event3d::DblTriangle { .. } => EventKind::DblTriangle,
            Event3d::Tetrahedron { .. } => EventKind::Tetrahedron,
            Event3d::Vertex(_) => EventKind::Vertex,
            Event3d::FlipVertex(_) => EventKind::FlipVertex,
            Event3d::Surface { .. } => EventKind::Surface,
            Event3d::PolyhedronSplit { .. } => EventKind::PolyhedronSplit,
            Event3d::SplitMerge(_) => EventKind::SplitMerge,
            Event3d::EdgeSplit { .. } => EventKind::EdgeSplit,
            Event3d::Pierce { .. } => EventKind::Pierce,
        }
    }
}

/// An event with its offset, location and the skeleton elements that end
/// at its node.
#[derive(Debug, Clone)]
pub struct Scheduled<E> {
    pub event: E,
    pub offset: f64,
    /// Where the event happens (`z = 0` in the plane).
    pub point: Point3,
    /// Arcs that end at the event's node.
    pub arcs: SmallVec<[ArcKey; 4]>,
    /// Sheets that gain the event's node.
    pub sheets: SmallVec<[SheetKey; 6]>,
    pub(crate) epoch: u64,
    seq: u64,
    highlighted: bool,
}

impl<E: SkeletonEvent> Scheduled<E> {
    pub fn new(event: E, offset: f64, point: Point3) -> Self {
        Self {
            event,
            offset,
            point,
            arcs: SmallVec::new(),
            sheets: SmallVec::new(),
            epoch: 0,
            seq: 0,
            highlighted: false,
        }
    }

    /// An offset event at `offset`.
    pub fn at_offset(event: E, offset: f64) -> Self {
        Self::new(event, offset, Point3::new(0.0, 0.0, 0.0))
    }

    pub fn with_arcs(mut self, arcs: impl IntoIterator<Item = Option<ArcKey>>) -> Self {
        for arc in arcs.into_iter().flatten() {
            if !self.arcs.contains(&arc) {
                self.arcs.push(arc);
            }
        }
        self
    }

    pub fn with_sheets(mut self, sheets: impl IntoIterator<Item = Option<SheetKey>>) -> Self {
        for sheet in sheets.into_iter().flatten() {
            if !self.sheets.contains(&sheet) {
                self.sheets.push(sheet);
            }
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Detected in an earlier epoch than `epoch`.
    pub fn is_stale(&self, epoch: u64) -> bool {
        !self.kind().is_offset() && self.epoch != epoch
    }
}

impl<E> Highlight for Scheduled<E> {
    fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    fn set_highlight(&mut self, highlight: bool) {
        self.highlighted = highlight;
    }
}

impl<E: SkeletonEvent> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E: SkeletonEvent> Eq for Scheduled<E> {}

impl<E: SkeletonEvent> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E: SkeletonEvent> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .offset
            .total_cmp(&self.offset)
            .then_with(|| self.kind().rank().cmp(&other.kind().rank()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of scheduled events.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Scheduled<E>>,
    seq: u64,
    epoch: u64,
}

impl<E: SkeletonEvent> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SkeletonEvent> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
            epoch: 0,
        }
    }

    /// Current mesh epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Starts a new epoch and drops every topological event of the old one.
    pub fn advance_epoch(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        let before = self.heap.len();
        self.heap.retain(|s| !s.is_stale(epoch));
        let dropped = before - self.heap.len();
        if dropped > 0 {
            tracing::trace!(dropped, epoch, "Discarded stale events");
        }
    }

    /// Schedules `event` in the current epoch.
    pub fn push(&mut self, mut event: Scheduled<E>) {
        event.epoch = self.epoch;
        event.seq = self.seq;
        self.seq += 1;
        self.heap.push(event);
    }

    /// Removes and returns the next event of the current epoch.
    pub fn pop(&mut self) -> Option<Scheduled<E>> {
        while let Some(event) = self.heap.pop() {
            if event.is_stale(self.epoch) {
                tracing::trace!(kind = %event.kind(), offset = event.offset, "Skipping stale event");
                continue;
            }
            return Some(event);
        }
        None
    }

    /// Offset of the next event of the current epoch.
    pub fn peek_offset(&mut self) -> Option<f64> {
        while let Some(top) = self.heap.peek() {
            if top.is_stale(self.epoch) {
                self.heap.pop();
                continue;
            }
            return Some(top.offset);
        }
        None
    }

    /// Any topological event of the current epoch is queued.
    pub fn has_topological(&self) -> bool {
        self.heap
            .iter()
            .any(|s| !s.kind().is_offset() && s.epoch == self.epoch)
    }

    /// Any event of `kind` is queued.
    pub fn contains_kind(&self, kind: EventKind) -> bool {
        self.heap.iter().any(|s| s.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Next multiple of `step` strictly beyond `offset`.
pub fn next_const_offset(offset: f64, step: f64) -> f64 {
    let mut next = (offset / step + 1.0).floor() * step;
    if next <= offset {
        next += step;
    }
    next
}

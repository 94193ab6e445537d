// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON export for straight skeletons.
//!
//! Keys become insertion ids, as in the mesh snapshots, and recorded
//! offset meshes are embedded as mesh snapshots.

use serde::{Deserialize, Serialize};
use straightskel_mesh::{PolygonSnapshot, PolyhedronSnapshot};

use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::graph::StraightSkeleton;
use crate::keys::{ArcKey, NodeKey};

#[derive(Debug, Serialize, Deserialize)]
pub struct SkeletonSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub arcs: Vec<ArcSnapshot>,
    pub sheets: Vec<SheetSnapshot>,
    pub events: Vec<EventSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offset_polygons: Vec<OffsetSnapshot<PolygonSnapshot>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offset_polyhedra: Vec<OffsetSnapshot<PolyhedronSnapshot>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub offset: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArcSnapshot {
    pub id: usize,
    pub src: usize,
    /// Absent for rays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<usize>,
    pub direction: [f64; 3],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub id: usize,
    /// Plane coefficients `[a, b, c, d]`.
    pub plane: [f64; 4],
    pub facet_b: usize,
    pub facet_f: usize,
    pub nodes: Vec<usize>,
    pub arcs: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub kind: EventKind,
    pub offset: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OffsetSnapshot<T> {
    pub offset: f64,
    pub mesh: T,
}

impl StraightSkeleton {
    /// Serializes the skeleton to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Snapshot ordered by id.
    pub fn to_snapshot(&self) -> SkeletonSnapshot {
        let node_id = |k: NodeKey| self.nodes.get(k).map(|n| n.id);
        let arc_id = |k: ArcKey| self.arcs.get(k).map(|a| a.id);

        let mut nodes: Vec<NodeSnapshot> = self
            .nodes
            .values()
            .map(|n| NodeSnapshot {
                id: n.id,
                x: n.point.x,
                y: n.point.y,
                z: n.point.z,
                offset: n.offset,
            })
            .collect();
        let mut arcs: Vec<ArcSnapshot> = self
            .arcs
            .values()
            .filter_map(|a| {
                Some(ArcSnapshot {
                    id: a.id,
                    src: node_id(a.node_src)?,
                    dst: a.node_dst.and_then(node_id),
                    direction: [a.direction.x, a.direction.y, a.direction.z],
                })
            })
            .collect();
        let mut sheets: Vec<SheetSnapshot> = self
            .sheets
            .values()
            .map(|s| SheetSnapshot {
                id: s.id,
                plane: [s.plane.a, s.plane.b, s.plane.c, s.plane.d],
                facet_b: s.facet_b,
                facet_f: s.facet_f,
                nodes: s.nodes.iter().filter_map(|&k| node_id(k)).collect(),
                arcs: s.arcs.iter().filter_map(|&k| arc_id(k)).collect(),
            })
            .collect();
        nodes.sort_by_key(|n| n.id);
        arcs.sort_by_key(|a| a.id);
        sheets.sort_by_key(|s| s.id);

        let events = self
            .events
            .iter()
            .map(|e| EventSnapshot {
                kind: e.kind,
                offset: e.offset,
                node: e.node.and_then(node_id),
            })
            .collect();
        let offset_polygons = self
            .offset_polygons
            .iter()
            .map(|(offset, polygon)| OffsetSnapshot {
                offset: *offset,
                mesh: polygon.to_snapshot(),
            })
            .collect();
        let offset_polyhedra = self
            .offset_polyhedra
            .iter()
            .map(|(offset, polyhedron)| OffsetSnapshot {
                offset: *offset,
                mesh: polyhedron.to_snapshot(),
            })
            .collect();

        SkeletonSnapshot {
            nodes,
            arcs,
            sheets,
            events,
            offset_polygons,
            offset_polyhedra,
        }
    }
}

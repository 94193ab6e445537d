// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON export for polygons and polyhedra.
//!
//! Keys are replaced by the entities' insertion ids, so a snapshot stays
//! readable after the mesh is dropped.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::polygon::Polygon;
use crate::polyhedron::Polyhedron;

#[derive(Debug, Serialize, Deserialize)]
pub struct PolygonSnapshot {
    pub vertices: Vec<Vertex2Snapshot>,
    pub edges: Vec<Edge2Snapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Vertex2Snapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Edge2Snapshot {
    pub id: usize,
    pub src: usize,
    pub dst: usize,
    pub speed: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolyhedronSnapshot {
    pub vertices: Vec<VertexSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub facets: Vec<FacetSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VertexSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: usize,
    pub src: usize,
    pub dst: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_l: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet_r: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FacetSnapshot {
    pub id: usize,
    /// Plane coefficients `[a, b, c, d]`.
    pub plane: [f64; 4],
    pub speed: f64,
    pub vertices: Vec<usize>,
    pub edges: Vec<usize>,
}

impl Polygon {
    /// Serializes the polygon to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Snapshot in list order.
    pub fn to_snapshot(&self) -> PolygonSnapshot {
        let vertices = self
            .vertex_keys()
            .iter()
            .filter_map(|&k| self.vertex(k))
            .map(|v| Vertex2Snapshot {
                id: v.id,
                x: v.point.x,
                y: v.point.y,
            })
            .collect();
        let edges = self
            .edge_keys()
            .iter()
            .filter_map(|&k| self.edge(k))
            .filter_map(|e| {
                Some(Edge2Snapshot {
                    id: e.id,
                    src: self.vertex(e.src)?.id,
                    dst: self.vertex(e.dst)?.id,
                    speed: e.speed,
                })
            })
            .collect();
        PolygonSnapshot { vertices, edges }
    }
}

impl Polyhedron {
    /// Serializes the polyhedron to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Snapshot ordered by id.
    pub fn to_snapshot(&self) -> PolyhedronSnapshot {
        let vertex_id = |k| self.vertices.get(k).map(|v| v.id);
        let facet_id = |k: Option<_>| k.and_then(|k| self.facets.get(k)).map(|f| f.id);

        let mut vertices: Vec<VertexSnapshot> = self
            .vertices
            .values()
            .map(|v| VertexSnapshot {
                id: v.id,
                x: v.point.x,
                y: v.point.y,
                z: v.point.z,
            })
            .collect();
        let mut edges: Vec<EdgeSnapshot> = self
            .edges
            .values()
            .filter_map(|e| {
                Some(EdgeSnapshot {
                    id: e.id,
                    src: vertex_id(e.src)?,
                    dst: vertex_id(e.dst)?,
                    facet_l: facet_id(e.facet_l),
                    facet_r: facet_id(e.facet_r),
                })
            })
            .collect();
        let mut facets: Vec<FacetSnapshot> = self
            .facets
            .values()
            .map(|f| FacetSnapshot {
                id: f.id,
                plane: [f.plane.a, f.plane.b, f.plane.c, f.plane.d],
                speed: f.speed,
                vertices: f.vertices.iter().filter_map(|&v| vertex_id(v)).collect(),
                edges: f
                    .edges
                    .iter()
                    .filter_map(|&e| self.edges.get(e).map(|e| e.id))
                    .collect(),
            })
            .collect();

        vertices.sort_by_key(|v| v.id);
        edges.sort_by_key(|e| e.id);
        facets.sort_by_key(|f| f.id);
        PolyhedronSnapshot {
            vertices,
            edges,
            facets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use straightskel_kernel::{Point2, Point3};

    #[test]
    fn polygon_snapshot_keeps_ring_order() {
        let p = Polygon::from_points(&[
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        let snap = p.to_snapshot();
        assert_eq!(snap.vertices.len(), 3);
        let ring: Vec<(usize, usize)> = snap.edges.iter().map(|e| (e.src, e.dst)).collect();
        assert_eq!(ring, vec![(0, 1), (1, 2), (2, 0)]);
        assert!(p.to_json().unwrap().contains("\"speed\": 1.0"));
    }

    #[test]
    fn polyhedron_json_parses_back() {
        let p = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        let json = p.to_json().unwrap();
        let back: PolyhedronSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vertices.len(), 8);
        assert_eq!(back.edges.len(), 12);
        assert_eq!(back.facets.len(), 6);
        assert!(back.edges.iter().all(|e| e.facet_l.is_some() && e.facet_r.is_some()));
        assert!(back.facets.iter().all(|f| f.vertices.len() == 4));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders that sew facets into a closed polyhedron.
//!
//! Facets are given as counter-clockwise corner lists seen from outside. A
//! facet reuses the edge its neighbour already created along their shared
//! side, so a closed input yields every edge exactly once with both facet
//! slots filled.

use straightskel_kernel::{ActiveKernel, Kernel, Plane3, Point3};

use crate::error::{Error, Result};
use crate::keys::{FacetKey, VertexKey};
use crate::polyhedron::Polyhedron;

impl Polyhedron {
    /// Adds a facet bounded by `corners` in counter-clockwise order seen
    /// from outside, sharing edges with facets added before it.
    pub fn add_facet_from_vertices(&mut self, corners: &[VertexKey]) -> Result<FacetKey> {
        if corners.len() < 3 {
            return Err(Error::TooFewVertices(corners.len()));
        }
        let facet = self.add_facet(Plane3::new(0.0, 0.0, 1.0, 0.0));
        for i in 0..corners.len() {
            let a = corners[i];
            let b = corners[(i + 1) % corners.len()];
            let reversed = self.vertices.get(a).and_then(|v| {
                v.edges.iter().copied().find(|&e| {
                    let edge = &self.edges[e];
                    edge.src == b && edge.dst == a && edge.facet_r.is_none()
                })
            });
            let forward = self.vertices.get(a).and_then(|v| {
                v.edges.iter().copied().find(|&e| {
                    let edge = &self.edges[e];
                    edge.src == a && edge.dst == b && edge.facet_l.is_none()
                })
            });
            let edge = match (reversed, forward) {
                (Some(e), _) => {
                    self.edges[e].facet_r = Some(facet);
                    e
                }
                (None, Some(e)) => {
                    self.edges[e].facet_l = Some(facet);
                    e
                }
                (None, None) => {
                    let e = self.add_edge(a, b)?;
                    self.edges[e].facet_l = Some(facet);
                    e
                }
            };
            self.facet_add_edge(facet, edge)?;
        }
        self.init_plane(facet);
        Ok(facet)
    }

    /// Builds a closed polyhedron from points and facets given as point
    /// indices, then sorts all adjacency lists.
    pub fn from_faces(points: &[Point3], faces: &[Vec<usize>]) -> Result<Polyhedron> {
        let mut polyhedron = Polyhedron::new();
        let keys: Vec<VertexKey> = points.iter().map(|&p| polyhedron.add_vertex(p)).collect();
        for face in faces {
            let corners = face
                .iter()
                .map(|&i| {
                    keys.get(i).copied().ok_or_else(|| {
                        Error::Inconsistent(format!("face references missing point {}", i))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            polyhedron.add_facet_from_vertices(&corners)?;
        }
        polyhedron.sort()?;
        Ok(polyhedron)
    }

    /// Creates an axis-aligned box from min/max corners.
    pub fn make_box(min: Point3, max: Point3) -> Result<Polyhedron> {
        let (x0, y0, z0) = (min.x, min.y, min.z);
        let (x1, y1, z1) = (max.x, max.y, max.z);
        let points = [
            Point3::new(x0, y0, z0),
            Point3::new(x1, y0, z0),
            Point3::new(x1, y1, z0),
            Point3::new(x0, y1, z0),
            Point3::new(x0, y0, z1),
            Point3::new(x1, y0, z1),
            Point3::new(x1, y1, z1),
            Point3::new(x0, y1, z1),
        ];
        let faces = [
            // bottom (z=z0), outward normal = -Z
            vec![0, 3, 2, 1],
            // top (z=z1), outward normal = +Z
            vec![4, 5, 6, 7],
            // front (y=y0), outward normal = -Y
            vec![0, 1, 5, 4],
            // back (y=y1), outward normal = +Y
            vec![3, 7, 6, 2],
            // left (x=x0), outward normal = -X
            vec![0, 4, 7, 3],
            // right (x=x1), outward normal = +X
            vec![1, 2, 6, 5],
        ];
        Self::from_faces(&points, &faces)
    }

    /// Creates a tetrahedron, reordering the corners so every facet faces
    /// outwards.
    pub fn make_tetrahedron(p1: Point3, p2: Point3, p3: Point3, p4: Point3) -> Result<Polyhedron> {
        let side = ActiveKernel::side_plane(&Plane3::from_points(p1, p2, p3), p4);
        let points = match side {
            0 => {
                return Err(Error::Inconsistent(
                    "tetrahedron corners are coplanar".to_string(),
                ))
            }
            s if s > 0 => [p2, p1, p3, p4],
            _ => [p1, p2, p3, p4],
        };
        let faces = [vec![0, 1, 2], vec![0, 3, 1], vec![1, 3, 2], vec![2, 3, 0]];
        Self::from_faces(&points, &faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_box_sews_twelve_edges() {
        let p = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 4.0)).unwrap();
        assert_eq!(p.vertex_count(), 8);
        assert_eq!(p.edge_count(), 12);
        assert_eq!(p.facet_count(), 6);
        for (_, e) in p.edges() {
            assert!(e.facet_l().is_some() && e.facet_r().is_some());
        }
        for v in p.vertex_keys() {
            assert_eq!(p.degree(v), 3);
        }
        assert!(p.is_consistent());
    }

    #[test]
    fn tetrahedron_orientation_is_fixed_up() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let d = Point3::new(0.0, 0.0, 1.0);
        // d lies on the positive side of (a, b, c), so the corners are swapped
        for p in [
            Polyhedron::make_tetrahedron(a, b, c, d).unwrap(),
            Polyhedron::make_tetrahedron(b, a, c, d).unwrap(),
        ] {
            assert_eq!(p.edge_count(), 6);
            let inside = Point3::new(0.2, 0.2, 0.2);
            for (_, f) in p.facets() {
                assert_eq!(ActiveKernel::side_plane(&f.plane, inside), -1);
            }
        }
    }

    #[test]
    fn coplanar_tetrahedron_rejected() {
        let r = Polyhedron::make_tetrahedron(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        assert!(matches!(r, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn facet_needs_three_corners() {
        let mut p = Polyhedron::new();
        let a = p.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = p.add_vertex(Point3::new(1.0, 0.0, 0.0));
        assert!(matches!(
            p.add_facet_from_vertices(&[a, b]),
            Err(Error::TooFewVertices(2))
        ));
    }

    #[test]
    fn missing_point_index_rejected() {
        let r = Polyhedron::from_faces(&[Point3::new(0.0, 0.0, 0.0)], &[vec![0, 1, 2]]);
        assert!(r.is_err());
    }
}

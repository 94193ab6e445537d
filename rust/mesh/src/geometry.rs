// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries on polyhedron entities.
//!
//! Supporting lines and planes, reflexivity, bounding boxes and the
//! projection of a facet onto the XY plane.

use straightskel_kernel::{ActiveKernel, Kernel, Line3, Plane3, Point2, Point3, Segment3, Vector3};

use crate::keys::{Edge2Key, EdgeKey, FacetKey, VertexKey};
use crate::polygon::Polygon;
use crate::polyhedron::Polyhedron;

impl Polyhedron {
    /// Supporting line of an edge, directed `src → dst`. `None` while both
    /// endpoints coincide.
    pub fn edge_line(&self, edge: EdgeKey) -> Option<Line3> {
        let e = self.edges.get(edge)?;
        let p = self.point(e.src)?;
        let q = self.point(e.dst)?;
        if p == q {
            return None;
        }
        Some(Line3::through(p, q))
    }

    pub fn edge_segment(&self, edge: EdgeKey) -> Option<Segment3> {
        let e = self.edges.get(edge)?;
        Some(Segment3::new(self.point(e.src)?, self.point(e.dst)?))
    }

    /// An edge is reflex when the dihedral angle inside the solid exceeds
    /// `π`: a point stepped from the edge into its left facet lies in front
    /// of the right facet's plane.
    pub fn is_reflex(&self, edge: EdgeKey) -> bool {
        let Some(e) = self.edges.get(edge) else {
            return false;
        };
        let (Some(fl), Some(fr)) = (
            e.facet_l.and_then(|f| self.facets.get(f)),
            e.facet_r.and_then(|f| self.facets.get(f)),
        ) else {
            return false;
        };
        let (Some(src), Some(dst)) = (self.point(e.src), self.point(e.dst)) else {
            return false;
        };
        let dir = dst - src;
        let p = src + fl.plane.normal().cross(dir);
        ActiveKernel::side_plane(&fr.plane, p) > 0
    }

    /// Every incident edge is reflex.
    pub fn is_reflex_vertex(&self, vertex: VertexKey) -> bool {
        self.vertices.get(vertex).is_some_and(|v| {
            !v.edges.is_empty() && v.edges.iter().all(|&e| self.is_reflex(e))
        })
    }

    /// No incident edge is reflex.
    pub fn is_convex_vertex(&self, vertex: VertexKey) -> bool {
        self.vertices.get(vertex).is_some_and(|v| {
            !v.edges.is_empty() && v.edges.iter().all(|&e| !self.is_reflex(e))
        })
    }

    /// Boundary edges of `facet` in walk order, starting at its first edge.
    /// `None` if the boundary does not close.
    pub fn facet_boundary(&self, facet: FacetKey) -> Option<Vec<EdgeKey>> {
        let f = self.facets.get(facet)?;
        let &start = f.edges.first()?;
        let count = f.edges.len();
        let mut walk = Vec::with_capacity(count);
        let mut edge = start;
        loop {
            walk.push(edge);
            edge = self.next_in(edge, facet)?;
            if edge == start {
                return Some(walk);
            }
            if walk.len() >= count {
                return None;
            }
        }
    }

    /// Corner positions of `facet` in boundary order.
    pub fn facet_points(&self, facet: FacetKey) -> Option<Vec<Point3>> {
        self.facet_boundary(facet)?
            .into_iter()
            .map(|e| self.src_in(e, facet).and_then(|v| self.point(v)))
            .collect()
    }

    /// Recomputes the supporting plane of `facet` from its boundary: the
    /// Newell normal, through the first corner. Returns `false` and leaves
    /// the plane untouched for an open or degenerate boundary.
    pub fn init_plane(&mut self, facet: FacetKey) -> bool {
        let Some(points) = self.facet_points(facet) else {
            return false;
        };
        if points.len() < 3 {
            return false;
        }

        // Newell's method
        let mut normal = Vector3::new(0.0, 0.0, 0.0);
        let n = points.len();
        for i in 0..n {
            let curr = points[i];
            let next = points[(i + 1) % n];
            normal.x += (curr.y - next.y) * (curr.z + next.z);
            normal.y += (curr.z - next.z) * (curr.x + next.x);
            normal.z += (curr.x - next.x) * (curr.y + next.y);
        }
        if normal.squared_length() == 0.0 {
            return false;
        }

        let normal = ActiveKernel::normalize3(normal);
        self.facets[facet].plane = Plane3::from_point_normal(points[0], normal);
        true
    }

    /// Projects `facet` onto the XY plane, rotating its normal onto `+z` so
    /// the boundary stays counter-clockwise.
    ///
    /// Polygon edge `i` corresponds to the `i`-th boundary edge; the map
    /// pairs them up.
    pub fn facet_to_polygon(&self, facet: FacetKey) -> Option<(Polygon, Vec<(EdgeKey, Edge2Key)>)> {
        let f = self.facets.get(facet)?;
        let boundary = self.facet_boundary(facet)?;
        let n = ActiveKernel::normalize3(f.plane.normal());
        let (axis, angle) = if n.x == 0.0 && n.y == 0.0 {
            if n.z < 0.0 {
                (Vector3::new(1.0, 0.0, 0.0), std::f64::consts::PI)
            } else {
                (Vector3::new(0.0, 0.0, 0.0), 0.0)
            }
        } else {
            (Vector3::new(n.y, -n.x, 0.0), n.z.clamp(-1.0, 1.0).acos())
        };

        let points: Vec<Point2> = boundary
            .iter()
            .map(|&e| {
                let p = self.point(self.src_in(e, facet)?)?;
                let r = ActiveKernel::rotate_vector(p.to_vector(), axis, angle);
                Some(Point2::new(r.x, r.y))
            })
            .collect::<Option<_>>()?;
        let polygon = Polygon::from_points(&points).ok()?;
        let map = boundary
            .into_iter()
            .zip(polygon.edge_keys().iter().copied())
            .collect();
        Some((polygon, map))
    }

    /// Axis-aligned bounds of all vertices, `None` when empty.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let mut points = self.vertices.values().map(|v| v.point);
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (
                Point3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Polyhedron {
        Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap()
    }

    /// An L-shaped prism: the edge along the inner corner is reflex.
    fn l_prism() -> Polyhedron {
        let outline = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)];
        let mut points: Vec<Point3> = outline.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        points.extend(outline.iter().map(|&(x, y)| Point3::new(x, y, 1.0)));
        let n = outline.len();
        let mut faces = vec![(0..n).rev().collect::<Vec<_>>(), (n..2 * n).collect()];
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push(vec![i, j, n + j, n + i]);
        }
        Polyhedron::from_faces(&points, &faces).unwrap()
    }

    #[test]
    fn box_has_no_reflex_edges() {
        let p = unit_box();
        assert!(p.edge_keys().into_iter().all(|e| !p.is_reflex(e)));
        assert!(p.vertex_keys().into_iter().all(|v| p.is_convex_vertex(v)));
    }

    #[test]
    fn inner_corner_of_l_prism_is_reflex() {
        let p = l_prism();
        let reflex: Vec<EdgeKey> = p.edge_keys().into_iter().filter(|&e| p.is_reflex(e)).collect();
        assert_eq!(reflex.len(), 1);
        let seg = p.edge_segment(reflex[0]).unwrap();
        assert_eq!((seg.src.x, seg.src.y), (1.0, 1.0));
        assert_eq!((seg.dst.x, seg.dst.y), (1.0, 1.0));
    }

    #[test]
    fn planes_face_outwards() {
        let p = unit_box();
        let centre = Point3::new(0.5, 0.5, 0.5);
        for (_, f) in p.facets() {
            assert_eq!(ActiveKernel::side_plane(&f.plane, centre), -1);
            assert_relative_eq!(f.plane.normal().length(), 1.0);
        }
    }

    #[test]
    fn every_facet_projects_counter_clockwise() {
        let p = l_prism();
        for f in p.facet_keys() {
            let (polygon, map) = p.facet_to_polygon(f).unwrap();
            assert!(polygon.area() > 0.0);
            assert_eq!(map.len(), p.facet(f).unwrap().edges().len());
        }
    }

    #[test]
    fn projection_keeps_lengths() {
        let p = unit_box();
        for f in p.facet_keys() {
            let (polygon, map) = p.facet_to_polygon(f).unwrap();
            for (e3, e2) in map {
                let l3 = p.edge_segment(e3).unwrap().length();
                let l2 = polygon.edge_segment(e2).unwrap().length();
                assert_relative_eq!(l3, l2, epsilon = 1e-12);
            }
            assert_relative_eq!(polygon.area(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn bounding_box_spans_corners() {
        let p = Polyhedron::make_box(Point3::new(-1.0, 0.0, 2.0), Point3::new(3.0, 1.0, 5.0)).unwrap();
        let (lo, hi) = p.bounding_box().unwrap();
        assert_eq!(lo, Point3::new(-1.0, 0.0, 2.0));
        assert_eq!(hi, Point3::new(3.0, 1.0, 5.0));
        assert!(Polyhedron::new().bounding_box().is_none());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Self-intersection tests for polyhedral surfaces.
//!
//! Competing rewirings of the wavefront are compared by building each one
//! as a small patch, moving its facets one unit inwards and rejecting the
//! patch if its surface then crosses itself. A surface crosses itself when
//! two edges of one facet intersect, or when an edge pierces the inside of
//! a facet it does not touch.
//!
//! Patches are open: their border vertices have degree 1 and stand for the
//! rest of the wavefront. With `rays` set, such an edge is followed past
//! its degree-1 end without limit.

use straightskel_kernel::{ActiveKernel, Kernel, Line3, Plane3, Point3};
use straightskel_mesh::{EdgeKey, FacetKey, Polyhedron, VertexKey};

// ============================================================================
// Edge pairs within a facet
// ============================================================================

/// Endpoints of `edge`, each pushed out to infinity when `rays` is set and
/// it has degree 1.
fn reach(polyhedron: &Polyhedron, edge: EdgeKey, rays: bool) -> Option<(Point3, Point3)> {
    let e = polyhedron.edge(edge)?;
    let (src, dst) = (polyhedron.point(e.src())?, polyhedron.point(e.dst())?);
    if !rays {
        return Some((src, dst));
    }
    // 0 * MAX stays 0 where infinity would give NaN
    let far_src = if polyhedron.degree(e.src()) == 1 {
        src + (src - dst) * f64::MAX
    } else {
        src
    };
    let far_dst = if polyhedron.degree(e.dst()) == 1 {
        dst + (dst - src) * f64::MAX
    } else {
        dst
    };
    Some((far_src, far_dst))
}

/// Where two edges bounding `facet` meet.
///
/// Edges sharing an endpoint meet there. Otherwise each edge is widened
/// into a plane along the facet normal and the two planes are cut with the
/// facet's plane.
pub fn intersect_edges(
    polyhedron: &Polyhedron,
    facet: FacetKey,
    edge_1: EdgeKey,
    edge_2: EdgeKey,
    rays: bool,
) -> Option<Point3> {
    let (e1, e2) = (polyhedron.edge(edge_1)?, polyhedron.edge(edge_2)?);
    if e1.src() == e2.src() || e1.src() == e2.dst() {
        return polyhedron.point(e1.src());
    }
    if e1.dst() == e2.src() || e1.dst() == e2.dst() {
        return polyhedron.point(e1.dst());
    }
    let plane = polyhedron.facet(facet)?.plane;
    let normal = plane.normal();
    let (p11, p12) = (polyhedron.point(e1.src())?, polyhedron.point(e1.dst())?);
    let (p21, p22) = (polyhedron.point(e2.src())?, polyhedron.point(e2.dst())?);
    let wall_1 = Plane3::from_points(p11, p12, p11 + normal);
    let wall_2 = Plane3::from_points(p21, p22, p21 + normal);
    let mut point = ActiveKernel::intersect_planes3(&wall_1, &wall_2, &plane)?;
    // snap coordinates an edge keeps constant, or the box tests below miss
    // by rounding
    for i in 0..3 {
        if p11[i] == p12[i] {
            point = ActiveKernel::replace_coord3(point, p11, i);
        } else if p21[i] == p22[i] {
            point = ActiveKernel::replace_coord3(point, p21, i);
        }
    }
    let (a1, b1) = reach(polyhedron, edge_1, rays)?;
    let (a2, b2) = reach(polyhedron, edge_2, rays)?;
    (ActiveKernel::is_inside3(point, a1, b1) && ActiveKernel::is_inside3(point, a2, b2)).then_some(point)
}

/// Whether two edges of `facet` without a common endpoint cross.
pub fn is_self_intersecting_facet(polyhedron: &Polyhedron, facet: FacetKey) -> bool {
    let Some(edges) = polyhedron.facet(facet).map(|f| f.edges().to_vec()) else {
        return false;
    };
    for (i, &edge_1) in edges.iter().enumerate() {
        for &edge_2 in &edges[i + 1..] {
            let (Some(e1), Some(e2)) = (polyhedron.edge(edge_1), polyhedron.edge(edge_2)) else {
                continue;
            };
            if e1.has_vertex(e2.src()) || e1.has_vertex(e2.dst()) {
                continue;
            }
            if intersect_edges(polyhedron, facet, edge_1, edge_2, true).is_some() {
                return true;
            }
        }
    }
    false
}

/// Number of facets with crossing edges.
pub fn count_self_intersecting_facets(polyhedron: &Polyhedron) -> usize {
    polyhedron
        .facet_keys()
        .into_iter()
        .filter(|&f| is_self_intersecting_facet(polyhedron, f))
        .count()
}

// ============================================================================
// Edges through facets
// ============================================================================

/// Plane halving the corner of `facet` at `vertex`, perpendicular to the
/// facet. Points on its positive side lie past the corner in the direction
/// of the outgoing edge.
fn corner_bisector(polyhedron: &Polyhedron, facet: FacetKey, vertex: VertexKey) -> Option<Plane3> {
    let v = polyhedron.vertex(vertex)?;
    let mut edge_in = None;
    let mut edge_out = None;
    for &edge in v.edges() {
        if polyhedron.src_in(edge, facet) == Some(vertex) {
            edge_out = Some(edge);
        } else if polyhedron.dst_in(edge, facet) == Some(vertex) {
            edge_in = Some(edge);
        }
    }
    let point = v.point;
    let p_in = polyhedron.point(polyhedron.src_in(edge_in?, facet)?)?;
    let p_out = polyhedron.point(polyhedron.dst_in(edge_out?, facet)?)?;
    let up = point + polyhedron.facet(facet)?.plane.normal();
    let plane_in = Plane3::from_points(p_in, point, up);
    let plane_out = Plane3::from_points(point, p_out, up);
    if ActiveKernel::side_plane(&plane_in, p_out) > 0 {
        ActiveKernel::bisector_planes(&plane_in, &ActiveKernel::opposite_plane(&plane_out))
    } else {
        ActiveKernel::bisector_planes(&ActiveKernel::opposite_plane(&plane_in), &plane_out)
    }
}

/// The edge of `facet` closest to `point` among those whose corner
/// bisectors enclose it.
fn nearest_edge(polyhedron: &Polyhedron, facet: FacetKey, point: Point3) -> Option<EdgeKey> {
    let mut best = None;
    let mut dist_min = f64::MAX;
    for &edge in polyhedron.facet(facet)?.edges() {
        let (Some(src), Some(dst)) = (polyhedron.src_in(edge, facet), polyhedron.dst_in(edge, facet)) else {
            continue;
        };
        let behind_src = polyhedron.degree(src) > 1
            && corner_bisector(polyhedron, facet, src).is_some_and(|b| ActiveKernel::side_plane(&b, point) < 0);
        let past_dst = polyhedron.degree(dst) > 1
            && corner_bisector(polyhedron, facet, dst).is_some_and(|b| ActiveKernel::side_plane(&b, point) > 0);
        if behind_src || past_dst {
            continue;
        }
        let Some(line) = polyhedron.edge_line(edge) else {
            continue;
        };
        let dist = ActiveKernel::distance_line3_point(&line, point);
        if dist < dist_min {
            best = Some(edge);
            dist_min = dist;
        }
    }
    best
}

/// Whether `edge` passes through the inside of `facet`.
///
/// Edges bordering the facet or touching one of its corners never do. The
/// point where the edge meets the facet's plane is inside when it lies to
/// the left of the nearest facet edge, walked the way the facet runs.
pub fn is_edge_inside_facet(polyhedron: &Polyhedron, facet: FacetKey, edge: EdgeKey, rays: bool) -> bool {
    let (Some(f), Some(e)) = (polyhedron.facet(facet), polyhedron.edge(edge)) else {
        return false;
    };
    if e.has_facet(facet) || f.contains_vertex(e.src()) || f.contains_vertex(e.dst()) {
        return false;
    }
    let Some(line) = polyhedron.edge_line(edge) else {
        return false;
    };
    let Some(point) = ActiveKernel::intersect_plane_line(&f.plane, &line) else {
        return false;
    };
    let Some((src, dst)) = reach(polyhedron, edge, rays) else {
        return false;
    };
    if !ActiveKernel::is_inside3(point, src, dst) {
        return false;
    }
    let Some(nearest) = nearest_edge(polyhedron, facet, point) else {
        return false;
    };
    let (Some(border), Some(n)) = (polyhedron.edge_line(nearest), polyhedron.edge(nearest)) else {
        return false;
    };
    let up = Line3::new(point, f.plane.normal());
    let turn = ActiveKernel::orientation(&border, &up);
    if n.facet_l() == Some(facet) {
        turn >= 0
    } else if n.facet_r() == Some(facet) {
        turn <= 0
    } else {
        false
    }
}

/// Whether the surface of `polyhedron` crosses itself anywhere.
pub fn has_self_intersecting_surface(polyhedron: &Polyhedron) -> bool {
    if count_self_intersecting_facets(polyhedron) > 0 {
        return true;
    }
    let edges = polyhedron.edge_keys();
    for facet in polyhedron.facet_keys() {
        if edges.iter().any(|&edge| is_edge_inside_facet(polyhedron, facet, edge, true)) {
            tracing::trace!("Facets intact but an edge pierces the surface");
            return true;
        }
    }
    false
}

// ============================================================================
// Moving a patch
// ============================================================================

/// A copy of `polyhedron` with every facet moved `offset` units inwards,
/// scaled by its speed.
///
/// Vertices with three or more facets go to the corner of their first three
/// moved planes. Degree-1 vertices keep their distance to the neighbour and
/// follow it. `None` if some corner planes no longer meet in a point.
pub fn shifted(polyhedron: &Polyhedron, offset: f64) -> Option<Polyhedron> {
    let mut result = polyhedron.clone();
    let mut moved = Vec::new();
    for (key, vertex) in polyhedron.vertices() {
        if vertex.facets().len() < 3 {
            continue;
        }
        let mut planes = vertex.facets().iter().take(3).filter_map(|&f| {
            polyhedron
                .facet(f)
                .map(|f| ActiveKernel::offset_plane(&f.plane, -offset * f.speed))
        });
        let (Some(p1), Some(p2), Some(p3)) = (planes.next(), planes.next(), planes.next()) else {
            return None;
        };
        let point = ActiveKernel::intersect_planes3(&p1, &p2, &p3)?;
        moved.push((key, vertex.point, point));
    }
    let mut followers = Vec::new();
    for (key, vertex) in polyhedron.vertices() {
        if polyhedron.degree(key) != 1 {
            continue;
        }
        let Some(other) = vertex
            .edges()
            .iter()
            .find_map(|&e| polyhedron.other_vertex(e, key))
        else {
            continue;
        };
        if let Some(&(_, old, new)) = moved.iter().find(|(v, _, _)| *v == other) {
            followers.push((key, vertex.point + (new - old)));
        }
    }
    for (key, _, point) in moved {
        result.vertex_mut(key)?.point = point;
    }
    for (key, point) in followers {
        result.vertex_mut(key)?.point = point;
    }
    for f in polyhedron.facet_keys() {
        let facet = result.facet_mut(f)?;
        facet.plane = ActiveKernel::offset_plane(&facet.plane, -offset * facet.speed);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use straightskel_kernel::Vector3;

    fn cube() -> Polyhedron {
        Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)).unwrap()
    }

    fn top(polyhedron: &Polyhedron) -> FacetKey {
        polyhedron
            .facets()
            .find(|(_, f)| f.plane.normal().z > 0.5)
            .map(|(k, _)| k)
            .unwrap()
    }

    /// A loose edge between two new degree-1 vertices.
    fn stray(polyhedron: &mut Polyhedron, a: Point3, b: Point3) -> EdgeKey {
        let src = polyhedron.add_vertex(a);
        let dst = polyhedron.add_vertex(b);
        polyhedron.add_edge(src, dst).unwrap()
    }

    /// One facet on z = 0 holding two loose edges.
    fn crossing_pair(a: (Point3, Point3), b: (Point3, Point3)) -> (Polyhedron, FacetKey, EdgeKey, EdgeKey) {
        let mut polyhedron = Polyhedron::new();
        let facet = polyhedron.add_facet(Plane3::from_point_normal(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)));
        let e1 = stray(&mut polyhedron, a.0, a.1);
        let e2 = stray(&mut polyhedron, b.0, b.1);
        polyhedron.facet_add_edge(facet, e1).unwrap();
        polyhedron.facet_add_edge(facet, e2).unwrap();
        (polyhedron, facet, e1, e2)
    }

    #[test]
    fn cube_surface_is_clean() {
        let cube = cube();
        assert_eq!(count_self_intersecting_facets(&cube), 0);
        assert!(!has_self_intersecting_surface(&cube));
    }

    #[test]
    fn crossed_edges_meet_in_the_facet() {
        let (polyhedron, facet, e1, e2) = crossing_pair(
            (Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)),
            (Point3::new(0.0, -1.0, 0.0), Point3::new(0.0, 1.0, 0.0)),
        );
        let point = intersect_edges(&polyhedron, facet, e1, e2, false).unwrap();
        assert_eq!(point, Point3::new(0.0, 0.0, 0.0));
        assert!(is_self_intersecting_facet(&polyhedron, facet));
    }

    #[test]
    fn rays_reach_past_their_loose_ends() {
        let (polyhedron, facet, e1, e2) = crossing_pair(
            (Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 2.0, 0.0)),
            (Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)),
        );
        assert!(intersect_edges(&polyhedron, facet, e1, e2, false).is_none());
        assert_eq!(intersect_edges(&polyhedron, facet, e1, e2, true), Some(Point3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn parallel_edges_never_meet() {
        let (polyhedron, facet, e1, e2) = crossing_pair(
            (Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)),
            (Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 1.0, 0.0)),
        );
        assert!(intersect_edges(&polyhedron, facet, e1, e2, true).is_none());
        assert!(!is_self_intersecting_facet(&polyhedron, facet));
    }

    #[test]
    fn edge_through_the_top_pierces_the_cube() {
        let mut cube = cube();
        let facet = top(&cube);
        let edge = stray(&mut cube, Point3::new(1.0, 0.5, 1.5), Point3::new(1.0, 0.5, 2.5));
        assert!(is_edge_inside_facet(&cube, facet, edge, false));
        assert!(has_self_intersecting_surface(&cube));
    }

    #[test]
    fn edge_beside_the_top_misses_it() {
        let mut cube = cube();
        let facet = top(&cube);
        let edge = stray(&mut cube, Point3::new(3.0, 0.5, 1.5), Point3::new(3.0, 0.5, 2.5));
        assert!(!is_edge_inside_facet(&cube, facet, edge, false));
    }

    #[test]
    fn border_edges_are_not_inside_their_facet() {
        let cube = cube();
        let facet = top(&cube);
        for &edge in cube.facet(facet).unwrap().edges() {
            assert!(!is_edge_inside_facet(&cube, facet, edge, true));
        }
    }

    #[test]
    fn shifted_cube_shrinks_by_the_offset() {
        let shrunk = shifted(&cube(), 0.5).unwrap();
        let (min, max) = shrunk.bounding_box().unwrap();
        assert!((min.x - 0.5).abs() < 1e-12 && (min.z - 0.5).abs() < 1e-12);
        assert!((max.y - 1.5).abs() < 1e-12);
        assert!(!has_self_intersecting_surface(&shrunk));
    }

    #[test]
    fn shifted_past_the_centre_turns_inside_out() {
        // every corner reaches the centre at offset 1 and then swaps sides
        let flipped = shifted(&cube(), 1.5).unwrap();
        let (min, max) = flipped.bounding_box().unwrap();
        assert!((min.x - 0.5).abs() < 1e-12);
        assert!((max.x - 1.5).abs() < 1e-12);
    }
}

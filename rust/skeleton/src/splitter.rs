// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting of vertices with more than three facets.
//!
//! The wavefront only knows how to move degree-3 vertices. A vertex with
//! more facets is split into a chain of degree-3 vertices at the same
//! point, joined by zero-length edges. Each step cuts off one facet
//! together with its two neighbours around the vertex; which facet goes
//! first decides how the zero-length edges grow once the facets move.

use std::collections::VecDeque;
use std::f64::consts::PI;

use straightskel_kernel::{ActiveKernel, Kernel};
use straightskel_mesh::{FacetKey, Polyhedron, VertexKey};

use crate::config::VertexSplitterKind;
use crate::error::{Error, Result};

/// Strategy for splitting one vertex down to degree 3.
pub trait VertexSplitter {
    fn name(&self) -> &'static str;

    /// Splits `vertex` until every resulting vertex has degree 3. Returns
    /// the vertices created.
    fn split(&self, polyhedron: &mut Polyhedron, vertex: VertexKey) -> Result<Vec<VertexKey>>;
}

/// Cuts off the facet whose corner with its neighbours moves fastest.
///
/// Suited to convex vertices, where the fastest corner leaves the others
/// behind without crossing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvexVertexSplitter;

/// Cuts off the facet whose corner with its neighbours moves slowest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflexVertexSplitter;

/// Separates the two non-neighbouring facets whose planes come closest to
/// facing each other, then repeats on both halves.
///
/// Ignores facet speeds, so the zero-length edges it creates may grow the
/// wrong way at vertices where the convex and reflex rules would not.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngleVertexSplitter;

impl VertexSplitter for ConvexVertexSplitter {
    fn name(&self) -> &'static str {
        "convex"
    }

    fn split(&self, polyhedron: &mut Polyhedron, vertex: VertexKey) -> Result<Vec<VertexKey>> {
        split_by_speed(polyhedron, vertex, |speed, best| speed > best, 0.0)
    }
}

impl VertexSplitter for ReflexVertexSplitter {
    fn name(&self) -> &'static str {
        "reflex"
    }

    fn split(&self, polyhedron: &mut Polyhedron, vertex: VertexKey) -> Result<Vec<VertexKey>> {
        split_by_speed(polyhedron, vertex, |speed, best| speed < best, f64::MAX)
    }
}

impl VertexSplitter for AngleVertexSplitter {
    fn name(&self) -> &'static str {
        "angle"
    }

    fn split(&self, polyhedron: &mut Polyhedron, vertex: VertexKey) -> Result<Vec<VertexKey>> {
        let mut created = Vec::new();
        let mut queue = VecDeque::from([vertex]);
        while let Some(current) = queue.pop_front() {
            if polyhedron.degree(current) <= 3 {
                continue;
            }
            let (left, right) =
                facing_pair(polyhedron, current).ok_or_else(|| Error::degenerate("vertex split", "facet pair"))?;
            let (split, _) = polyhedron
                .split_vertex(current, left, right)
                .ok_or_else(|| Error::degenerate("vertex split", "facet ring"))?;
            created.push(split);
            queue.extend([current, split]);
        }
        Ok(created)
    }
}

/// The two facets around `vertex` that are not neighbours there and whose
/// normals are furthest apart.
fn facing_pair(polyhedron: &Polyhedron, vertex: VertexKey) -> Option<(FacetKey, FacetKey)> {
    let facets = polyhedron.vertex(vertex)?.facets().to_vec();
    let mut best = None;
    let mut gap_min = 2.0 * PI;
    for &f1 in &facets {
        for &f2 in &facets {
            if f1 == f2
                || polyhedron.facet_prev_around(f1, vertex) == Some(f2)
                || polyhedron.facet_next_around(f1, vertex) == Some(f2)
            {
                continue;
            }
            let (Some(p1), Some(p2)) = (polyhedron.facet(f1), polyhedron.facet(f2)) else {
                continue;
            };
            let gap = PI - ActiveKernel::angle_planes(&p1.plane, &p2.plane);
            if gap < gap_min {
                best = Some((f1, f2));
                gap_min = gap;
            }
        }
    }
    best
}

/// Speed of the corner formed by `facet` and its neighbours around
/// `vertex`: how far the corner travels per unit of offset.
fn corner_speed(polyhedron: &Polyhedron, vertex: VertexKey, facet: FacetKey) -> Option<(f64, FacetKey, FacetKey)> {
    let prev = polyhedron.facet_prev_around(facet, vertex)?;
    let next = polyhedron.facet_next_around(facet, vertex)?;
    let moved = |f: FacetKey| {
        polyhedron
            .facet(f)
            .map(|f| ActiveKernel::offset_plane(&f.plane, -f.speed))
    };
    let corner = ActiveKernel::intersect_planes3(&moved(prev)?, &moved(facet)?, &moved(next)?)?;
    let point = polyhedron.point(vertex)?;
    Some((ActiveKernel::distance_points3(point, corner), prev, next))
}

fn split_by_speed(
    polyhedron: &mut Polyhedron,
    vertex: VertexKey,
    better: impl Fn(f64, f64) -> bool,
    start: f64,
) -> Result<Vec<VertexKey>> {
    let mut created = Vec::new();
    while polyhedron.degree(vertex) > 3 {
        let facets: Vec<FacetKey> = polyhedron
            .vertex(vertex)
            .map(|v| v.facets().to_vec())
            .unwrap_or_default();
        let mut best = start;
        let mut cut = None;
        for facet in facets {
            let Some((speed, prev, next)) = corner_speed(polyhedron, vertex, facet) else {
                continue;
            };
            if better(speed, best) {
                best = speed;
                cut = Some((next, prev));
            }
        }
        let (left, right) = cut.ok_or_else(|| Error::degenerate("vertex split", "corner speed"))?;
        let (split, _) = polyhedron
            .split_vertex(vertex, left, right)
            .ok_or_else(|| Error::degenerate("vertex split", "facet ring"))?;
        created.push(split);
    }
    Ok(created)
}

/// Splits every vertex of degree > 3. Returns `(original, split)` pairs so
/// that callers can carry per-vertex data over to the new vertices.
///
/// With [`VertexSplitterKind::Fast`], convex vertices use
/// [`ConvexVertexSplitter`] and reflex vertices [`ReflexVertexSplitter`];
/// vertices that are neither use the convex splitter. Every other kind
/// applies its splitter to all vertices.
pub fn split_vertices(polyhedron: &mut Polyhedron, kind: VertexSplitterKind) -> Result<Vec<(VertexKey, VertexKey)>> {
    let mut pairs = Vec::new();
    for vertex in polyhedron.vertex_keys() {
        if polyhedron.degree(vertex) <= 3 {
            continue;
        }
        let splitter: &dyn VertexSplitter = match kind {
            VertexSplitterKind::Fast if polyhedron.is_reflex_vertex(vertex) => &ReflexVertexSplitter,
            VertexSplitterKind::Fast => {
                if !polyhedron.is_convex_vertex(vertex) {
                    tracing::warn!(
                        vertex = polyhedron.vertex(vertex).map_or(0, |v| v.id()),
                        degree = polyhedron.degree(vertex),
                        "Mixed vertex, using convex splitter"
                    );
                }
                &ConvexVertexSplitter
            }
            VertexSplitterKind::Convex => &ConvexVertexSplitter,
            VertexSplitterKind::Reflex => &ReflexVertexSplitter,
            VertexSplitterKind::Angle => &AngleVertexSplitter,
        };
        let created = splitter.split(polyhedron, vertex)?;
        tracing::debug!(
            splitter = splitter.name(),
            created = created.len(),
            "Split vertex"
        );
        pairs.extend(created.into_iter().map(|split| (vertex, split)));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use straightskel_kernel::Point3;

    fn pyramid() -> Polyhedron {
        let points = [
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![0, 1, 4],
            vec![1, 2, 4],
            vec![2, 3, 4],
            vec![3, 0, 4],
        ];
        Polyhedron::from_faces(&points, &faces).unwrap()
    }

    #[test]
    fn apex_is_split_to_degree_three() {
        let mut p = pyramid();
        let pairs = split_vertices(&mut p, VertexSplitterKind::Fast).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(p.vertex_count(), 6);
        assert_eq!(p.edge_count(), 9);
        assert!(p.vertex_keys().into_iter().all(|v| p.degree(v) == 3));
        assert!(p.is_consistent());

        let (apex, split) = pairs[0];
        assert_eq!(p.point(apex), p.point(split));
        assert!(p.find_edge_to(apex, split).is_some());
    }

    #[test]
    fn slow_splitter_also_reaches_degree_three() {
        let mut p = pyramid();
        let apex = p
            .vertices()
            .find(|(_, v)| v.point == Point3::new(0.0, 0.0, 1.0))
            .map(|(k, _)| k)
            .unwrap();
        let created = ReflexVertexSplitter.split(&mut p, apex).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(p.degree(apex), 3);
        assert!(p.is_consistent());
    }

    #[test]
    fn angle_splitter_joins_opposite_sides() {
        let mut p = pyramid();
        let pairs = split_vertices(&mut p, VertexSplitterKind::Angle).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(p.vertex_keys().into_iter().all(|v| p.degree(v) == 3));
        assert!(p.is_consistent());

        // the new edge separates two side facets across the apex, whose
        // normals cancel in the base plane
        let (apex, split) = pairs[0];
        let joint = p.find_edge_to(apex, split).unwrap();
        let e = p.edge(joint).unwrap();
        let n_l = p.facet(e.facet_l().unwrap()).unwrap().plane.normal();
        let n_r = p.facet(e.facet_r().unwrap()).unwrap().plane.normal();
        let sum = ActiveKernel::normalize3(n_l) + ActiveKernel::normalize3(n_r);
        assert!(sum.x.abs() < 1e-12 && sum.y.abs() < 1e-12);
    }

    #[test]
    fn every_splitter_kind_reaches_degree_three() {
        for kind in [
            VertexSplitterKind::Fast,
            VertexSplitterKind::Convex,
            VertexSplitterKind::Reflex,
            VertexSplitterKind::Angle,
        ] {
            let mut p = pyramid();
            split_vertices(&mut p, kind).unwrap();
            assert!(p.vertex_keys().into_iter().all(|v| p.degree(v) == 3), "{:?}", kind);
            assert_eq!(p.edge_count(), 9);
        }
    }

    #[test]
    fn degree_three_vertices_are_left_alone() {
        let mut cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(split_vertices(&mut cube, VertexSplitterKind::Fast).unwrap().is_empty());
        assert_eq!(cube.vertex_count(), 8);
    }
}

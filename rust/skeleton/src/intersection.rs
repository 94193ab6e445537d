// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polyhedron-plane sections.
//!
//! A [`Section`] is the closed loop where a plane cuts a polyhedron, stored
//! as a one-facet [`Polyhedron`]. Each section edge remembers the facet it
//! was cut from, so the loop can be turned into a weighted polygon whose
//! 2D skeleton matches the 3D skeleton of the polyhedron restricted to the
//! plane.

use rustc_hash::FxHashMap;
use slotmap::SecondaryMap;
use straightskel_kernel::{ActiveKernel, Kernel, Plane3, Point3};
use straightskel_mesh::{EdgeKey, FacetKey, Polygon, Polyhedron, VertexKey};

/// Facet of the source polyhedron a section edge lies in.
#[derive(Debug, Clone, Copy)]
pub struct Origin {
    pub facet: FacetKey,
    pub plane: Plane3,
}

/// Closed loop cut from a polyhedron by a plane.
#[derive(Debug, Clone)]
pub struct Section {
    polyhedron: Polyhedron,
    facet: FacetKey,
    origins: SecondaryMap<EdgeKey, Origin>,
}

/// A corner of the loop: a source vertex lying on the plane, or the point
/// where a source edge strictly crosses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Crossing {
    Vertex(VertexKey),
    Edge(EdgeKey),
}

/// Loop segment running through the interior of one source facet.
#[derive(Debug, Clone, Copy)]
struct Chord {
    from: Crossing,
    to: Crossing,
    facet: FacetKey,
}

/// Where `edge` crosses `plane`.
///
/// Vertices on the plane count as lying below it, so an edge crosses only
/// when exactly one endpoint is strictly above. A crossing at an endpoint is
/// reported as that vertex, so every edge through it maps to one corner.
fn crossing(polyhedron: &Polyhedron, edge: EdgeKey, plane: &Plane3) -> Option<(Crossing, Point3)> {
    let e = polyhedron.edge(edge)?;
    let (src, dst) = (polyhedron.point(e.src())?, polyhedron.point(e.dst())?);
    let side_src = ActiveKernel::side_plane(plane, src);
    let side_dst = ActiveKernel::side_plane(plane, dst);
    if (side_src > 0) == (side_dst > 0) {
        return None;
    }
    if side_src == 0 {
        return Some((Crossing::Vertex(e.src()), src));
    }
    if side_dst == 0 {
        return Some((Crossing::Vertex(e.dst()), dst));
    }
    let p = ActiveKernel::intersect_plane_line(plane, &polyhedron.edge_line(edge)?)?;
    Some((Crossing::Edge(edge), p))
}

/// Chords of `facet`, each running along `plane × facet`. Crossings are
/// sorted along that direction and paired entry to exit.
fn facet_chords(
    polyhedron: &Polyhedron,
    facet: FacetKey,
    plane: &Plane3,
    points: &mut FxHashMap<Crossing, Point3>,
) -> Option<Vec<Chord>> {
    let f = polyhedron.facet(facet)?;
    let dir = plane.normal().cross(f.plane.normal());

    let mut hits: Vec<(f64, Crossing)> = Vec::new();
    for &edge in f.edges() {
        if let Some((c, p)) = crossing(polyhedron, edge, plane) {
            points.insert(c, p);
            hits.push((dir.dot(p.to_vector()), c));
        }
    }
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    Some(
        hits.chunks_exact(2)
            .filter(|pair| pair[0].1 != pair[1].1)
            .map(|pair| Chord {
                from: pair[0].1,
                to: pair[1].1,
                facet,
            })
            .collect(),
    )
}

impl Section {
    /// Cuts `polyhedron` with `plane`. `None` if the plane misses it or
    /// the loop cannot be closed. When the plane cuts several loops, the
    /// one through the first crossed facet is returned.
    ///
    /// A plane through vertices or along edges is resolved as if shifted
    /// slightly below: a source edge lying in the plane becomes a loop edge
    /// of the facet above it.
    pub fn new(polyhedron: &Polyhedron, plane: &Plane3) -> Option<Self> {
        let mut points = FxHashMap::default();
        let mut chords = Vec::new();
        for facet in polyhedron.facet_keys() {
            chords.extend(facet_chords(polyhedron, facet, plane, &mut points)?);
        }
        let begin = chords.first()?.from;
        let next: FxHashMap<Crossing, usize> = chords.iter().enumerate().map(|(i, c)| (c.from, i)).collect();

        let mut section = Polyhedron::new();
        let loop_facet = section.add_facet(*plane);
        let mut origins = SecondaryMap::new();
        let mut corners: FxHashMap<Crossing, VertexKey> = FxHashMap::default();
        let mut corner = |section: &mut Polyhedron, c: Crossing| -> Option<VertexKey> {
            if let Some(&v) = corners.get(&c) {
                return Some(v);
            }
            let v = section.add_vertex(*points.get(&c)?);
            corners.insert(c, v);
            Some(v)
        };

        let mut current = 0;
        for _ in 0..chords.len() {
            let chord = chords[current];
            let src = corner(&mut section, chord.from)?;
            let dst = corner(&mut section, chord.to)?;
            let edge = section.add_edge(src, dst).ok()?;
            section.facet_add_edge(loop_facet, edge).ok()?;
            origins.insert(
                edge,
                Origin {
                    facet: chord.facet,
                    plane: polyhedron.facet(chord.facet)?.plane,
                },
            );

            if chord.to == begin {
                tracing::debug!(edges = section.edge_count(), "Computed section");
                return Some(Self {
                    polyhedron: section,
                    facet: loop_facet,
                    origins,
                });
            }
            current = *next.get(&chord.to)?;
        }
        tracing::warn!(chords = chords.len(), "Section loop did not close");
        None
    }

    pub fn polyhedron(&self) -> &Polyhedron {
        &self.polyhedron
    }

    /// The loop facet.
    pub fn facet(&self) -> FacetKey {
        self.facet
    }

    pub fn plane(&self) -> Option<Plane3> {
        self.polyhedron.facet(self.facet).map(|f| f.plane)
    }

    /// Facet of the source polyhedron that section edge `edge` was cut from.
    pub fn origin(&self, edge: EdgeKey) -> Option<&Origin> {
        self.origins.get(edge)
    }

    /// Projects the loop into 2D. Each edge's speed is `1 / sin(angle)`
    /// between the cutting plane and its origin facet, so that offsets of
    /// the polygon follow the moving facets within the plane.
    pub fn to_weighted_polygon(&self) -> Option<Polygon> {
        let plane = self.plane()?;
        let (mut polygon, map) = self.polyhedron.facet_to_polygon(self.facet)?;
        for (edge, edge2) in map {
            let origin = self.origins.get(edge)?;
            let angle = ActiveKernel::angle_planes(&plane, &origin.plane);
            if let Some(e2) = polygon.edge_mut(edge2) {
                e2.speed = 1.0 / angle.sin();
            }
        }
        Some(polygon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use straightskel_kernel::Vector3;

    fn horizontal(z: f64) -> Plane3 {
        Plane3::from_point_normal(Point3::new(0.0, 0.0, z), Vector3::new(0.0, 0.0, 1.0))
    }

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
    fn cube_section_is_one_square_loop() {
        let cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        let section = Section::new(&cube, &horizontal(0.5)).unwrap();
        let p = section.polyhedron();
        assert_eq!(p.facet_count(), 1);
        assert_eq!(p.edge_count(), 4);
        assert_eq!(p.vertex_count(), 4);
        assert_eq!(p.facet_boundary(section.facet()).map(|b| b.len()), Some(4));

        let mut origins: Vec<FacetKey> = p.edge_keys().into_iter().map(|e| section.origin(e).unwrap().facet).collect();
        origins.sort();
        origins.dedup();
        assert_eq!(origins.len(), 4);
        for (_, v) in p.vertices() {
            assert_relative_eq!(v.point.z, 0.5);
        }
    }

    #[test]
    fn upright_facets_keep_unit_speed() {
        let cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        let polygon = Section::new(&cube, &horizontal(0.25)).unwrap().to_weighted_polygon().unwrap();
        assert_eq!(polygon.edge_count(), 4);
        assert_relative_eq!(polygon.area(), 1.0, epsilon = 1e-9);
        for (_, e) in polygon.edges() {
            assert_relative_eq!(e.speed, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sloped_facets_speed_up() {
        let polygon = Section::new(&pyramid(), &horizontal(0.5)).unwrap().to_weighted_polygon().unwrap();
        assert_eq!(polygon.edge_count(), 4);
        assert_relative_eq!(polygon.area(), 1.0, epsilon = 1e-9);
        for (_, e) in polygon.edges() {
            assert_relative_eq!(e.speed, std::f64::consts::SQRT_2, epsilon = 1e-9);
        }
    }

    fn tetrahedron() -> Polyhedron {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        Polyhedron::from_faces(&points, &faces).unwrap()
    }

    fn diagonal() -> Plane3 {
        Plane3::from_point_normal(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, -1.0, 0.0))
    }

    fn sorted_speeds(polygon: &Polygon) -> Vec<f64> {
        let mut speeds: Vec<f64> = polygon.edges().map(|(_, e)| e.speed).collect();
        speeds.sort_by(f64::total_cmp);
        speeds
    }

    #[test]
    fn plane_through_an_edge_of_a_tetrahedron() {
        let section = Section::new(&tetrahedron(), &diagonal()).unwrap();
        let p = section.polyhedron();
        assert_eq!(p.edge_count(), 3);
        assert_eq!(p.vertex_count(), 3);

        let mut corners: Vec<(f64, f64, f64)> = p.vertices().map(|(_, v)| (v.point.x, v.point.y, v.point.z)).collect();
        corners.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.total_cmp(&b.0)));
        assert_eq!(corners, vec![(0.0, 0.0, 0.0), (0.5, 0.5, 0.0), (0.0, 0.0, 1.0)]);

        let polygon = section.to_weighted_polygon().unwrap();
        assert_relative_eq!(polygon.area().abs(), 0.5 * 0.5f64.sqrt(), epsilon = 1e-9);
        let speeds = sorted_speeds(&polygon);
        assert_relative_eq!(speeds[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(speeds[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(speeds[2], std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn plane_through_opposite_cube_edges() {
        let cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        let section = Section::new(&cube, &diagonal()).unwrap();
        assert_eq!(section.polyhedron().edge_count(), 4);
        assert_eq!(section.polyhedron().vertex_count(), 4);

        let polygon = section.to_weighted_polygon().unwrap();
        assert_relative_eq!(polygon.area().abs(), std::f64::consts::SQRT_2, epsilon = 1e-9);
        let speeds = sorted_speeds(&polygon);
        assert_relative_eq!(speeds[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(speeds[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(speeds[2], std::f64::consts::SQRT_2, epsilon = 1e-9);
        assert_relative_eq!(speeds[3], std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn plane_touching_a_single_vertex() {
        let touching = Plane3::from_point_normal(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(Section::new(&tetrahedron(), &touching).is_none());
    }

    #[test]
    fn plane_missing_the_polyhedron() {
        let cube = Polyhedron::make_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(Section::new(&cube, &horizontal(5.0)).is_none());
    }
}

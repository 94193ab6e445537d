// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Does a line pass through the interior of a facet?

use straightskel_kernel::{ActiveKernel, Kernel, Line3, Plane3};
use straightskel_mesh::{FacetKey, Polyhedron};

/// Ray-crossing parity test.
///
/// The plane through `line` and the facet normal cuts the facet plane
/// along the projection of `line`. Boundary edges strictly crossing that
/// plane are counted on one side of `line` only; an odd count means the
/// point where `line` meets the facet plane is inside the facet.
///
/// Lines parallel to the facet normal give a degenerate cut plane and
/// report `false`.
pub fn is_line_in_facet(polyhedron: &Polyhedron, facet: FacetKey, line: &Line3) -> bool {
    let Some(f) = polyhedron.facet(facet) else {
        return false;
    };
    let p = line.point;
    let along = p + line.direction;
    let plane_ray = Plane3::from_points(p, along, p + f.plane.normal());
    let plane_orient = Plane3::from_points(p, along, p + plane_ray.normal());

    let mut crossings = 0usize;
    for &edge in f.edges() {
        let Some(e) = polyhedron.edge(edge) else {
            continue;
        };
        let (Some(src), Some(dst)) = (polyhedron.point(e.src()), polyhedron.point(e.dst())) else {
            continue;
        };
        let side_src = ActiveKernel::side_plane(&plane_ray, src);
        let side_dst = ActiveKernel::side_plane(&plane_ray, dst);
        if (side_src > 0) == (side_dst > 0) {
            continue;
        }
        let hit = polyhedron
            .edge_line(edge)
            .and_then(|edge_line| ActiveKernel::intersect_plane_line(&plane_ray, &edge_line));
        if hit.is_some_and(|hit| ActiveKernel::side_plane(&plane_orient, hit) > 0) {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

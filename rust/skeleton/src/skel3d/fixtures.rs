// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small solids whose first wavefront events are known in closed form.
//!
//! Faces are listed counter-clockwise as seen from outside. Every vertex
//! has degree three, so the vertex splitter leaves them untouched.

use straightskel_kernel::Point3;
use straightskel_mesh::Polyhedron;

fn solid(points: &[(f64, f64, f64)], faces: &[&[usize]]) -> Polyhedron {
    let points: Vec<Point3> = points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect();
    let faces: Vec<Vec<usize>> = faces.iter().map(|f| f.to_vec()).collect();
    Polyhedron::from_faces(&points, &faces).unwrap()
}

/// A 3-4-5 right triangle extruded along z by 10.
pub(super) fn right_prism() -> Polyhedron {
    solid(
        &[
            (0.0, 3.0, 0.0),
            (4.0, 0.0, 0.0),
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (4.0, 0.0, 10.0),
            (0.0, 3.0, 10.0),
        ],
        &[
            &[0, 1, 2],
            &[3, 4, 5],
            &[2, 1, 4, 3],
            &[1, 0, 5, 4],
            &[0, 2, 3, 5],
        ],
    )
}

/// A 6x6x4 block with a triangular tooth standing on its top front edge.
pub(super) fn edge_tooth() -> Polyhedron {
    solid(
        &[
            (0.0, 6.0, 0.0),
            (6.0, 6.0, 0.0),
            (6.0, 0.0, 0.0),
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 4.0),
            (2.0, 0.0, 4.0),
            (3.0, 2.0, 4.0),
            (4.0, 0.0, 4.0),
            (6.0, 0.0, 4.0),
            (6.0, 6.0, 4.0),
            (0.0, 6.0, 4.0),
            (4.0, 0.0, 5.0),
            (2.0, 0.0, 5.0),
            (3.0, 2.0, 5.0),
        ],
        &[
            &[0, 1, 2, 3],
            &[4, 5, 6, 7, 8, 9, 10],
            &[3, 2, 8, 7, 11, 12, 5, 4],
            &[10, 9, 1, 0],
            &[4, 10, 0, 3],
            &[2, 1, 9, 8],
            &[12, 13, 6, 5],
            &[13, 11, 7, 6],
            &[12, 11, 13],
        ],
    )
}

/// A 6x6x4 block with a 2x3x1 bump flush with its front face.
pub(super) fn edge_bump() -> Polyhedron {
    solid(
        &[
            (6.0, 0.0, 0.0),
            (6.0, 0.0, 4.0),
            (4.0, 0.0, 4.0),
            (4.0, 0.0, 5.0),
            (2.0, 0.0, 5.0),
            (2.0, 0.0, 4.0),
            (0.0, 0.0, 4.0),
            (0.0, 0.0, 0.0),
            (6.0, 6.0, 0.0),
            (0.0, 6.0, 0.0),
            (2.0, 3.0, 5.0),
            (2.0, 3.0, 4.0),
            (4.0, 3.0, 4.0),
            (4.0, 3.0, 5.0),
            (0.0, 6.0, 4.0),
            (6.0, 6.0, 4.0),
        ],
        &[
            &[0, 1, 2, 3, 4, 5, 6, 7],
            &[8, 0, 7, 9],
            &[4, 10, 11, 5],
            &[2, 12, 13, 3],
            &[10, 13, 12, 11],
            &[4, 3, 13, 10],
            &[9, 14, 15, 8],
            &[14, 6, 5, 11, 12, 2, 1, 15],
            &[7, 6, 14, 9],
            &[8, 15, 1, 0],
        ],
    )
}

/// A 6x6x4 block with a 2x3x1 groove cut into its top front edge.
pub(super) fn edge_groove() -> Polyhedron {
    solid(
        &[
            (0.0, 6.0, 0.0),
            (6.0, 6.0, 0.0),
            (6.0, 0.0, 0.0),
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 4.0),
            (2.0, 0.0, 4.0),
            (2.0, 3.0, 4.0),
            (4.0, 3.0, 4.0),
            (4.0, 0.0, 4.0),
            (6.0, 0.0, 4.0),
            (6.0, 6.0, 4.0),
            (0.0, 6.0, 4.0),
            (4.0, 0.0, 3.0),
            (2.0, 0.0, 3.0),
            (2.0, 3.0, 3.0),
            (4.0, 3.0, 3.0),
        ],
        &[
            &[0, 1, 2, 3],
            &[4, 5, 6, 7, 8, 9, 10, 11],
            &[3, 2, 9, 8, 12, 13, 5, 4],
            &[11, 10, 1, 0],
            &[4, 11, 0, 3],
            &[2, 1, 10, 9],
            &[13, 14, 6, 5],
            &[8, 7, 15, 12],
            &[14, 15, 7, 6],
            &[13, 12, 15, 14],
        ],
    )
}

/// A block with a slot along x across its top and a slot along y across
/// its bottom. The slot floors overlap in plan.
pub(super) fn cross_slotted_block() -> Polyhedron {
    solid(
        &[
            (0.0, 10.0, 4.0),
            (10.0, 10.0, 4.0),
            (10.0, 10.0, 0.0),
            (6.0, 10.0, 0.0),
            (6.0, 10.0, 1.5),
            (3.5, 10.0, 1.5),
            (3.5, 10.0, 0.0),
            (0.0, 10.0, 0.0),
            (6.0, 0.0, 1.5),
            (3.5, 0.0, 1.5),
            (10.0, 0.0, 0.0),
            (10.0, 6.5, 4.0),
            (10.0, 6.5, 2.5),
            (10.0, 4.0, 2.5),
            (10.0, 4.0, 4.0),
            (10.0, 0.0, 4.0),
            (0.0, 0.0, 0.0),
            (3.5, 0.0, 0.0),
            (6.0, 0.0, 0.0),
            (0.0, 0.0, 4.0),
            (0.0, 4.0, 4.0),
            (0.0, 4.0, 2.5),
            (0.0, 6.5, 4.0),
            (0.0, 6.5, 2.5),
        ],
        &[
            &[0, 1, 2, 3, 4, 5, 6, 7],
            &[5, 4, 8, 9],
            &[10, 2, 1, 11, 12, 13, 14, 15],
            &[16, 17, 9, 8, 18, 10, 15, 19],
            &[20, 14, 13, 21],
            &[22, 11, 1, 0],
            &[15, 14, 20, 19],
            &[19, 20, 21, 23, 22, 0, 7, 16],
            &[6, 5, 9, 17],
            &[17, 16, 7, 6],
            &[3, 2, 10, 18],
            &[23, 12, 11, 22],
            &[18, 8, 4, 3],
            &[21, 13, 12, 23],
        ],
    )
}

/// A wedge rising from its sharp edge on the y axis, with a slot cut in
/// from the back face.
pub(super) fn slotted_wedge() -> Polyhedron {
    solid(
        &[
            (0.0, 10.0, 0.0),
            (4.0, 10.0, 0.0),
            (4.0, 5.0, 0.0),
            (6.0, 5.0, 0.0),
            (6.0, 10.0, 0.0),
            (10.0, 10.0, 0.0),
            (10.0, 0.0, 0.0),
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 5.0),
            (10.0, 10.0, 5.0),
            (6.0, 10.0, 3.0),
            (6.0, 5.0, 3.0),
            (4.0, 5.0, 2.0),
            (4.0, 10.0, 2.0),
        ],
        &[
            &[0, 1, 2, 3, 4, 5, 6, 7],
            &[7, 8, 9, 10, 11, 12, 13, 0],
            &[6, 5, 9, 8],
            &[7, 6, 8],
            &[13, 1, 0],
            &[10, 9, 5, 4],
            &[2, 1, 13, 12],
            &[11, 10, 4, 3],
            &[12, 11, 3, 2],
        ],
    )
}

/// Two walls meeting at a right angle with a shelf in the inner corner.
pub(super) fn shelved_corner() -> Polyhedron {
    solid(
        &[
            (0.0, 7.5, 5.5),
            (10.5, 7.5, 5.5),
            (10.5, 7.5, 0.0),
            (0.0, 7.5, 0.0),
            (7.0, 4.5, 1.5),
            (7.0, 4.5, 0.0),
            (7.0, 0.0, 0.0),
            (7.0, 0.0, 5.5),
            (7.0, 4.5, 5.5),
            (7.0, 4.5, 4.5),
            (7.0, 2.5, 4.5),
            (7.0, 2.5, 1.5),
            (10.5, 0.0, 0.0),
            (10.5, 0.0, 5.5),
            (0.0, 4.5, 5.5),
            (0.0, 4.5, 0.0),
            (2.5, 4.5, 1.5),
            (2.5, 4.5, 4.5),
            (2.5, 2.5, 4.5),
            (2.5, 2.5, 1.5),
        ],
        &[
            &[0, 1, 2, 3],
            &[4, 5, 6, 7, 8, 9, 10, 11],
            &[12, 2, 1, 13],
            &[13, 7, 6, 12],
            &[8, 7, 13, 1, 0, 14],
            &[3, 15, 14, 0],
            &[16, 17, 9, 8, 14, 15, 5, 4],
            &[15, 3, 2, 12, 6, 5],
            &[18, 17, 16, 19],
            &[19, 11, 10, 18],
            &[18, 10, 9, 17],
            &[16, 4, 11, 19],
        ],
    )
}

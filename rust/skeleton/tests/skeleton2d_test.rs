// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use straightskel_kernel::{Point2, Point3};
use straightskel_mesh::Polygon;
use straightskel_skeleton::{EventKind, NodeKey, SimpleSkel2d, SkeletonConfig, StraightSkeleton};

fn polygon(points: &[(f64, f64)]) -> Polygon {
    let points: Vec<Point2> = points.iter().map(|&(x, y)| Point2::new(x, y)).collect();
    Polygon::from_points(&points).unwrap()
}

fn node_at(skel: &StraightSkeleton, x: f64, y: f64) -> Option<NodeKey> {
    skel.nodes()
        .find(|(_, n)| (n.point.x - x).abs() < 1e-9 && (n.point.y - y).abs() < 1e-9)
        .map(|(k, _)| k)
}

fn linked(skel: &StraightSkeleton, a: NodeKey, b: NodeKey) -> bool {
    skel.arcs().any(|(_, arc)| {
        let ends = (arc.node_src(), arc.node_dst());
        ends == (a, Some(b)) || ends == (b, Some(a))
    })
}

/// A finished skeleton of a polygon without holes is a tree.
fn assert_closed_tree(skel: &StraightSkeleton) {
    assert!(skel.arcs().all(|(_, a)| !a.is_ray()));
    assert_eq!(skel.arc_count(), skel.node_count() - 1);
    assert!(skel.is_consistent(1e-9));
}

#[test]
fn rectangle_has_a_ridge() {
    let rectangle = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)]);
    let skel = SimpleSkel2d::compute(&rectangle, SkeletonConfig::default()).unwrap();

    assert_eq!(skel.node_count(), 6);
    assert_eq!(skel.arc_count(), 5);
    assert_eq!(skel.count_events(EventKind::Edge), 2);

    let left = node_at(&skel, 1.0, 1.0).unwrap();
    let right = node_at(&skel, 3.0, 1.0).unwrap();
    assert_relative_eq!(skel.node(left).unwrap().offset, 1.0, epsilon = 1e-9);
    let ridge = skel
        .arcs()
        .filter(|(_, a)| {
            let ends = (a.node_src(), a.node_dst());
            ends == (left, Some(right)) || ends == (right, Some(left))
        })
        .count();
    assert_eq!(ridge, 1);
    assert!(skel.arcs().all(|(_, a)| !a.is_ray()));
    assert!(skel.is_consistent(1e-9));
}

#[test]
fn notch_splits_into_two_triangles() {
    let notch = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (2.0, 1.0), (0.0, 3.0)]);
    let skel = SimpleSkel2d::compute(&notch, SkeletonConfig::default()).unwrap();

    let kinds: Vec<EventKind> = skel.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Split, EventKind::Triangle, EventKind::Triangle]);

    // the reflex vertex moves down at √2 while the bottom edge rises at 1
    let split = &skel.events()[0];
    assert_relative_eq!(split.offset, std::f64::consts::SQRT_2 - 1.0, epsilon = 1e-9);
    let node = skel.node(split.node.unwrap()).unwrap();
    assert_relative_eq!(node.point.x, 2.0, epsilon = 1e-9);
    assert_relative_eq!(node.point.y, split.offset, epsilon = 1e-9);

    let t1 = &skel.events()[1];
    let t2 = &skel.events()[2];
    assert_relative_eq!(t1.offset, t2.offset, epsilon = 1e-9);
    assert!(t1.offset > split.offset);
    assert!(skel.arcs().all(|(_, a)| !a.is_ray()));
}

#[test]
fn slow_edge_lowers_the_ridge() {
    let mut square = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
    let bottom = square.edge_keys()[0];
    square.edge_mut(bottom).unwrap().speed = 0.5;

    // bottom and top edges shrink away together at offset 2, when the
    // bottom edge has only travelled 1
    let skel = SimpleSkel2d::compute(&square, SkeletonConfig::default()).unwrap();
    let low = node_at(&skel, 2.0, 1.0).unwrap();
    let high = node_at(&skel, 2.0, 2.0).unwrap();
    assert_relative_eq!(skel.node(low).unwrap().offset, 2.0, epsilon = 1e-9);
    assert_relative_eq!(skel.node(high).unwrap().offset, 2.0, epsilon = 1e-9);
    assert_eq!(skel.node_count(), 6);
    assert_eq!(skel.arc_count(), 5);
    assert!(skel.arcs().all(|(_, a)| !a.is_ray()));
}

#[test]
fn offsets_are_recorded_until_the_polygon_vanishes() {
    let rectangle = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)]);
    let config = SkeletonConfig {
        const_offset: 0.3,
        ..SkeletonConfig::default()
    };
    let skel = SimpleSkel2d::compute(&rectangle, config).unwrap();
    let recorded = skel.offset_polygons();
    assert_eq!(recorded.len(), 3);
    for (i, (offset, _)) in recorded.iter().enumerate() {
        assert_relative_eq!(*offset, 0.3 * (i + 1) as f64, epsilon = 1e-9);
    }
    let (_, second) = &recorded[1];
    assert_relative_eq!(second.area(), 2.8 * 0.8, epsilon = 1e-9);
}

#[test]
fn skeleton_exports_json() {
    let rectangle = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (0.0, 2.0)]);
    let skel = SimpleSkel2d::compute(&rectangle, SkeletonConfig::default()).unwrap();
    let snap = skel.to_snapshot();
    assert_eq!(snap.nodes.len(), 6);
    assert_eq!(snap.arcs.len(), 5);
    assert!(snap.arcs.iter().all(|a| a.dst.is_some()));

    let json = skel.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["events"][0]["kind"], "edge");
    assert_eq!(Point3::new(0.0, 0.0, 0.0), skel.nodes().next().unwrap().1.point);
}

#[test]
fn hexagon_meets_in_one_node() {
    let corners: Vec<(f64, f64)> = (0..6)
        .map(|k| {
            let a = k as f64 * std::f64::consts::FRAC_PI_3;
            (2.0 * a.cos(), 2.0 * a.sin())
        })
        .collect();
    let skel = SimpleSkel2d::compute(&polygon(&corners), SkeletonConfig::default()).unwrap();

    assert_eq!(skel.node_count(), 7);
    assert_eq!(skel.arc_count(), 6);
    let centre = node_at(&skel, 0.0, 0.0).unwrap();
    assert_relative_eq!(skel.node(centre).unwrap().offset, 3f64.sqrt(), epsilon = 1e-9);
    assert!(skel.arcs().all(|(_, a)| a.node_dst() == Some(centre)));
    assert_closed_tree(&skel);
}

#[test]
fn l_shape_joins_both_ridges_at_the_reflex_node() {
    let l = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (2.0, 2.0), (2.0, 4.0), (0.0, 4.0)]);
    let skel = SimpleSkel2d::compute(&l, SkeletonConfig::default()).unwrap();

    assert_eq!(skel.node_count(), 9);
    let corner = node_at(&skel, 1.0, 1.0).unwrap();
    let right = node_at(&skel, 3.0, 1.0).unwrap();
    let top = node_at(&skel, 1.0, 3.0).unwrap();
    assert!(linked(&skel, corner, right));
    assert!(linked(&skel, corner, top));
    let origin = node_at(&skel, 0.0, 0.0).unwrap();
    let reflex = node_at(&skel, 2.0, 2.0).unwrap();
    assert!(linked(&skel, origin, corner));
    assert!(linked(&skel, reflex, corner));
    assert_closed_tree(&skel);
}

#[test]
fn t_shape_branches_below_the_stem() {
    let t = polygon(&[
        (0.0, 0.0),
        (6.0, 0.0),
        (6.0, 2.0),
        (4.0, 2.0),
        (4.0, 4.0),
        (2.0, 4.0),
        (2.0, 2.0),
        (0.0, 2.0),
    ]);
    let skel = SimpleSkel2d::compute(&t, SkeletonConfig::default()).unwrap();

    assert_eq!(skel.node_count(), 12);
    let junction = node_at(&skel, 3.0, 1.0).unwrap();
    assert_eq!(skel.node(junction).unwrap().arcs().len(), 5);
    for (x, y) in [(1.0, 1.0), (5.0, 1.0), (3.0, 3.0)] {
        assert!(linked(&skel, junction, node_at(&skel, x, y).unwrap()));
    }
    assert_closed_tree(&skel);
}

#[test]
fn h_shape_collapses_onto_its_centre_lines() {
    let h = polygon(&[
        (0.0, 0.0),
        (2.0, 0.0),
        (2.0, 2.0),
        (4.0, 2.0),
        (4.0, 0.0),
        (6.0, 0.0),
        (6.0, 6.0),
        (4.0, 6.0),
        (4.0, 4.0),
        (2.0, 4.0),
        (2.0, 6.0),
        (0.0, 6.0),
    ]);
    let skel = SimpleSkel2d::compute(&h, SkeletonConfig::default()).unwrap();

    assert_eq!(skel.node_count(), 18);
    let left = node_at(&skel, 1.0, 3.0).unwrap();
    let right = node_at(&skel, 5.0, 3.0).unwrap();
    assert!(linked(&skel, left, right));
    assert!(linked(&skel, left, node_at(&skel, 1.0, 1.0).unwrap()));
    assert!(linked(&skel, left, node_at(&skel, 1.0, 5.0).unwrap()));
    assert!(linked(&skel, right, node_at(&skel, 5.0, 5.0).unwrap()));
    assert!(skel.nodes().all(|(_, n)| n.offset <= 1.0 + 1e-9));
    assert_closed_tree(&skel);
}

#[test]
fn square_hole_keeps_a_ring_of_ridges() {
    // frame of width 1: the wavefront closes on the centre line of the frame
    let mut frame = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
    let hole: Vec<_> = [(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0)]
        .iter()
        .map(|&(x, y)| frame.add_vertex(Point2::new(x, y)))
        .collect();
    for i in 0..4 {
        frame.add_edge(hole[i], hole[(i + 1) % 4]).unwrap();
    }
    let skel = SimpleSkel2d::compute(&frame, SkeletonConfig::default()).unwrap();

    assert!(skel.arcs().all(|(_, a)| !a.is_ray()));
    assert!(skel.nodes().all(|(_, n)| n.offset <= 0.5 + 1e-9));
    let corner = node_at(&skel, 0.5, 0.5).unwrap();
    assert!(linked(&skel, corner, node_at(&skel, 3.5, 0.5).unwrap()));
    assert!(linked(&skel, corner, node_at(&skel, 0.5, 3.5).unwrap()));
    assert!(skel.is_consistent(1e-9));
}

#![allow(dead_code)]

use std::collections::HashSet;

use gcglib::mesh::{MeshNode, Semiregular48};

/// Every leaf owns exactly one slot whose front record points back, and
/// internal nodes own none.
pub fn assert_leaf_triangle_correspondence(mesh: &Semiregular48) {
    let mut slots = HashSet::new();
    for (index, node) in mesh.nodes().iter().enumerate() {
        match (node.is_leaf(), node.triangle) {
            (true, Some(slot)) => {
                assert!(slots.insert(slot), "slot {slot} owned twice");
                let front = mesh.front(slot).expect("slot in range");
                assert_eq!(front.node, index, "front of slot {slot} points elsewhere");
            }
            (true, None) => panic!("leaf {index} without triangle"),
            (false, Some(slot)) => panic!("internal node {index} still owns slot {slot}"),
            (false, None) => {}
        }
    }
    assert_eq!(slots.len(), mesh.triangle_count());
    assert_eq!(mesh.leaves().count(), mesh.triangle_count());
}

fn links(node: &MeshNode) -> [Option<usize>; 3] {
    [node.left_neighbor, node.right_neighbor, node.base_neighbor]
}

/// Neighbour links between leaves are mutual and never point at split
/// nodes; base partners differ by at most one level.
pub fn assert_symmetric_links(mesh: &Semiregular48) {
    for (index, node) in mesh.leaves() {
        for neighbor in links(node).into_iter().flatten() {
            let other = mesh.node(neighbor).expect("neighbour in range");
            assert!(other.is_leaf(), "leaf {index} links to split node {neighbor}");
            assert!(
                links(other).contains(&Some(index)),
                "link {index} -> {neighbor} is not mutual"
            );
            assert!(node.level.abs_diff(other.level) <= 1);
        }
    }
}

/// Directed edges of a counter-clockwise triangle.
pub fn edges(triangle: [u32; 3]) -> [(u32, u32); 3] {
    let [a, l, r] = triangle;
    [(a, l), (l, r), (r, a)]
}

/// On the unit square every edge not lying on the outer boundary is used
/// in both directions: no cracks, no T-junctions.
pub fn assert_conforming_plane(mesh: &Semiregular48, positions: &[[f64; 2]]) {
    let triangles: Vec<[u32; 3]> = (0..mesh.triangle_count())
        .map(|slot| mesh.triangle(slot).expect("slot in range"))
        .collect();
    let directed: HashSet<(u32, u32)> = triangles.iter().flat_map(|t| edges(*t)).collect();
    assert_eq!(directed.len(), 3 * triangles.len(), "directed edge used twice");

    let on_boundary = |id: u32, axis: usize, value: f64| positions[id as usize][axis] == value;
    for &(u, v) in &directed {
        if directed.contains(&(v, u)) {
            continue;
        }
        let boundary = [(0, 0.0), (0, 1.0), (1, 0.0), (1, 1.0)]
            .iter()
            .any(|&(axis, value)| on_boundary(u, axis, value) && on_boundary(v, axis, value));
        assert!(boundary, "interior edge {u} -> {v} has no partner");
    }
}

/// Positive signed area for every visible triangle.
pub fn assert_counter_clockwise(mesh: &Semiregular48, positions: &[[f64; 2]]) {
    for face in mesh.index_array().chunks_exact(3) {
        let [a, b, c] = [face[0], face[1], face[2]].map(|id| positions[id as usize]);
        let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
        assert!(area > 0.0, "triangle {face:?} is not counter-clockwise");
    }
}

//! Planar reference oracle
//!
//! Places the base square on `[0, 1]²`, puts every new vertex at the midpoint
//! of the bisected edge and lets a predicate on level and corner positions
//! decide what to refine.

use std::io::{self, BufWriter, Write};

use super::{ActionMask, Adaptive, Semiregular48, VertexId};

/// Corner positions of the base square, matching
/// [`BASE_VERTICES`](super::BASE_VERTICES).
const BASE_POSITIONS: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Oracle over the unit square driven by a refinement predicate.
pub struct GridOracle<F> {
    positions: Vec<[f64; 2]>,
    refine: F,
}

impl<F> GridOracle<F>
where
    F: FnMut(u32, [[f64; 2]; 3]) -> bool,
{
    /// `refine(level, corners)` returns whether a triangle should be split.
    pub fn new(refine: F) -> Self {
        Self {
            positions: BASE_POSITIONS.to_vec(),
            refine,
        }
    }

    /// Position of a vertex.
    pub fn position(&self, id: VertexId) -> Option<[f64; 2]> {
        self.positions.get(id as usize).copied()
    }

    /// All vertex positions, indexed by id.
    pub fn positions(&self) -> &[[f64; 2]] {
        &self.positions
    }

    fn corners(&self, triangle: [VertexId; 3]) -> [[f64; 2]; 3] {
        triangle.map(|id| self.position(id).unwrap_or([f64::NAN; 2]))
    }

    /// Write the visible part of `mesh` as a Wavefront OBJ with `z = 0`.
    pub fn write_obj<W: Write>(&self, mesh: &Semiregular48, writer: W) -> io::Result<()> {
        let mut out = BufWriter::new(writer);

        for [x, y] in &self.positions {
            writeln!(out, "v {x:?} {y:?} 0.0")?;
        }

        // OBJ is 1-based
        for face in mesh.index_array().chunks_exact(3) {
            writeln!(out, "f {} {} {}", face[0] + 1, face[1] + 1, face[2] + 1)?;
        }

        out.flush()
    }
}

impl<F> Adaptive for GridOracle<F>
where
    F: FnMut(u32, [[f64; 2]; 3]) -> bool,
{
    fn begin_tessellation(&mut self) {
        self.positions.clear();
        self.positions.extend_from_slice(&BASE_POSITIONS);
    }

    fn sample(&mut self, triangle: [VertexId; 3], _apex_hint: Option<VertexId>) -> VertexId {
        let [_, a, b] = self.corners(triangle);
        let id = self.positions.len() as VertexId;
        self.positions.push([(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5]);
        id
    }

    fn action(&mut self, level: u32, triangle: [VertexId; 3], _last_mask: ActionMask) -> ActionMask {
        let corners = self.corners(triangle);
        if (self.refine)(level, corners) {
            ActionMask::REFINE
        } else {
            ActionMask::empty()
        }
    }
}

impl<F> std::fmt::Debug for GridOracle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridOracle")
            .field("vertices", &self.positions.len())
            .finish()
    }
}

/// Oracle refining around `focus`: a triangle is split while the distance
/// from its centroid to `focus` is below `factor` times its base length.
pub fn focus_oracle(focus: [f64; 2], factor: f64) -> GridOracle<impl FnMut(u32, [[f64; 2]; 3]) -> bool> {
    GridOracle::new(move |_level, [apex, left, right]: [[f64; 2]; 3]| {
        let centroid = [
            (apex[0] + left[0] + right[0]) / 3.0,
            (apex[1] + left[1] + right[1]) / 3.0,
        ];
        let distance = (centroid[0] - focus[0]).hypot(centroid[1] - focus[1]);
        let base = (right[0] - left[0]).hypot(right[1] - left[1]);
        distance < factor * base
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshConfig;

    #[test]
    fn test_midpoint_sampling() {
        let mut oracle = GridOracle::new(|_, _| false);
        let id = oracle.sample([0, 1, 3], Some(2));
        assert_eq!(id, 4);
        assert_eq!(oracle.position(4), Some([0.5, 0.5]));

        oracle.begin_tessellation();
        assert_eq!(oracle.positions().len(), 4);
    }

    #[test]
    fn test_uniform_refinement() {
        let mut mesh = Semiregular48::new(MeshConfig::new().with_max_level(4)).unwrap();
        let mut oracle = GridOracle::new(|_, _| true);
        let stats = mesh.tessellate_breadth_first(usize::MAX, &mut oracle).unwrap();
        // two base triangles, each level doubles them
        assert_eq!(stats.triangles, 32);
        assert_eq!(stats.deepest_level, 4);
        assert_eq!(stats.forced_splits, 0);
        // (2^2 + 1)^2 grid vertices, no duplicates
        assert_eq!(oracle.positions().len(), 25);
    }

    #[test]
    fn test_write_obj() {
        let mut mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        let mut oracle = GridOracle::new(|level, _| level < 1);
        mesh.tessellate_breadth_first(usize::MAX, &mut oracle).unwrap();

        let mut buffer = Vec::new();
        oracle.write_obj(&mesh, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 5);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 4);
        assert!(text.starts_with("v 0.0 0.0 0.0\n"));
    }
}

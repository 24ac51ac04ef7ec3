//! Adaptive 4-8 mesh subdivision
//!
//! A triangulated square refined by longest-edge bisection. Every triangle
//! is a node of a binary forest; splitting a triangle splits its base
//! partner too (a *diamond*), so the mesh never cracks. Where and how deep to
//! refine, and where new vertices go, is decided by an external [`Adaptive`]
//! oracle: the engine itself never looks at coordinates.
//!
//! Nodes, triangles and front records live in arrays owned by
//! [`Semiregular48`] and refer to each other by index only.

mod config;
mod node;
mod oracle;
mod semiregular;

pub use config::{MeshConfig, Topology};
pub use node::{FrontInfo, MeshNode, VertexId};
pub use oracle::{focus_oracle, GridOracle};
pub use semiregular::{Semiregular48, TessellationStats, BASE_VERTICES};

use std::collections::TryReserveError;
use std::fmt;

use bitflags::bitflags;
#[cfg(feature = "visualize")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the subdivision engine.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A node index outside the node array.
    #[error("node {index} out of range ({len} nodes)")]
    InvalidNode {
        /// Requested index
        index: usize,
        /// Current number of nodes
        len: usize,
    },

    /// A leaf without a triangle slot; the arena is corrupt.
    #[error("leaf node {index} owns no triangle")]
    MissingTriangle {
        /// Offending node
        index: usize,
    },

    /// Invalid configuration.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// Growing the arena failed before the split touched anything.
    #[error("allocation failed while growing {what}")]
    Allocation {
        /// Which array was being grown
        what: &'static str,
        /// Underlying reservation failure
        #[source]
        source: TryReserveError,
    },
}

impl MeshError {
    pub(crate) fn allocation(what: &'static str, source: TryReserveError) -> Self {
        tracing::error!(what, error = %source, "mesh arena allocation failure");
        MeshError::Allocation { what, source }
    }
}

bitflags! {
    /// Decision bits returned by [`Adaptive::action`].
    ///
    /// Bits from [`ActionMask::USER_SHIFT`] upwards are free for the oracle to
    /// classify triangles (used by [`Semiregular48::hide_triangles`]).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "visualize", derive(Serialize, Deserialize))]
    pub struct ActionMask: u32 {
        /// Split this triangle.
        const REFINE = 1;
        /// Merge this triangle back (recorded, never acted on).
        const SIMPLIFY = 1 << 1;
        /// Finest level reached; never split further.
        const MAXIMUM_LOD = 1 << 2;

        // Oracle bits are kept by every operation.
        const _ = !0;
    }
}

impl ActionMask {
    /// First bit available to oracles.
    pub const USER_SHIFT: u32 = 8;

    /// Oracle-defined bit `n` (counted from [`ActionMask::USER_SHIFT`]).
    pub const fn user(n: u32) -> Self {
        Self::from_bits_retain(1 << (Self::USER_SHIFT + n))
    }

    /// Whether the engine should split a triangle with this mask.
    pub const fn wants_refinement(self) -> bool {
        self.contains(Self::REFINE) && !self.contains(Self::MAXIMUM_LOD)
    }
}

impl fmt::Display for ActionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.bits())
    }
}

/// Geometry oracle driving a tessellation.
///
/// Triangles are passed as `[apex, left, right]`; the edge `left → right`
/// is the one being bisected.
pub trait Adaptive {
    /// Called once before a tessellation pass.
    fn begin_tessellation(&mut self) {}

    /// Called once after a tessellation pass, also when it failed.
    fn end_tessellation(&mut self) {}

    /// Create the vertex bisecting the base of `triangle` and return its id.
    ///
    /// `apex_hint` is the apex of the base partner when the new vertex is
    /// shared by both triangles of a diamond, `None` when this triangle must
    /// be sampled on its own (boundary or seam).
    fn sample(&mut self, triangle: [VertexId; 3], apex_hint: Option<VertexId>) -> VertexId;

    /// Decide what to do with a front triangle.
    fn action(&mut self, level: u32, triangle: [VertexId; 3], last_mask: ActionMask) -> ActionMask;
}

impl<A: Adaptive + ?Sized> Adaptive for &mut A {
    fn begin_tessellation(&mut self) {
        (**self).begin_tessellation()
    }

    fn end_tessellation(&mut self) {
        (**self).end_tessellation()
    }

    fn sample(&mut self, triangle: [VertexId; 3], apex_hint: Option<VertexId>) -> VertexId {
        (**self).sample(triangle, apex_hint)
    }

    fn action(&mut self, level: u32, triangle: [VertexId; 3], last_mask: ActionMask) -> ActionMask {
        (**self).action(level, triangle, last_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        let mask = ActionMask::REFINE | ActionMask::user(0);
        assert!(mask.contains(ActionMask::REFINE));
        assert!(mask.intersects(ActionMask::user(0)));
        assert!(!mask.intersects(ActionMask::SIMPLIFY));
        assert!(mask.wants_refinement());
        assert!(!(mask | ActionMask::MAXIMUM_LOD).wants_refinement());
        assert_eq!(ActionMask::user(0).bits(), 0x100);
    }

    #[test]
    fn test_user_bits_survive_set_operations() {
        let west = ActionMask::user(0);
        let mask = ActionMask::REFINE | west | ActionMask::user(3);
        assert_eq!(mask.bits(), 0x901);
        assert_eq!(mask & west, west);
        assert_eq!(ActionMask::from_bits_truncate(0x100), west);
        assert_eq!((mask - ActionMask::REFINE).bits(), 0x900);
        assert!(ActionMask::default().is_empty());
        assert_eq!(west.to_string(), "0x100");
    }
}

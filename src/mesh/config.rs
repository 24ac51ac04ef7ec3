//! Mesh engine configuration

#[cfg(feature = "visualize")]
use serde::{Deserialize, Serialize};

use super::MeshError;

/// How the edges of the base square are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "visualize", derive(Serialize, Deserialize))]
pub enum Topology {
    /// Open square, four boundary edges
    #[default]
    Plane,

    /// East and west edges stitched together
    Cylinder,

    /// East/west and north/south edges stitched together
    Torus,
}

impl Topology {
    /// East and west edges are neighbours.
    pub fn wraps_east_west(self) -> bool {
        matches!(self, Topology::Cylinder | Topology::Torus)
    }

    /// North and south edges are neighbours.
    pub fn wraps_north_south(self) -> bool {
        matches!(self, Topology::Torus)
    }
}

/// Parameters of a [`Semiregular48`](super::Semiregular48).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "visualize", derive(Serialize, Deserialize))]
pub struct MeshConfig {
    /// Edge identification of the base mesh
    pub topology: Topology,

    /// Deepest level a tessellation pass refines to
    pub max_level: u32,

    /// Slots reserved up front in each arena array
    pub initial_block: usize,
}

impl MeshConfig {
    /// Default block reserved when the arena is reset.
    pub const DEFAULT_BLOCK: usize = 256;

    /// Default depth limit.
    pub const DEFAULT_MAX_LEVEL: u32 = 24;

    /// Planar mesh, default limits.
    pub fn new() -> Self {
        Self {
            topology: Topology::Plane,
            max_level: Self::DEFAULT_MAX_LEVEL,
            initial_block: Self::DEFAULT_BLOCK,
        }
    }

    /// Set the topology.
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the depth limit.
    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    /// Set the arena block size.
    pub fn with_initial_block(mut self, initial_block: usize) -> Self {
        self.initial_block = initial_block;
        self
    }

    /// Check the limits.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.initial_block < 2 {
            return Err(MeshError::BadParameters(format!(
                "initial block {} cannot hold the base mesh",
                self.initial_block
            )));
        }
        // Vertex ids are u32 and every level roughly doubles the triangle count.
        if self.max_level > 48 {
            return Err(MeshError::BadParameters(format!(
                "max level {} exceeds 48",
                self.max_level
            )));
        }
        Ok(())
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_validation() {
        let config = MeshConfig::new()
            .with_topology(Topology::Torus)
            .with_max_level(10)
            .with_initial_block(64);
        assert!(config.validate().is_ok());
        assert!(config.topology.wraps_north_south());

        assert!(MeshConfig::new().with_initial_block(1).validate().is_err());
        assert!(MeshConfig::new().with_max_level(60).validate().is_err());
    }

    #[test]
    fn test_wrap_flags() {
        assert!(!Topology::Plane.wraps_east_west());
        assert!(Topology::Cylinder.wraps_east_west());
        assert!(!Topology::Cylinder.wraps_north_south());
    }
}

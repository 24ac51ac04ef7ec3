//! Space accounting
//!
//! Structures report the growth of their backing arrays to an optional,
//! injected [`AllocationHook`]. Nothing here is global state.

mod allocator;

pub use allocator::SpaceTracker;

/// Receives allocation telemetry from trees and meshes.
pub trait AllocationHook: Send + Sync {
    /// `bytes` more are now reserved.
    fn allocated(&self, bytes: usize);

    /// `bytes` were given back.
    fn released(&self, bytes: usize);
}

/// Snapshot of a [`SpaceTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceProfile {
    /// Bytes reserved right now
    pub current_bytes: usize,

    /// Maximum bytes reserved at once
    pub peak_bytes: usize,

    /// Growth events observed
    pub allocations: usize,
    /// Release events observed
    pub releases: usize,
}

impl SpaceProfile {
    /// Everything that was reserved has been released
    pub fn is_balanced(&self) -> bool {
        self.current_bytes == 0
    }

    /// Generate report
    pub fn report(&self) -> String {
        format!(
            "Current: {} bytes\nPeak: {} bytes\nEvents:\n  Allocations: {}\n  Releases: {}",
            self.current_bytes, self.peak_bytes, self.allocations, self.releases
        )
    }
}

/// Report the capacity change of a `Vec` to an optional hook.
pub(crate) fn report_growth(
    hook: Option<&dyn AllocationHook>,
    element_size: usize,
    before: usize,
    after: usize,
) {
    if let Some(hook) = hook {
        if after > before {
            hook.allocated((after - before) * element_size);
        } else if before > after {
            hook.released((before - after) * element_size);
        }
    }
}

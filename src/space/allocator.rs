//! Allocation tracking for leak detection

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AllocationHook, SpaceProfile};

/// Tracks bytes reserved by the structures it is installed in
///
/// Thread-safe: one tracker can observe several trees and meshes at once.
#[derive(Debug, Default)]
pub struct SpaceTracker {
    /// Bytes currently reserved
    current: AtomicUsize,

    /// Maximum seen
    peak: AtomicUsize,

    /// Number of growth events
    allocations: AtomicUsize,

    /// Number of release events
    releases: AtomicUsize,
}

impl SpaceTracker {
    /// Create new tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently reserved
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Maximum bytes ever reserved at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters
    pub fn profile(&self) -> SpaceProfile {
        SpaceProfile {
            current_bytes: self.current(),
            peak_bytes: self.peak(),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

impl AllocationHook for SpaceTracker {
    fn allocated(&self, bytes: usize) {
        let now = self.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.fetch_max(now, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn released(&self, bytes: usize) {
        let previous = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(bytes))
            })
            .unwrap_or(0);
        if bytes > previous {
            // More released than was ever reported: clamp instead of wrapping.
            tracing::error!(
                released = bytes,
                tracked = previous,
                "space tracker released more bytes than it tracked"
            );
        }
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_survives_release() {
        let tracker = SpaceTracker::new();
        tracker.allocated(100);
        tracker.allocated(50);
        tracker.released(120);

        assert_eq!(tracker.current(), 30);
        assert_eq!(tracker.peak(), 150);

        let profile = tracker.profile();
        assert_eq!(profile.allocations, 2);
        assert_eq!(profile.releases, 1);
    }

    #[test]
    fn test_over_release_clamps_to_zero() {
        let tracker = SpaceTracker::new();
        tracker.allocated(10);
        tracker.released(25);
        assert_eq!(tracker.current(), 0);
    }
}

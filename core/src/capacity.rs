/*!
# Capacity Module

This module tracks how many tasks are executing against a fixed ceiling.

The tracker is plain data. The dispatcher keeps it under the same mutex as
the queue, so "check for a free slot" and "take the slot" happen as one
step and the count can never exceed the ceiling.
*/

/// Count of executing tasks compared against a fixed maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityTracker {
    max: usize,
    active: usize,
}

impl CapacityTracker {
    /// Create a tracker with `max` slots, all free
    pub fn new(max: usize) -> Self {
        Self { max, active: 0 }
    }

    /// Ceiling on concurrently executing tasks
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of tasks currently executing
    pub fn active(&self) -> usize {
        self.active
    }

    /// Check if another task may start
    pub fn has_capacity(&self) -> bool {
        self.active < self.max
    }

    /// Check if any task is executing
    pub fn is_busy(&self) -> bool {
        self.active > 0
    }

    /// Take a slot. Callers check [`has_capacity`](Self::has_capacity) first.
    pub fn acquire(&mut self) {
        debug_assert!(self.has_capacity(), "acquired a slot past the ceiling");
        self.active = (self.active + 1).min(self.max);
    }

    /// Give a slot back
    pub fn release(&mut self) {
        debug_assert!(self.active > 0, "released a slot that was never acquired");
        self.active = self.active.saturating_sub(1);
    }
}

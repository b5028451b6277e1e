/*!
# Stats Module

Point-in-time counters for a dispatcher, plus the `metrics` names they
are published under. Metric calls are no-ops unless the host program
installs a recorder.
*/

use serde::Serialize;

/// Gauge: tasks currently executing
pub const ACTIVE_TASKS: &str = "flowgate_active_tasks";
/// Gauge: tasks waiting in the queue
pub const PENDING_TASKS: &str = "flowgate_pending_tasks";
/// Counter: tasks started
pub const TASKS_DISPATCHED: &str = "flowgate_tasks_dispatched_total";
/// Counter: tasks finished, including the ones that panicked
pub const TASKS_COMPLETED: &str = "flowgate_tasks_completed_total";
/// Counter: tasks that panicked
pub const TASK_PANICS: &str = "flowgate_task_panics_total";

/// Snapshot of a dispatcher's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub max_concurrency: usize,
    pub active: usize,
    pub pending: usize,
    pub dispatched: u64,
    pub completed: u64,
    pub panicked: u64,
    /// Dispatch passes that found queued work
    pub dispatch_passes: u64,
}

impl DispatcherStats {
    /// Check if nothing is executing and nothing is waiting
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.pending == 0
    }
}

pub(crate) fn publish_gauges(active: usize, pending: usize) {
    metrics::gauge!(ACTIVE_TASKS, active as f64);
    metrics::gauge!(PENDING_TASKS, pending as f64);
}

//! Point-in-time view of the capacity ledger and the queues around it

use serde::{Deserialize, Serialize};

/// Snapshot of a pool, read under the pool lock
///
/// `open` is the ledger count: idle connections, connections handed out,
/// and slots reserved by borrows that are still creating. It never exceeds
/// `max_active`. The snapshot can be stale as soon as it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    open: usize,
    idle: usize,
    waiting: usize,
    max_active: usize,
}

impl PoolStats {
    pub fn new(open: usize, idle: usize, waiting: usize, max_active: usize) -> Self {
        Self {
            open,
            idle,
            waiting,
            max_active,
        }
    }

    /// Connections counted against the ceiling
    pub fn total(&self) -> usize {
        self.open
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Connections checked out or being created
    pub fn active(&self) -> usize {
        self.open.saturating_sub(self.idle)
    }

    /// Borrows parked in the waiter queue
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Slots a borrow can still reserve to create a connection
    pub fn headroom(&self) -> usize {
        self.max_active.saturating_sub(self.open)
    }

    /// Whether a borrow arriving now would park, given nothing is idle
    pub fn is_saturated(&self) -> bool {
        self.idle == 0 && self.open >= self.max_active
    }

    /// Share of the ceiling in use
    pub fn utilization(&self) -> f64 {
        if self.max_active == 0 {
            return 0.0;
        }
        self.open as f64 / self.max_active as f64
    }
}

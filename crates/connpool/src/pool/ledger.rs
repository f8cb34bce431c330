//! Capacity ledger

/// Counts open connections (idle + checked out) against the ceiling
///
/// The count moves up only when a creation slot is reserved and down only
/// when a connection is closed or a reservation is abandoned.
#[derive(Debug)]
pub(crate) struct CapacityLedger {
    open: usize,
    ceiling: usize,
}

impl CapacityLedger {
    pub(crate) fn new(open: usize, ceiling: usize) -> Self {
        debug_assert!(open <= ceiling);
        Self { open, ceiling }
    }

    /// Claim a slot for a new connection, false when at the ceiling
    pub(crate) fn try_reserve(&mut self) -> bool {
        if self.open >= self.ceiling {
            return false;
        }
        self.open += 1;
        true
    }

    /// Give back the slot of a closed connection
    pub(crate) fn release(&mut self) {
        self.release_many(1);
    }

    pub(crate) fn release_many(&mut self, count: usize) {
        self.open = self.open.saturating_sub(count);
    }

    pub(crate) fn open(&self) -> usize {
        self.open
    }
}

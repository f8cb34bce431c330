//! Idle store

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// A parked connection tagged with the moment it came back to the pool
pub(crate) struct IdleConnection<C> {
    pub(crate) conn: C,
    pub(crate) returned_at: Instant,
}

impl<C> IdleConnection<C> {
    pub(crate) fn new(conn: C) -> Self {
        Self {
            conn,
            returned_at: Instant::now(),
        }
    }

    /// Whether the connection sat idle for `timeout` or longer
    pub(crate) fn is_expired(&self, timeout: Option<Duration>, now: Instant) -> bool {
        match timeout {
            Some(timeout) => now >= self.returned_at + timeout,
            None => false,
        }
    }
}

/// Bounded FIFO of idle connections
///
/// Staleness is not checked here; the pool evicts lazily when it pops.
pub(crate) struct IdleStore<C> {
    entries: VecDeque<IdleConnection<C>>,
    capacity: usize,
}

impl<C> IdleStore<C> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Park a connection, handing it back when the store is full
    pub(crate) fn try_push(
        &mut self,
        entry: IdleConnection<C>,
    ) -> std::result::Result<(), IdleConnection<C>> {
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Take the oldest idle connection
    pub(crate) fn try_pop(&mut self) -> Option<IdleConnection<C>> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every entry, leaving the store empty
    pub(crate) fn drain(&mut self) -> Vec<IdleConnection<C>> {
        self.entries.drain(..).collect()
    }
}

//! Waiter queue

use std::collections::VecDeque;

use tokio::sync::oneshot;

use super::idle::IdleConnection;

/// What a parked borrow is woken with
pub(crate) enum Handoff<C> {
    /// A returned connection, passed over without touching the idle store
    Connection(IdleConnection<C>),
    /// A freed ledger slot; the waiter creates its own connection
    Slot,
}

/// FIFO of parked borrows, one private rendezvous per waiter
///
/// Teardown drops every sender, which the receiving side observes as a
/// closure signal.
pub(crate) struct WaiterQueue<C> {
    waiters: VecDeque<oneshot::Sender<Handoff<C>>>,
}

impl<C> WaiterQueue<C> {
    pub(crate) fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// Park a new borrow at the back of the queue
    ///
    /// Waiters whose borrow was cancelled are dropped first, so retries that
    /// keep timing out do not grow the queue.
    pub(crate) fn enqueue(&mut self) -> oneshot::Receiver<Handoff<C>> {
        self.waiters.retain(|waiter| !waiter.is_closed());
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Hand `entry` to the oldest live waiter
    ///
    /// Waiters whose borrow was cancelled are skipped. The entry comes back
    /// when nobody is left to take it.
    pub(crate) fn fulfill(
        &mut self,
        mut entry: IdleConnection<C>,
    ) -> std::result::Result<(), IdleConnection<C>> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(Handoff::Connection(entry)) {
                Ok(()) => return Ok(()),
                Err(Handoff::Connection(returned)) => {
                    tracing::trace!("waiter gone, skipping");
                    entry = returned;
                }
                Err(Handoff::Slot) => unreachable!("sent a connection"),
            }
        }
        Err(entry)
    }

    /// Pass a freed slot to the oldest live waiter, false if there is none
    pub(crate) fn grant_slot(&mut self) -> bool {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.send(Handoff::Slot).is_ok() {
                return true;
            }
            tracing::trace!("waiter gone, skipping");
        }
        false
    }

    /// Number of waiters whose borrow is still pending
    pub(crate) fn len(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }

    pub(crate) fn drain(&mut self) -> Vec<oneshot::Sender<Handoff<C>>> {
        self.waiters.drain(..).collect()
    }
}

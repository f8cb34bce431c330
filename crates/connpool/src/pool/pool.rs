//! Connection pool implementation

use std::sync::Arc;
use std::time::Duration;

use connpool_core::{ConnectionFactory, PoolError, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::config::PoolConfig;
use super::guard::PooledConnection;
use super::idle::{IdleConnection, IdleStore};
use super::ledger::CapacityLedger;
use super::stats::PoolStats;
use super::waiters::{Handoff, WaiterQueue};
use crate::health::ping_connection;

/// Shared state, only ever touched under the pool lock
pub(super) struct PoolState<C> {
    closed: bool,
    ledger: CapacityLedger,
    idle: IdleStore<C>,
    waiters: WaiterQueue<C>,
}

impl<C> PoolState<C> {
    /// Free the slot of a closed connection
    ///
    /// A parked borrower inherits the slot if there is one, so the ledger
    /// stays at the ceiling and the borrower creates its own connection.
    fn release_slot(&mut self) {
        if self.waiters.grant_slot() {
            tracing::debug!("freed slot handed to waiter");
            return;
        }
        self.ledger.release();
    }
}

/// What the lock-protected part of a borrow decided
enum Checkout<C> {
    Idle(IdleConnection<C>),
    Create,
    Wait(oneshot::Receiver<Handoff<C>>),
}

/// What the lock-protected part of a return decided
pub(super) enum Checkin<C> {
    Idle,
    HandedOff,
    /// The connection must be closed; its slot is already released
    Close(C),
    /// The ledger has no outstanding connection this one could belong to
    Foreign(C),
}

/// A bounded pool of reusable connections
///
/// Connections are created on demand up to `max_active`, parked in a FIFO
/// idle store of `max_idle` slots when returned, and handed straight to the
/// oldest parked borrower when the pool is saturated.
pub struct Pool<F: ConnectionFactory> {
    config: PoolConfig,
    factory: Arc<F>,
    state: Mutex<PoolState<F::Connection>>,
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create a new pool and pre-warm `initial_size` connections
    ///
    /// If the factory fails while pre-warming, every connection created so
    /// far is closed and `FactoryInitFailed` is returned.
    #[tracing::instrument(skip(factory))]
    pub async fn new(config: PoolConfig, factory: F) -> Result<Self> {
        config.validate()?;

        let mut idle = IdleStore::new(config.max_idle());
        for _ in 0..config.initial_size() {
            match factory.create().await {
                Ok(conn) => {
                    let pushed = idle.try_push(IdleConnection::new(conn)).is_ok();
                    debug_assert!(pushed, "validated initial_size fits in the idle store");
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to pre-warm pool");
                    for entry in idle.drain() {
                        if let Err(close_err) = factory.close(entry.conn).await {
                            tracing::warn!(error = %close_err, "failed to close pre-warmed connection");
                        }
                    }
                    return Err(PoolError::FactoryInitFailed(e));
                }
            }
        }

        tracing::info!(
            initial_size = config.initial_size(),
            max_idle = config.max_idle(),
            max_active = config.max_active(),
            "connection pool created"
        );

        let state = PoolState {
            closed: false,
            ledger: CapacityLedger::new(config.initial_size(), config.max_active()),
            idle,
            waiters: WaiterQueue::new(),
        };

        Ok(Self {
            config,
            factory: Arc::new(factory),
            state: Mutex::new(state),
        })
    }

    /// Borrow a connection from the pool
    ///
    /// This will:
    /// 1. Take the oldest idle connection, evicting it and moving on if it
    ///    timed out or fails its ping
    /// 2. If none is idle and the pool is below `max_active`, create one
    /// 3. Otherwise wait until a connection or a slot is handed over
    ///
    /// The wait has no deadline of its own; see [`Pool::get_timeout`].
    pub async fn get(&self) -> Result<F::Connection> {
        loop {
            let checkout = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::PoolClosed);
                }
                if let Some(entry) = state.idle.try_pop() {
                    Checkout::Idle(entry)
                } else if state.ledger.try_reserve() {
                    Checkout::Create
                } else {
                    tracing::debug!(open = state.ledger.open(), "pool saturated, waiting");
                    Checkout::Wait(state.waiters.enqueue())
                }
            };

            match checkout {
                Checkout::Idle(entry) => {
                    if let Some(conn) = self.checked(entry).await {
                        return Ok(conn);
                    }
                }
                Checkout::Create => return self.create_in_slot(SlotGuard::new(self)).await,
                Checkout::Wait(rx) => {
                    let mut waiter = Waiter { pool: self, rx: Some(rx) };
                    match waiter.recv().await {
                        Some(Handoff::Connection(entry)) => {
                            if let Some(conn) = self.checked(entry).await {
                                return Ok(conn);
                            }
                        }
                        Some(Handoff::Slot) => {
                            return self.create_in_slot(SlotGuard::new(self)).await;
                        }
                        None => return Err(PoolError::MaxActiveReached),
                    }
                }
            }
        }
    }

    /// Borrow a connection, giving up after `timeout`
    ///
    /// A borrow that times out while parked leaves the waiter queue; the
    /// next return skips it.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<F::Connection> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
    }

    /// Borrow a connection wrapped in a guard that returns it on drop
    pub async fn get_owned(self: &Arc<Self>) -> Result<PooledConnection<F>> {
        let conn = self.get().await?;
        Ok(PooledConnection::new(conn, Arc::clone(self)))
    }

    /// Return a connection to the pool
    ///
    /// The oldest waiter gets it directly; otherwise it is parked in the idle
    /// store, or closed when the store is full. After [`Pool::release`] the
    /// connection is closed.
    pub async fn put(&self, conn: F::Connection) -> Result<()> {
        match self.checkin(conn) {
            Checkin::Idle | Checkin::HandedOff => Ok(()),
            Checkin::Close(conn) => self.close_raw(conn).await,
            Checkin::Foreign(conn) => {
                self.close_raw(conn).await?;
                Err(PoolError::InvalidArgument(
                    "returned connection does not belong to this pool".into(),
                ))
            }
        }
    }

    /// Close a borrowed connection instead of returning it
    ///
    /// The ledger is decremented whatever the close callback reports.
    pub async fn close(&self, conn: F::Connection) -> Result<()> {
        let foreign = {
            let mut state = self.state.lock();
            if state.closed {
                state.ledger.release();
                false
            } else if state.ledger.open() <= state.idle.len() {
                true
            } else {
                state.release_slot();
                false
            }
        };

        self.close_raw(conn).await?;
        if foreign {
            return Err(PoolError::InvalidArgument(
                "closed connection does not belong to this pool".into(),
            ));
        }
        Ok(())
    }

    /// Tear the pool down
    ///
    /// Marks the pool closed, closes every idle connection and wakes every
    /// waiter with a closure signal. Close failures are logged, not returned.
    /// Calling it again is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self) {
        let (idle, waiters) = {
            let mut state = self.state.lock();
            if state.closed {
                tracing::debug!("pool already released");
                return;
            }
            state.closed = true;
            let idle = state.idle.drain();
            state.ledger.release_many(idle.len());
            (idle, state.waiters.drain())
        };

        tracing::info!(idle = idle.len(), waiters = waiters.len(), "releasing pool");
        drop(waiters);

        for entry in idle {
            if let Err(e) = self.factory.close(entry.conn).await {
                tracing::warn!(error = %e, "failed to close idle connection during release");
            }
        }
    }

    /// Number of idle connections
    ///
    /// Observational only; it says nothing about connections checked out.
    pub fn len(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats::new(
            state.ledger.open(),
            state.idle.len(),
            state.waiters.len(),
            self.config.max_active(),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Lock-protected part of a return
    pub(super) fn checkin(&self, conn: F::Connection) -> Checkin<F::Connection> {
        let mut state = self.state.lock();

        if state.closed {
            state.ledger.release();
            return Checkin::Close(conn);
        }
        if state.ledger.open() <= state.idle.len() {
            return Checkin::Foreign(conn);
        }

        let entry = match state.waiters.fulfill(IdleConnection::new(conn)) {
            Ok(()) => {
                tracing::debug!("connection handed to waiter");
                return Checkin::HandedOff;
            }
            Err(entry) => entry,
        };

        match state.idle.try_push(entry) {
            Ok(()) => Checkin::Idle,
            Err(entry) => {
                // No waiter is parked here, so the slot simply goes away.
                state.ledger.release();
                tracing::debug!(open = state.ledger.open(), "idle store full, closing connection");
                Checkin::Close(entry.conn)
            }
        }
    }

    /// Drop a connection from the ledger without closing it
    pub(super) fn forget(&self) {
        let mut state = self.state.lock();
        if state.closed {
            state.ledger.release();
        } else {
            state.release_slot();
        }
    }

    /// Apply the idle-timeout and health checks to a connection about to be
    /// handed out, evicting it on failure
    async fn checked(&self, entry: IdleConnection<F::Connection>) -> Option<F::Connection> {
        if entry.is_expired(self.config.idle_timeout(), Instant::now()) {
            tracing::debug!("idle connection timed out, evicting");
            self.evict(entry.conn).await;
            return None;
        }
        if !self.factory.has_ping() {
            return Some(entry.conn);
        }

        let mut held = HeldConnection {
            pool: self,
            conn: Some(entry.conn),
        };
        let conn = held.conn.as_mut()?;
        let outcome = ping_connection(self.factory.as_ref(), conn, self.config.ping_timeout()).await;
        let conn = held.conn.take()?;

        match outcome {
            Ok(_) => Some(conn),
            Err(e) => {
                tracing::debug!(error = %e, "idle connection failed ping, evicting");
                self.evict(conn).await;
                None
            }
        }
    }

    async fn evict(&self, conn: F::Connection) {
        self.forget();
        if let Err(e) = self.factory.close(conn).await {
            tracing::warn!(error = %e, "failed to close evicted connection");
        }
    }

    /// Create a connection in a slot already reserved in the ledger
    async fn create_in_slot(&self, slot: SlotGuard<'_, F>) -> Result<F::Connection> {
        match self.factory.create().await {
            Ok(conn) => {
                let released = self.state.lock().closed;
                if released {
                    drop(slot);
                    tracing::debug!("pool released while creating, closing new connection");
                    if let Err(e) = self.factory.close(conn).await {
                        tracing::warn!(
                            error = %e,
                            "failed to close connection created after release"
                        );
                    }
                    return Err(PoolError::PoolClosed);
                }
                slot.keep();
                tracing::debug!("connection created");
                Ok(conn)
            }
            Err(e) => {
                tracing::debug!(error = %e, "failed to create connection");
                drop(slot);
                Err(PoolError::CreateFailed(e))
            }
        }
    }

    async fn close_raw(&self, conn: F::Connection) -> Result<()> {
        self.factory.close(conn).await.map_err(PoolError::CloseFailed)
    }

    /// Close a connection from a synchronous context
    ///
    /// The close runs on the current tokio runtime; outside a runtime the
    /// handle is dropped.
    pub(super) fn close_in_background(&self, conn: F::Connection) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let factory = Arc::clone(&self.factory);
                handle.spawn(async move {
                    if let Err(e) = factory.close(conn).await {
                        tracing::warn!(error = %e, "failed to close connection in background");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("no runtime to close connection on, dropping it");
                drop(conn);
            }
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Holds a counted ledger slot across an await
///
/// Dropping it without [`SlotGuard::keep`] releases the slot, so a borrow
/// cancelled while creating does not leak capacity.
struct SlotGuard<'a, F: ConnectionFactory> {
    pool: &'a Pool<F>,
    armed: bool,
}

impl<'a, F: ConnectionFactory> SlotGuard<'a, F> {
    fn new(pool: &'a Pool<F>) -> Self {
        Self { pool, armed: true }
    }

    /// The slot now belongs to a connection handed to the caller
    fn keep(mut self) {
        self.armed = false;
    }
}

impl<F: ConnectionFactory> Drop for SlotGuard<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.forget();
        }
    }
}

/// A counted connection under a health check
///
/// If the borrow is dropped mid-check, the connection is closed on the
/// runtime and its slot is freed.
struct HeldConnection<'a, F: ConnectionFactory> {
    pool: &'a Pool<F>,
    conn: Option<F::Connection>,
}

impl<F: ConnectionFactory> Drop for HeldConnection<'_, F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("borrow cancelled during ping, closing connection");
            self.pool.forget();
            self.pool.close_in_background(conn);
        }
    }
}

/// A parked borrow
///
/// If the borrow is cancelled after something was handed over but before it
/// was received, the handoff goes back to the pool on drop.
struct Waiter<'a, F: ConnectionFactory> {
    pool: &'a Pool<F>,
    rx: Option<oneshot::Receiver<Handoff<F::Connection>>>,
}

impl<F: ConnectionFactory> Waiter<'_, F> {
    /// Wait for the handoff, `None` when the pool was released
    async fn recv(&mut self) -> Option<Handoff<F::Connection>> {
        let rx = self.rx.as_mut()?;
        let handoff = rx.await.ok();
        self.rx = None;
        handoff
    }
}

impl<F: ConnectionFactory> Drop for Waiter<'_, F> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        rx.close();
        match rx.try_recv() {
            Ok(Handoff::Connection(entry)) => {
                if let Checkin::Close(conn) | Checkin::Foreign(conn) = self.pool.checkin(entry.conn)
                {
                    self.pool.close_in_background(conn);
                }
            }
            Ok(Handoff::Slot) => self.pool.forget(),
            Err(_) => {}
        }
    }
}

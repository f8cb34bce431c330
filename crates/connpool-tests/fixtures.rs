//! Test fixtures: an in-memory channel and the factory that dials it.
//!
//! `MockChannelFactory` records every channel it opens and closes so tests
//! can assert on leaks and double closes without a real network peer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use connpool_tests::fixtures::{channel_factory, pool_with};
//! use rstest::rstest;
//!
//! #[rstest]
//! #[tokio::test]
//! async fn test_borrow(channel_factory: Arc<MockChannelFactory>) {
//!     let pool = pool_with(PoolConfig::new(1, 2, 2), channel_factory.clone()).await;
//!     let channel = pool.get().await.unwrap();
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use connpool::{ConnectionFactory, FnFactory, Pool, PoolConfig};
use futures::FutureExt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rstest::fixture;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Install the test log subscriber once per process
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// A fake RPC channel
#[derive(Debug)]
pub struct MockChannel {
    /// Sequence number assigned at dial time
    pub id: usize,
}

/// Factory that dials `MockChannel`s and keeps a ledger of what it did
#[derive(Default)]
pub struct MockChannelFactory {
    created: AtomicUsize,
    closed: Mutex<Vec<usize>>,
    dial_delay: Option<Duration>,
    ping_delay: Option<Duration>,
    refuse: AtomicBool,
    ping_enabled: bool,
    unhealthy: AtomicBool,
}

impl MockChannelFactory {
    /// A factory that dials instantly and has no ping
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` on every dial
    pub fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = Some(delay);
        self
    }

    /// Enable the liveness check
    pub fn with_ping(mut self) -> Self {
        self.ping_enabled = true;
        self
    }

    /// Enable the liveness check and make it take `delay`
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_enabled = true;
        self.ping_delay = Some(delay);
        self
    }

    /// Make every following dial fail
    pub fn refuse_dials(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make every following ping fail
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Number of channels dialed so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Ids of closed channels, in close order
    pub fn closed(&self) -> Vec<usize> {
        self.closed.lock().clone()
    }

    /// Whether some channel went through `close` more than once
    pub fn has_double_close(&self) -> bool {
        let closed = self.closed.lock();
        let unique: HashSet<_> = closed.iter().collect();
        unique.len() != closed.len()
    }
}

#[async_trait]
impl ConnectionFactory for MockChannelFactory {
    type Connection = MockChannel;

    async fn create(&self) -> Result<MockChannel> {
        if let Some(delay) = self.dial_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            anyhow::bail!("dial tcp 127.0.0.1:16777: connection refused");
        }
        let id = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockChannel { id })
    }

    async fn close(&self, conn: MockChannel) -> Result<()> {
        self.closed.lock().push(conn.id);
        Ok(())
    }

    fn has_ping(&self) -> bool {
        self.ping_enabled
    }

    async fn ping(&self, _conn: &mut MockChannel) -> Result<()> {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unhealthy.load(Ordering::SeqCst) {
            anyhow::bail!("transport is closing");
        }
        Ok(())
    }
}

/// Fresh channel factory with tracing installed
#[fixture]
pub fn channel_factory() -> Arc<MockChannelFactory> {
    init_tracing();
    Arc::new(MockChannelFactory::new())
}

/// Build a shared pool or fail the test
pub async fn pool_with(
    config: PoolConfig,
    factory: Arc<MockChannelFactory>,
) -> Arc<Pool<Arc<MockChannelFactory>>> {
    match Pool::new(config, factory).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => panic!("failed to create pool: {e}"),
    }
}

/// A callback-built factory whose ping always fails
pub fn always_unhealthy_factory(created: Arc<AtomicUsize>) -> FnFactory<MockChannel> {
    FnFactory::builder()
        .create(move || {
            let created = created.clone();
            async move {
                let id = created.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(MockChannel { id })
            }
        })
        .close(|_channel| async { anyhow::Ok(()) })
        .ping(|_channel| async { Err::<(), _>(anyhow::anyhow!("health check failed")) }.boxed())
        .build()
        .unwrap_or_else(|e| panic!("factory callbacks are set: {e}"))
}

/// Let other tasks run until `n` borrows are parked
pub async fn wait_for_waiters<F: ConnectionFactory>(pool: &Pool<F>, n: usize) {
    while pool.stats().waiting() < n {
        tokio::task::yield_now().await;
    }
}

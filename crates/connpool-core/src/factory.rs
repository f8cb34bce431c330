//! Connection capability trait and its closure-backed implementation

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::{PoolError, Result};

/// Factory trait for creating, closing and health-checking connections
///
/// The pool never looks inside a connection; everything it needs to know
/// about the underlying protocol goes through this trait.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The raw connection handle managed by the pool
    type Connection: Send + 'static;

    /// Create a new connection
    async fn create(&self) -> anyhow::Result<Self::Connection>;

    /// Release one connection's resources
    async fn close(&self, conn: Self::Connection) -> anyhow::Result<()>;

    /// Whether `ping` performs a real liveness check
    ///
    /// The pool skips the health check entirely when this returns false.
    fn has_ping(&self) -> bool {
        false
    }

    /// Check that a connection is still usable
    ///
    /// Any error marks the connection unhealthy.
    async fn ping(&self, _conn: &mut Self::Connection) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    type Connection = T::Connection;

    async fn create(&self) -> anyhow::Result<Self::Connection> {
        (**self).create().await
    }

    async fn close(&self, conn: Self::Connection) -> anyhow::Result<()> {
        (**self).close(conn).await
    }

    fn has_ping(&self) -> bool {
        (**self).has_ping()
    }

    async fn ping(&self, conn: &mut Self::Connection) -> anyhow::Result<()> {
        (**self).ping(conn).await
    }
}

type CreateFn<C> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<C>> + Send + Sync>;
type CloseFn<C> = Arc<dyn Fn(C) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type PingFn<C> =
    Arc<dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

/// A `ConnectionFactory` assembled from callbacks
///
/// # Example
///
/// ```
/// use connpool_core::FnFactory;
///
/// let factory = FnFactory::<u32>::builder()
///     .create(|| async { anyhow::Ok(7) })
///     .close(|_conn| async { anyhow::Ok(()) })
///     .build()
///     .expect("create and close are set");
/// ```
pub struct FnFactory<C> {
    create: CreateFn<C>,
    close: CloseFn<C>,
    ping: Option<PingFn<C>>,
}

impl<C: Send + 'static> FnFactory<C> {
    /// Start building a factory from callbacks
    pub fn builder() -> FnFactoryBuilder<C> {
        FnFactoryBuilder::default()
    }
}

impl<C> Clone for FnFactory<C> {
    fn clone(&self) -> Self {
        Self {
            create: self.create.clone(),
            close: self.close.clone(),
            ping: self.ping.clone(),
        }
    }
}

impl<C> std::fmt::Debug for FnFactory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFactory")
            .field("ping", &self.ping.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Send + 'static> ConnectionFactory for FnFactory<C> {
    type Connection = C;

    async fn create(&self) -> anyhow::Result<C> {
        (self.create)().await
    }

    async fn close(&self, conn: C) -> anyhow::Result<()> {
        (self.close)(conn).await
    }

    fn has_ping(&self) -> bool {
        self.ping.is_some()
    }

    async fn ping(&self, conn: &mut C) -> anyhow::Result<()> {
        match &self.ping {
            Some(ping) => ping(conn).await,
            None => Ok(()),
        }
    }
}

/// Builder for [`FnFactory`]
///
/// `create` and `close` are required; `ping` is optional.
pub struct FnFactoryBuilder<C> {
    create: Option<CreateFn<C>>,
    close: Option<CloseFn<C>>,
    ping: Option<PingFn<C>>,
}

impl<C> Default for FnFactoryBuilder<C> {
    fn default() -> Self {
        Self {
            create: None,
            close: None,
            ping: None,
        }
    }
}

impl<C: Send + 'static> FnFactoryBuilder<C> {
    /// Set the callback that produces a new connection
    pub fn create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<C>> + Send + 'static,
    {
        self.create = Some(Arc::new(move || f().boxed()));
        self
    }

    /// Set the callback that tears a connection down
    pub fn close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.close = Some(Arc::new(move |conn| f(conn).boxed()));
        self
    }

    /// Set the liveness check
    ///
    /// The returned future may borrow the connection, so it has to be boxed
    /// by the caller: `.ping(|conn| async move { conn.check() }.boxed())`.
    pub fn ping<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.ping = Some(Arc::new(f));
        self
    }

    /// Finish the factory
    ///
    /// Fails with `InvalidConfiguration` when `create` or `close` is unset.
    pub fn build(self) -> Result<FnFactory<C>> {
        let create = self.create.ok_or_else(|| {
            PoolError::InvalidConfiguration("invalid factory func settings".into())
        })?;
        let close = self.close.ok_or_else(|| {
            PoolError::InvalidConfiguration("invalid close func settings".into())
        })?;

        Ok(FnFactory {
            create,
            close,
            ping: self.ping,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_requires_create() {
        let result = FnFactory::<u32>::builder()
            .close(|_| async { anyhow::Ok(()) })
            .build();
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_requires_close() {
        let result = FnFactory::<u32>::builder()
            .create(|| async { anyhow::Ok(1) })
            .build();
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_fn_factory_delegates() {
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_in_cb = closed.clone();

        let factory = FnFactory::<u32>::builder()
            .create(|| async { anyhow::Ok(42) })
            .close(move |_| {
                let closed = closed_in_cb.clone();
                async move {
                    closed.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .build()
            .expect("build factory");

        assert!(!factory.has_ping());
        let mut conn = factory.create().await.expect("create");
        assert_eq!(conn, 42);
        factory.ping(&mut conn).await.expect("default ping succeeds");
        factory.close(conn).await.expect("close");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fn_factory_ping() {
        let factory = FnFactory::<u32>::builder()
            .create(|| async { anyhow::Ok(0) })
            .close(|_| async { anyhow::Ok(()) })
            .ping(|conn| {
                async move {
                    if *conn == 0 {
                        anyhow::bail!("connection reset");
                    }
                    anyhow::Ok(())
                }
                .boxed()
            })
            .build()
            .expect("build factory");

        assert!(factory.has_ping());
        let mut dead = 0;
        let mut alive = 1;
        assert!(factory.ping(&mut dead).await.is_err());
        assert!(factory.ping(&mut alive).await.is_ok());
    }
}

//! Construction and teardown tests

#[cfg(test)]
mod lifecycle_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use connpool::{PoolConfig, PoolError};
    use pretty_assertions::assert_eq;
    use rstest::*;

    use crate::fixtures::{
        MockChannelFactory, channel_factory, init_tracing, pool_with, wait_for_waiters,
    };

    #[rstest]
    #[tokio::test]
    async fn test_release_closes_idle_and_rejects_borrows(
        channel_factory: Arc<MockChannelFactory>,
    ) -> anyhow::Result<()> {
        let pool = pool_with(PoolConfig::new(4, 4, 8), channel_factory.clone()).await;

        pool.release().await;

        assert!(pool.is_closed());
        assert_eq!(pool.len(), 0);
        assert_eq!(channel_factory.closed(), vec![0, 1, 2, 3]);
        for _ in 0..3 {
            assert!(matches!(pool.get().await, Err(PoolError::PoolClosed)));
        }
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_release_twice_is_a_noop(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(2, 2, 2), channel_factory.clone()).await;

        pool.release().await;
        pool.release().await;

        assert_eq!(channel_factory.closed().len(), 2);
        assert!(!channel_factory.has_double_close());
    }

    #[rstest]
    #[tokio::test]
    async fn test_return_after_release_closes(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(1, 2, 2), channel_factory.clone()).await;
        let channel = pool.get().await.expect("borrow");

        pool.release().await;
        assert!(channel_factory.closed().is_empty(), "borrowed channel is not touched");

        pool.put(channel).await.expect("return");
        assert_eq!(channel_factory.closed(), vec![0]);
        assert_eq!(pool.len(), 0, "no idle connections are accepted after release");
    }

    #[rstest]
    #[tokio::test]
    async fn test_release_wakes_every_waiter(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(0, 1, 1), channel_factory).await;
        let _channel = pool.get().await.expect("borrow");

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.get().await })
            })
            .collect();
        wait_for_waiters(&pool, 3).await;

        pool.release().await;
        for waiter in waiters {
            let result = waiter.await.expect("join");
            assert!(matches!(result, Err(PoolError::MaxActiveReached)));
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_force_close(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(0, 2, 2), channel_factory.clone()).await;
        let channel = pool.get().await.expect("borrow");
        assert_eq!(pool.stats().total(), 1);

        pool.close(channel).await.expect("close");
        assert_eq!(pool.stats().total(), 0);
        assert_eq!(channel_factory.closed(), vec![0]);

        pool.release().await;
        assert_eq!(channel_factory.closed(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_during_create_fails_the_borrow() {
        init_tracing();
        let factory = Arc::new(MockChannelFactory::new().with_dial_delay(Duration::from_millis(50)));
        let pool = pool_with(PoolConfig::new(0, 1, 1), factory.clone()).await;

        let borrow = tokio::spawn({
            let pool = pool.clone();
            async move { pool.get().await }
        });
        while pool.stats().total() == 0 {
            tokio::task::yield_now().await;
        }

        pool.release().await;
        let result = borrow.await.expect("join");
        assert!(matches!(result, Err(PoolError::PoolClosed)));
        assert_eq!(factory.closed(), vec![0]);
        assert_eq!(pool.stats().total(), 0);
    }
}

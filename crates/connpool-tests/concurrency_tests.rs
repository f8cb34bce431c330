//! Many borrowers against one pool on a multi-threaded runtime

#[cfg(test)]
mod concurrency_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use connpool::PoolConfig;
    use pretty_assertions::assert_eq;
    use rstest::*;

    use crate::fixtures::{MockChannelFactory, channel_factory, pool_with};

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_open_count_never_exceeds_max_active(channel_factory: Arc<MockChannelFactory>) {
        const MAX_ACTIVE: usize = 10;
        let pool = pool_with(PoolConfig::new(2, 5, MAX_ACTIVE), channel_factory.clone()).await;

        let done = Arc::new(AtomicBool::new(false));
        let sampler = {
            let pool = pool.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut peak = 0;
                while !done.load(Ordering::SeqCst) {
                    peak = peak.max(pool.stats().total());
                    tokio::task::yield_now().await;
                }
                peak
            })
        };

        let workers: Vec<_> = (0..50)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let channel = pool
                            .get_timeout(Duration::from_secs(10))
                            .await
                            .expect("borrow under load");
                        tokio::task::yield_now().await;
                        pool.put(channel).await.expect("return");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.await.expect("worker panicked");
        }

        done.store(true, Ordering::SeqCst);
        let peak = sampler.await.expect("sampler panicked");
        assert!(peak <= MAX_ACTIVE, "peak of {peak} open connections");
        assert_eq!(pool.stats().waiting(), 0);
        assert!(pool.len() <= 5);

        pool.release().await;
        assert_eq!(channel_factory.closed().len(), channel_factory.created());
        assert!(!channel_factory.has_double_close());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_release_under_load(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(0, 2, 4), channel_factory.clone()).await;
        let borrows = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..12)
            .map(|_| {
                let pool = pool.clone();
                let borrows = borrows.clone();
                tokio::spawn(async move {
                    loop {
                        match pool.get().await {
                            Ok(channel) => {
                                borrows.fetch_add(1, Ordering::SeqCst);
                                tokio::task::yield_now().await;
                                pool.put(channel).await.expect("return");
                            }
                            Err(e) => return e,
                        }
                    }
                })
            })
            .collect();

        while borrows.load(Ordering::SeqCst) < 100 {
            tokio::task::yield_now().await;
        }

        let finished = tokio::time::timeout(Duration::from_secs(10), async {
            pool.release().await;
            let mut errors = Vec::new();
            for worker in workers {
                errors.push(worker.await.expect("worker panicked"));
            }
            errors
        })
        .await
        .expect("release and borrowers deadlocked");

        assert_eq!(finished.len(), 12);
        for e in &finished {
            assert!(e.is_closed(), "unexpected error after release: {e}");
        }
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.stats().total(), 0);
        assert_eq!(channel_factory.closed().len(), channel_factory.created());
        assert!(!channel_factory.has_double_close());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timed_out_borrows_release_nothing(channel_factory: Arc<MockChannelFactory>) {
        let pool = pool_with(PoolConfig::new(0, 1, 1), channel_factory.clone()).await;
        let held = pool.get().await.expect("borrow");

        let impatient: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.get_timeout(Duration::from_millis(20)).await })
            })
            .collect();
        for task in impatient {
            let result = task.await.expect("join");
            assert!(matches!(result, Err(connpool::PoolError::Timeout(_))));
        }

        assert_eq!(pool.stats().waiting(), 0);
        pool.put(held).await.expect("return");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.stats().total(), 1);
        assert_eq!(channel_factory.created(), 1);
    }
}

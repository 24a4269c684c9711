use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use speed_api::{BenchRecord, BenchStore, StoreError};

use crate::rate::{OpKind, RateCounters, RateWindow};

/// Batch size and window threshold shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub batch_size: usize,
    pub window: Duration,
}

/// Spawn one rate worker on its own store handle.
///
/// The task resolves to the number of completed operations, or to the first
/// store error, which ends the worker. Its counter then keeps the last rate.
pub fn spawn_worker(
    op: OpKind,
    store: Arc<dyn BenchStore>,
    counters: Arc<RateCounters>,
    settings: WorkerSettings,
    token: CancellationToken,
) -> JoinHandle<Result<u64, StoreError>> {
    tokio::spawn(async move {
        tracing::debug!(worker = %op, "worker started");
        let result = run_worker(op, &*store, &counters, settings, &token).await;
        match &result {
            Ok(total) => tracing::debug!(worker = %op, total, "worker stopped"),
            Err(e) => tracing::warn!(worker = %op, error = ?e, "worker died"),
        }
        result
    })
}

async fn run_worker(
    op: OpKind,
    store: &dyn BenchStore,
    counters: &RateCounters,
    settings: WorkerSettings,
    token: &CancellationToken,
) -> Result<u64, StoreError> {
    let counter = counters.for_op(op);
    counter.publish(0.0);

    let mut window = RateWindow::new(settings.window, Instant::now());
    let mut total = 0u64;

    // The flag is only looked at between batches.
    while !token.is_cancelled() {
        let mut done = 0u64;
        for seq in (0u64..).take(settings.batch_size) {
            if perform(op, store, seq).await? {
                done += 1;
            }
        }
        window.add(done);
        total += done;

        if let Some(rate) = window.poll(Instant::now()) {
            counter.publish(rate);
        }

        tokio::task::yield_now().await;
    }

    Ok(total)
}

/// One operation. `Ok(false)` means it was skipped and isn't counted.
async fn perform(op: OpKind, store: &dyn BenchStore, seq: u64) -> Result<bool, StoreError> {
    match op {
        OpKind::Read => {
            store.query_all().await?;
            Ok(true)
        }
        OpKind::Write => match store.insert(&BenchRecord::new(seq)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_duplicate() => {
                tracing::debug!(error = %e, "duplicate id ignored");
                Ok(false)
            }
            Err(e) => Err(e),
        },
        OpKind::Remove => {
            store.remove_marked().await?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use speed_api::{AccessMode, Destination, StoreFactory, StoreFuture};
    use storage_memory::MemoryStoreFactory;

    use super::*;

    fn settings() -> WorkerSettings {
        WorkerSettings { batch_size: 10, window: Duration::from_millis(20) }
    }

    async fn open(factory: &MemoryStoreFactory) -> Arc<dyn BenchStore> {
        let dest: Destination = "localhost/test/bench".parse().unwrap();
        factory.open(&dest, AccessMode::ReadWrite).await.unwrap()
    }

    /// Rejects every `every`-th insert as a duplicate, fails after `fail_after` calls.
    struct FlakyStore {
        calls: AtomicUsize,
        every: usize,
        fail_after: usize,
    }

    impl BenchStore for FlakyStore {
        fn query_all(&self) -> StoreFuture<'_, usize> {
            Box::pin(async { Ok(0) })
        }

        fn insert<'a>(&'a self, _record: &'a BenchRecord) -> StoreFuture<'a, ()> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n > self.fail_after {
                    Err(StoreError::io("connection reset"))
                } else if n % self.every == 0 {
                    Err(StoreError::duplicate("E11000 duplicate key"))
                } else {
                    Ok(())
                }
            })
        }

        fn remove_marked(&self) -> StoreFuture<'_, u64> {
            Box::pin(async { Ok(0) })
        }

        fn count_marked(&self) -> StoreFuture<'_, u64> {
            Box::pin(async { Ok(0) })
        }
    }

    #[tokio::test]
    async fn write_worker_inserts_in_batches_until_cancelled() {
        let factory = MemoryStoreFactory::new();
        let store = open(&factory).await;
        let counters = Arc::new(RateCounters::default());
        let token = CancellationToken::new();

        let handle = spawn_worker(OpKind::Write, store.clone(), counters.clone(), settings(), token.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let total = handle.await.unwrap().unwrap();
        assert!(total > 0);
        assert_eq!(total % 10, 0, "cancellation only lands on batch boundaries");
        assert_eq!(store.count_marked().await.unwrap(), total);
        assert!(counters.writes.get() > 0.0);
        assert_eq!(counters.reads.get(), 0.0);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let factory = MemoryStoreFactory::new();
        let store = open(&factory).await;
        let counters = Arc::new(RateCounters::default());
        let token = CancellationToken::new();
        token.cancel();

        let total = spawn_worker(OpKind::Write, store.clone(), counters, settings(), token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total, 0);
        assert_eq!(store.count_marked().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_worker_clears_marked_records() {
        let factory = MemoryStoreFactory::new();
        let store = open(&factory).await;
        for seq in 0..50 {
            store.insert(&BenchRecord::new(seq)).await.unwrap();
        }
        let counters = Arc::new(RateCounters::default());
        let token = CancellationToken::new();

        let handle = spawn_worker(OpKind::Remove, store.clone(), counters.clone(), settings(), token.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        assert!(handle.await.unwrap().unwrap() > 0);
        assert_eq!(store.count_marked().await.unwrap(), 0);
        assert!(counters.removes.get() > 0.0);
    }

    #[tokio::test]
    async fn duplicates_skipped_other_errors_end_worker() {
        let store = Arc::new(FlakyStore { calls: AtomicUsize::new(0), every: 3, fail_after: 25 });
        let counters = Arc::new(RateCounters::default());
        let token = CancellationToken::new();

        let err = spawn_worker(OpKind::Write, store.clone(), counters, settings(), token.clone())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), speed_api::ErrorKind::Io);
        assert_eq!(store.calls.load(Ordering::SeqCst), 26);
        assert!(!token.is_cancelled());
    }
}

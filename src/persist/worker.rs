//! Periodic flush worker
//!
//! Drains the pending buffers on a slow cycle and writes them to the
//! durable store. Storage I/O happens outside the buffer lock, under a
//! bounded timeout; a failed or timed-out flush restores the batch for
//! retry on the next cycle.

use super::{PendingBatch, PendingBuffers};
use crate::instrument::Instrument;
use crate::store::QuoteStore;
use crate::telemetry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

/// Write-behind persistence worker
pub struct FlushWorker {
    store: Arc<dyn QuoteStore>,
    buffers: Arc<Mutex<PendingBuffers>>,
    interval: Duration,
    timeout: Duration,
}

impl FlushWorker {
    /// Create a worker over the shared buffers and store
    pub fn new(
        store: Arc<dyn QuoteStore>,
        buffers: Arc<Mutex<PendingBuffers>>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            buffers,
            interval,
            timeout,
        }
    }

    /// Run the flush loop until shutdown, then make one best-effort
    /// final flush
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                _ = shutdown.changed() => {
                    self.flush_once().await;
                    tracing::info!("Persistence worker shutting down");
                    break;
                }
            }
        }
    }

    /// Attempt one flush cycle
    ///
    /// Swaps the buffers for fresh empty structures under the lock, then
    /// flushes the taken batch outside it, so ticks landing mid-flush
    /// fill the new generation and never wait on storage.
    pub async fn flush_once(&self) {
        let batch = {
            let mut buffers = self.buffers.lock().await;
            buffers.take()
        };

        if batch.is_empty() {
            return;
        }

        let delta_count = batch.deltas.len();
        let point_count = batch.history.len();
        let deltas: Vec<Instrument> = batch.deltas.values().cloned().collect();

        let started = Instant::now();
        let result =
            tokio::time::timeout(self.timeout, self.store.apply_flush(&deltas, &batch.history))
                .await;

        match result {
            Ok(Ok(())) => {
                telemetry::record_flush_success(delta_count, point_count, started.elapsed());
                tracing::debug!(
                    deltas = delta_count,
                    points = point_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flushed pending buffers"
                );
            }
            Ok(Err(e)) => {
                telemetry::record_flush_failure();
                tracing::warn!(
                    error = %e,
                    deltas = delta_count,
                    points = point_count,
                    "Flush failed, retaining buffers for retry"
                );
                self.restore(batch).await;
            }
            Err(_) => {
                telemetry::record_flush_failure();
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Flush timed out, retaining buffers for retry"
                );
                self.restore(batch).await;
            }
        }
    }

    async fn restore(&self, batch: PendingBatch) {
        let mut buffers = self.buffers.lock().await;
        buffers.restore(batch);
        telemetry::set_pending_sizes(buffers.delta_count(), buffers.history_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::TickPoint;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store that fails every flush until told otherwise
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                failing: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl QuoteStore for FlakyStore {
        async fn load_instruments(&self) -> Result<Vec<Instrument>, StoreError> {
            self.inner.load_instruments().await
        }

        async fn apply_flush(
            &self,
            deltas: &[Instrument],
            history: &[TickPoint],
        ) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected failure".to_string()));
            }
            self.inner.apply_flush(deltas, history).await
        }

        async fn history(
            &self,
            instrument_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<TickPoint>, StoreError> {
            self.inner.history(instrument_id, from, to).await
        }
    }

    fn snapshot(id: &str, price: rust_decimal::Decimal) -> Instrument {
        let mut inst =
            Instrument::seeded(id, id.to_uppercase(), id, "NASDAQ", "USD", price, 0, dec!(1000));
        inst.updated_at = Utc::now();
        inst
    }

    #[tokio::test]
    async fn test_successful_flush_drains_buffers() {
        let store = Arc::new(MemoryStore::new());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(1000)));
        buffers.lock().await.record(&snapshot("aapl", dec!(100)));

        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        worker.flush_once().await;

        assert!(buffers.lock().await.is_empty());
        assert_eq!(store.load_instruments().await.unwrap().len(), 1);
        assert_eq!(store.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_flush_retains_batch() {
        let store = Arc::new(FlakyStore::new());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(1000)));
        buffers.lock().await.record(&snapshot("aapl", dec!(100)));

        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        worker.flush_once().await;

        {
            let pending = buffers.lock().await;
            assert_eq!(pending.delta_count(), 1);
            assert_eq!(pending.history_count(), 1);
        }

        // Recovery: the retained batch goes through on the next cycle.
        store.failing.store(false, Ordering::SeqCst);
        worker.flush_once().await;

        assert!(buffers.lock().await.is_empty());
        assert_eq!(store.inner.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_retried_flush_does_not_duplicate() {
        // Simulates a flush that committed but was reported as failed:
        // the batch is restored and flushed again with the same content.
        let store = Arc::new(MemoryStore::new());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(1000)));
        buffers.lock().await.record(&snapshot("aapl", dec!(100)));

        let batch = buffers.lock().await.take();
        let deltas: Vec<Instrument> = batch.deltas.values().cloned().collect();
        store.apply_flush(&deltas, &batch.history).await.unwrap();
        buffers.lock().await.restore(batch);

        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        worker.flush_once().await;

        assert_eq!(store.history_len().await, 1);
        let rows = store.load_instruments().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].volume, 0);
    }

    #[tokio::test]
    async fn test_empty_buffers_flush_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(1000)));

        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        worker.flush_once().await;

        assert_eq!(store.load_instruments().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(1000)));
        buffers.lock().await.record(&snapshot("aapl", dec!(100)));

        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(store.load_instruments().await.unwrap().len(), 1);
    }
}

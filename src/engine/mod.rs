//! Engine wiring
//!
//! Owns the registry, pending buffers, and router, and drives the three
//! periodic activities — fast tick mutation, slow persistence flush,
//! very-slow registry reload — as independently scheduled tasks with
//! explicit shutdown handles. Also exposes the synchronous-read query
//! surface consumed by trade/portfolio logic and the reactive
//! connect/subscribe surface for streaming consumers.

use crate::bootstrap;
use crate::config::Config;
use crate::error::EngineError;
use crate::history::{HistoryRange, HistoryService, PriceHistory};
use crate::instrument::{Instrument, Registry};
use crate::mutator::{MutatorConfig, PriceMutator};
use crate::persist::{FlushWorker, PendingBuffers};
use crate::router::{ConsumerId, ConsumerKind, EngineMessage, SubscriptionRouter};
use crate::store::QuoteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The market-data engine
pub struct Engine {
    registry: Arc<Registry>,
    router: Arc<SubscriptionRouter>,
    history: HistoryService,
    // Ticks and reloads halt on the first signal; the flush worker
    // drains on the second, after ticks have stopped, so the final
    // flush sees every buffered mutation.
    halt_tx: watch::Sender<bool>,
    drain_tx: watch::Sender<bool>,
    loop_tasks: Vec<JoinHandle<()>>,
    worker_task: JoinHandle<()>,
}

impl Engine {
    /// Bootstrap the registry and start the periodic tasks
    ///
    /// Returns only once the registry is tick-ready; the price mutator
    /// never runs concurrently with bootstrap.
    pub async fn start(config: Config, store: Arc<dyn QuoteStore>) -> Result<Self, EngineError> {
        let registry = Arc::new(Registry::new());
        let router = Arc::new(SubscriptionRouter::default());
        let buffers = Arc::new(Mutex::new(PendingBuffers::new(
            config.persistence.max_pending_history,
        )));

        let outcome = bootstrap::load_or_seed(store.as_ref(), &registry).await?;
        tracing::info!(?outcome, instruments = registry.len().await, "Bootstrap complete");

        let (halt_tx, _) = watch::channel(false);
        let (drain_tx, _) = watch::channel(false);

        let mutator_config = MutatorConfig {
            max_delta_bps: config.tick.max_delta_bps,
            min_price: config.tick.min_price,
            price_decimals: config.tick.price_decimals,
            max_volume_step: config.tick.max_volume_step,
        };

        // Tick loop
        let tick_handle = {
            let mut mutator =
                PriceMutator::new(registry.clone(), buffers.clone(), mutator_config);
            let router = router.clone();
            let mut halt = halt_tx.subscribe();
            let interval = Duration::from_millis(config.tick.interval_ms);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let batch = mutator.run_tick().await;
                            // Fan out only after the batch is finalized.
                            if !batch.is_empty() {
                                router.broadcast(&batch).await;
                            }
                        }
                        _ = halt.changed() => {
                            tracing::info!("Tick loop halted");
                            break;
                        }
                    }
                }
            })
        };

        // Slow registry reload for out-of-band instrument additions
        let reload_handle = {
            let store = store.clone();
            let registry = registry.clone();
            let mut halt = halt_tx.subscribe();
            let period = Duration::from_secs(config.bootstrap.reload_interval_secs);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = bootstrap::reconcile(store.as_ref(), &registry).await {
                                tracing::warn!(error = %e, "Registry reload failed");
                            }
                        }
                        _ = halt.changed() => break,
                    }
                }
            })
        };

        // Write-behind persistence worker
        let worker = FlushWorker::new(
            store.clone(),
            buffers.clone(),
            Duration::from_secs(config.persistence.flush_interval_secs),
            Duration::from_secs(config.persistence.flush_timeout_secs),
        );
        let worker_task = tokio::spawn(worker.run(drain_tx.subscribe()));

        let history = HistoryService::new(store, registry.clone());

        Ok(Self {
            registry,
            router,
            history,
            halt_tx,
            drain_tx,
            loop_tasks: vec![tick_handle, reload_handle],
            worker_task,
        })
    }

    /// Stop ticking, drain buffers with one best-effort flush, and join
    /// all tasks
    pub async fn shutdown(mut self) {
        tracing::info!("Engine shutting down");
        let _ = self.halt_tx.send(true);
        for task in self.loop_tasks.drain(..) {
            let _ = task.await;
        }
        let _ = self.drain_tx.send(true);
        let _ = self.worker_task.await;
        tracing::info!("Engine stopped");
    }

    // --- query surface ---

    /// Current snapshots of all instruments
    pub async fn stocks(&self) -> Vec<Instrument> {
        self.registry.get_all().await
    }

    /// Current snapshot of one instrument
    ///
    /// The price is only "last_price at call time"; trade execution must
    /// re-read within its own transaction boundary.
    pub async fn stock_by_id(&self, id: &str) -> Result<Instrument, EngineError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| EngineError::InstrumentNotFound(id.to_string()))
    }

    /// Current snapshots filtered by market
    pub async fn stocks_by_market(&self, market: &str) -> Vec<Instrument> {
        self.registry.get_by_market(market).await
    }

    /// Range-filtered price history with synthetic fallback
    pub async fn stock_price_history(
        &self,
        id: &str,
        range: HistoryRange,
    ) -> Result<PriceHistory, EngineError> {
        self.history.get(id, range).await
    }

    // --- consumer surface ---

    /// Register a streaming consumer; the receiver's first message is a
    /// full current snapshot
    pub async fn connect(&self, kind: ConsumerKind) -> (ConsumerId, mpsc::Receiver<EngineMessage>) {
        let snapshot = self.registry.get_all().await;
        self.router.connect(kind, snapshot).await
    }

    /// Subscribe a scoped consumer to one instrument
    pub async fn subscribe(&self, consumer: ConsumerId, instrument_id: &str) {
        self.router.subscribe(consumer, instrument_id).await;
    }

    /// Drop a scoped consumer's interest in one instrument
    pub async fn unsubscribe(&self, consumer: ConsumerId, instrument_id: &str) {
        self.router.unsubscribe(consumer, instrument_id).await;
    }

    /// Remove a consumer and purge its interest entries
    pub async fn disconnect(&self, consumer: ConsumerId) {
        self.router.disconnect(consumer).await;
    }
}

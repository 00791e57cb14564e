//! Subscription router
//!
//! Tracks consumer interest and fans tick batches out. Two interest
//! kinds: global consumers receive every tick's full batch; scoped
//! consumers receive single-instrument updates for the instruments they
//! subscribed to. The per-instrument interest map is reference-counted
//! by consumer: an entry lives while at least one consumer holds it.
//!
//! Fan-out never blocks the tick loop: messages go out with `try_send`
//! and a full or closed channel simply drops that message.

use crate::instrument::Instrument;
use crate::telemetry;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Opaque consumer handle
pub type ConsumerId = Uuid;

/// Messages delivered to consumers
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// Full current snapshot, sent once on connect
    Snapshot(Vec<Instrument>),
    /// Full updated-instrument batch for one tick (global consumers)
    Batch(Vec<Instrument>),
    /// Single-instrument update (scoped consumers)
    Update(Instrument),
}

/// Consumer interest kind chosen at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    /// Receives the full batch every tick
    Global,
    /// Receives updates only for subscribed instruments
    Scoped,
}

struct Consumer {
    kind: ConsumerKind,
    tx: mpsc::Sender<EngineMessage>,
    subscriptions: HashSet<String>,
}

#[derive(Default)]
struct RouterState {
    consumers: HashMap<ConsumerId, Consumer>,
    // instrument id -> consumers interested in it
    interest: HashMap<String, HashSet<ConsumerId>>,
}

/// Fan-out hub owned by the engine
pub struct SubscriptionRouter {
    state: Mutex<RouterState>,
    channel_capacity: usize,
}

impl Default for SubscriptionRouter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SubscriptionRouter {
    /// Create a router with the given per-consumer channel capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            state: Mutex::new(RouterState::default()),
            channel_capacity,
        }
    }

    /// Register a consumer and deliver its catch-up snapshot
    ///
    /// The snapshot goes into the channel before this call returns, so
    /// the consumer sees current state before any tick update.
    pub async fn connect(
        &self,
        kind: ConsumerKind,
        snapshot: Vec<Instrument>,
    ) -> (ConsumerId, mpsc::Receiver<EngineMessage>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let id = Uuid::new_v4();

        // Fresh channel, capacity >= 1: this cannot fail.
        let _ = tx.try_send(EngineMessage::Snapshot(snapshot));

        let mut state = self.state.lock().await;
        state.consumers.insert(
            id,
            Consumer {
                kind,
                tx,
                subscriptions: HashSet::new(),
            },
        );
        telemetry::set_connected_consumers(state.consumers.len());
        tracing::debug!(consumer = %id, ?kind, "Consumer connected");

        (id, rx)
    }

    /// Register interest in one instrument for a scoped consumer
    pub async fn subscribe(&self, consumer: ConsumerId, instrument_id: &str) {
        let mut state = self.state.lock().await;
        let Some(entry) = state.consumers.get_mut(&consumer) else {
            tracing::warn!(consumer = %consumer, "Subscribe from unknown consumer");
            return;
        };
        entry.subscriptions.insert(instrument_id.to_string());
        state
            .interest
            .entry(instrument_id.to_string())
            .or_default()
            .insert(consumer);
    }

    /// Drop interest in one instrument
    ///
    /// The interest entry stays alive while other consumers still hold
    /// it; it is removed only when the last one leaves.
    pub async fn unsubscribe(&self, consumer: ConsumerId, instrument_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.consumers.get_mut(&consumer) {
            entry.subscriptions.remove(instrument_id);
        }
        if let Some(interested) = state.interest.get_mut(instrument_id) {
            interested.remove(&consumer);
            if interested.is_empty() {
                state.interest.remove(instrument_id);
            }
        }
    }

    /// Remove a consumer and purge all of its interest entries
    pub async fn disconnect(&self, consumer: ConsumerId) {
        let mut state = self.state.lock().await;
        Self::purge(&mut state, consumer);
        telemetry::set_connected_consumers(state.consumers.len());
        tracing::debug!(consumer = %consumer, "Consumer disconnected");
    }

    fn purge(state: &mut RouterState, consumer: ConsumerId) {
        state.consumers.remove(&consumer);
        // Defensive sweep over every entry, not just the consumer's own
        // subscription set.
        state.interest.retain(|_, interested| {
            interested.remove(&consumer);
            !interested.is_empty()
        });
    }

    /// Fan one finalized tick batch out to all interested consumers
    ///
    /// Must only be called with a fully finalized batch; per-tick
    /// ordering is guaranteed by never interleaving this with mutation.
    pub async fn broadcast(&self, batch: &[Instrument]) {
        if batch.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;
        let mut closed: Vec<ConsumerId> = Vec::new();

        for (id, consumer) in &state.consumers {
            if consumer.kind != ConsumerKind::Global {
                continue;
            }
            match consumer.tx.try_send(EngineMessage::Batch(batch.to_vec())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    telemetry::record_dropped_message();
                    tracing::debug!(consumer = %id, "Dropped batch for slow consumer");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for instrument in batch {
            let Some(interested) = state.interest.get(&instrument.id) else {
                continue;
            };
            for id in interested {
                let Some(consumer) = state.consumers.get(id) else {
                    continue;
                };
                match consumer.tx.try_send(EngineMessage::Update(instrument.clone())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        telemetry::record_dropped_message();
                        tracing::debug!(consumer = %id, instrument = %instrument.id, "Dropped update for slow consumer");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            Self::purge(&mut state, id);
            tracing::debug!(consumer = %id, "Purged consumer with closed channel");
        }
        telemetry::set_connected_consumers(state.consumers.len());
    }

    /// Number of connected consumers
    pub async fn consumer_count(&self) -> usize {
        self.state.lock().await.consumers.len()
    }

    /// Number of instruments with at least one interested consumer
    pub async fn interest_count(&self) -> usize {
        self.state.lock().await.interest.len()
    }
}

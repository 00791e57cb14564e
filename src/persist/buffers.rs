//! Pending delta and history buffers
//!
//! `deltas` holds only the latest unflushed snapshot per instrument
//! (overwritten each tick, never queued); `history` is the append-only
//! list of unflushed tick points. Under sustained flush failure the
//! history list is capped by evicting the oldest points first — deltas
//! are never evicted, latest-quote preservation beats historical
//! granularity.

use crate::instrument::{Instrument, TickPoint};
use std::collections::HashMap;

/// A batch taken from the buffers for one flush attempt
#[derive(Debug, Default)]
pub struct PendingBatch {
    /// Latest unflushed snapshot per instrument
    pub deltas: HashMap<String, Instrument>,
    /// Unflushed tick points, oldest first
    pub history: Vec<TickPoint>,
}

impl PendingBatch {
    /// Whether there is nothing to flush
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.history.is_empty()
    }
}

/// Staging area between the price mutator and the persistence worker
#[derive(Debug)]
pub struct PendingBuffers {
    deltas: HashMap<String, Instrument>,
    history: Vec<TickPoint>,
    max_history: usize,
    evicted_total: u64,
}

impl PendingBuffers {
    /// Create buffers with the given history cap
    pub fn new(max_history: usize) -> Self {
        Self {
            deltas: HashMap::new(),
            history: Vec::new(),
            max_history,
            evicted_total: 0,
        }
    }

    /// Record a post-mutation snapshot: overwrite the instrument's delta
    /// and append a history point
    pub fn record(&mut self, snapshot: &Instrument) {
        self.history.push(TickPoint {
            instrument_id: snapshot.id.clone(),
            price: snapshot.last_price,
            timestamp: snapshot.updated_at,
        });
        self.deltas.insert(snapshot.id.clone(), snapshot.clone());
        self.enforce_cap();
    }

    /// Swap out everything pending, leaving fresh empty buffers
    ///
    /// Caller holds the buffer lock only for the swap; subsequent ticks
    /// fill the fresh generation while the taken batch is being flushed.
    pub fn take(&mut self) -> PendingBatch {
        PendingBatch {
            deltas: std::mem::take(&mut self.deltas),
            history: std::mem::take(&mut self.history),
        }
    }

    /// Put a failed flush batch back for retry on the next cycle
    ///
    /// Deltas recorded since the swap are newer and win over restored
    /// ones; restored history predates anything recorded since, so it
    /// goes in front and the cap is re-applied oldest-first.
    pub fn restore(&mut self, batch: PendingBatch) {
        for (id, row) in batch.deltas {
            self.deltas.entry(id).or_insert(row);
        }

        let mut history = batch.history;
        history.append(&mut self.history);
        self.history = history;
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if self.history.len() <= self.max_history {
            return;
        }
        let excess = self.history.len() - self.max_history;
        self.history.drain(..excess);
        self.evicted_total += excess as u64;
        crate::telemetry::record_evicted_points(excess as u64);
        tracing::error!(
            evicted = excess,
            total_evicted = self.evicted_total,
            "Pending history over capacity, evicted oldest points"
        );
    }

    /// Whether there is nothing pending
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.history.is_empty()
    }

    /// Number of pending deltas
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Number of pending history points
    pub fn history_count(&self) -> usize {
        self.history.len()
    }

    /// Total points evicted since startup
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }
}

//! Price mutator
//!
//! Drives the per-tick random walk over the instrument universe. The
//! walk is driftless and bounded: each tick draws a delta in
//! [-max_delta_bps, +max_delta_bps] basis points as an integer, so the
//! price path stays in exact decimal arithmetic end to end. Prices are
//! rounded half-even to the configured precision and floored at a
//! minimum positive price.

use crate::instrument::{Instrument, Registry};
use crate::persist::PendingBuffers;
use crate::telemetry;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Random-walk tuning
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// Maximum per-tick move in basis points (200 = ±2%)
    pub max_delta_bps: u32,
    /// Floor below which no price can fall
    pub min_price: Decimal,
    /// Decimal places prices are rounded to
    pub price_decimals: u32,
    /// Upper bound of the per-tick volume increment
    pub max_volume_step: u64,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            max_delta_bps: 200,
            min_price: Decimal::new(1, 2), // 0.01
            price_decimals: 2,
            max_volume_step: 10_000,
        }
    }
}

/// Tick-driven generator mutating registry entries
pub struct PriceMutator {
    registry: Arc<Registry>,
    buffers: Arc<Mutex<PendingBuffers>>,
    config: MutatorConfig,
    rng: StdRng,
}

impl PriceMutator {
    /// Create a mutator over the shared registry and pending buffers
    pub fn new(
        registry: Arc<Registry>,
        buffers: Arc<Mutex<PendingBuffers>>,
        config: MutatorConfig,
    ) -> Self {
        Self {
            registry,
            buffers,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a mutator with a deterministic walk (tests)
    pub fn with_seed(
        registry: Arc<Registry>,
        buffers: Arc<Mutex<PendingBuffers>>,
        config: MutatorConfig,
        seed: u64,
    ) -> Self {
        Self {
            registry,
            buffers,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run one tick across every instrument, returning the finalized
    /// batch of new snapshots
    ///
    /// Each mutated snapshot is staged into the pending buffers before
    /// the batch is handed back for fan-out. A single instrument failing
    /// mutation is logged and skipped; the rest of the tick proceeds.
    pub async fn run_tick(&mut self) -> Vec<Instrument> {
        let started = Instant::now();
        let now = Utc::now();
        let ids = self.registry.ids().await;
        let mut batch = Vec::with_capacity(ids.len());
        let config = self.config.clone();

        for id in ids {
            let delta = self.draw_delta();
            let volume_step = self.rng.gen_range(0..=config.max_volume_step);

            match self
                .registry
                .apply_mutation(&id, |inst| mutate(inst, delta, volume_step, &config, now))
                .await
            {
                Ok(snapshot) => {
                    let mut buffers = self.buffers.lock().await;
                    buffers.record(&snapshot);
                    telemetry::set_pending_sizes(buffers.delta_count(), buffers.history_count());
                    drop(buffers);
                    batch.push(snapshot);
                }
                Err(e) => {
                    tracing::warn!(instrument = %id, error = %e, "Skipping instrument this tick");
                }
            }
        }

        telemetry::record_tick(batch.len(), started.elapsed());
        batch
    }

    fn draw_delta(&mut self) -> Decimal {
        let max = self.config.max_delta_bps as i64;
        let bps = self.rng.gen_range(-max..=max);
        // Basis points to a fractional delta: 1 bp = 0.0001.
        Decimal::new(bps, 4)
    }
}

/// Apply one price step to an instrument
///
/// `delta` is a fractional move (e.g. -0.05 for −5%). Exposed within the
/// crate so forced-delta scenarios are directly testable.
pub(crate) fn mutate(
    inst: &mut Instrument,
    delta: Decimal,
    volume_step: u64,
    config: &MutatorConfig,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if inst.previous_close <= Decimal::ZERO {
        return Err(format!(
            "non-positive previous_close: {}",
            inst.previous_close
        ));
    }
    if inst.last_price <= Decimal::ZERO {
        return Err(format!("non-positive last_price: {}", inst.last_price));
    }

    let candidate = inst.last_price * (Decimal::ONE + delta);
    let price = candidate
        .round_dp(config.price_decimals)
        .max(config.min_price);

    inst.last_price = price;
    inst.change_amount = price - inst.previous_close;
    inst.change_percentage = ((price - inst.previous_close) * Decimal::ONE_HUNDRED
        / inst.previous_close)
        .round_dp(config.price_decimals);
    inst.day_high = inst.day_high.max(price);
    inst.day_low = inst.day_low.min(price);
    inst.volume += volume_step;
    inst.updated_at = now;

    Ok(())
}

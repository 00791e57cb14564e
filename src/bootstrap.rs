//! Bootstrap loader
//!
//! Populates the registry from durable storage at startup, falling back
//! to seed defaults when the store is empty or unreachable. Also
//! provides the slow periodic reconcile that picks up out-of-band
//! instrument additions without disturbing live state.

use crate::error::EngineError;
use crate::instrument::{Instrument, Registry};
use crate::store::QuoteStore;
use rust_decimal_macros::dec;

/// How the registry was populated at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Instruments loaded from the durable store
    Loaded(usize),
    /// Store was empty; seed defaults written through
    Seeded(usize),
    /// Store unreachable; running on seed defaults, non-durable
    Degraded(usize),
}

/// Fixed default instrument universe
pub fn seed_instruments() -> Vec<Instrument> {
    vec![
        Instrument::seeded(
            "aapl",
            "AAPL",
            "Apple Inc.",
            "NASDAQ",
            "USD",
            dec!(178.50),
            0,
            dec!(2800000000000),
        ),
        Instrument::seeded(
            "msft",
            "MSFT",
            "Microsoft Corporation",
            "NASDAQ",
            "USD",
            dec!(410.20),
            0,
            dec!(3050000000000),
        ),
        Instrument::seeded(
            "googl",
            "GOOGL",
            "Alphabet Inc.",
            "NASDAQ",
            "USD",
            dec!(141.80),
            0,
            dec!(1780000000000),
        ),
        Instrument::seeded(
            "amzn",
            "AMZN",
            "Amazon.com, Inc.",
            "NASDAQ",
            "USD",
            dec!(174.40),
            0,
            dec!(1810000000000),
        ),
        Instrument::seeded(
            "tsla",
            "TSLA",
            "Tesla, Inc.",
            "NASDAQ",
            "USD",
            dec!(248.90),
            0,
            dec!(790000000000),
        ),
        Instrument::seeded(
            "jpm",
            "JPM",
            "JPMorgan Chase & Co.",
            "NYSE",
            "USD",
            dec!(198.30),
            0,
            dec!(570000000000),
        ),
        Instrument::seeded(
            "ko",
            "KO",
            "The Coca-Cola Company",
            "NYSE",
            "USD",
            dec!(60.15),
            0,
            dec!(260000000000),
        ),
        Instrument::seeded(
            "hsba",
            "HSBA",
            "HSBC Holdings plc",
            "LSE",
            "GBP",
            dec!(6.64),
            0,
            dec!(127000000000),
        ),
        Instrument::seeded(
            "bp",
            "BP",
            "BP p.l.c.",
            "LSE",
            "GBP",
            dec!(4.72),
            0,
            dec!(80000000000),
        ),
        Instrument::seeded(
            "shel",
            "SHEL",
            "Shell plc",
            "LSE",
            "GBP",
            dec!(28.35),
            0,
            dec!(185000000000),
        ),
    ]
}

/// Populate the registry from the store, seeding defaults as needed
///
/// The engine must not start ticking until this returns. A store error
/// degrades to seed defaults rather than failing startup; only an empty
/// registry afterward is fatal.
pub async fn load_or_seed(
    store: &dyn QuoteStore,
    registry: &Registry,
) -> Result<BootstrapOutcome, EngineError> {
    let outcome = match store.load_instruments().await {
        Ok(rows) if !rows.is_empty() => {
            let count = rows.len();
            for row in rows {
                registry.insert_new(row).await;
            }
            BootstrapOutcome::Loaded(count)
        }
        Ok(_) => {
            let seeds = seed_instruments();
            let count = seeds.len();
            if let Err(e) = store.apply_flush(&seeds, &[]).await {
                tracing::warn!(error = %e, "Could not persist seed instruments");
            }
            for seed in seeds {
                registry.insert_new(seed).await;
            }
            BootstrapOutcome::Seeded(count)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Store unreachable at bootstrap, using seed defaults");
            let seeds = seed_instruments();
            let count = seeds.len();
            for seed in seeds {
                registry.insert_new(seed).await;
            }
            BootstrapOutcome::Degraded(count)
        }
    };

    if registry.is_empty().await {
        return Err(EngineError::Bootstrap(
            "no instruments available from store or seed defaults".to_string(),
        ));
    }

    Ok(outcome)
}

/// Merge out-of-band additions from the store into the registry
///
/// Existing in-memory instruments keep their live mutated state; only
/// genuinely new ids are added. Returns the number added.
pub async fn reconcile(store: &dyn QuoteStore, registry: &Registry) -> Result<usize, EngineError> {
    let rows = store.load_instruments().await?;
    let mut added = 0;
    for row in rows {
        if registry.insert_new(row).await {
            added += 1;
        }
    }
    if added > 0 {
        tracing::info!(added, "Reconciled new instruments from store");
    }
    Ok(added)
}

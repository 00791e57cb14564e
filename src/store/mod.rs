//! Durable quote storage
//!
//! The engine persists two kinds of rows: latest-quote instrument rows
//! (upserted) and fine-grained tick history (append-only). Both are
//! written by the persistence worker in a single `apply_flush` call so a
//! retried flush never duplicates history or double-counts state.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::instrument::{Instrument, TickPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Durable store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored row could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Store rejected the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Seam between the engine and durable storage
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Load the full instrument set
    async fn load_instruments(&self) -> Result<Vec<Instrument>, StoreError>;

    /// Persist a flush batch as one unit: upsert latest-quote rows and
    /// append new history points
    ///
    /// Upserts reconcile day bounds against the stored row (monotonic
    /// max/min, never a blind overwrite). History points already present
    /// under the same `(instrument_id, timestamp)` key are skipped, so
    /// re-applying a batch is idempotent.
    async fn apply_flush(
        &self,
        deltas: &[Instrument],
        history: &[TickPoint],
    ) -> Result<(), StoreError>;

    /// Read history for one instrument within a time window, oldest first
    async fn history(
        &self,
        instrument_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TickPoint>, StoreError>;
}

/// Merge an incoming quote row with its stored counterpart
///
/// Latest quote and change stats win from the incoming row; day bounds
/// take the monotonic max/min of both. Single-writer assumption: this is
/// conflict resolution against an older generation of ourselves, not
/// against another writer.
pub(crate) fn merge_row(stored: &Instrument, incoming: &Instrument) -> Instrument {
    let mut row = incoming.clone();
    row.day_high = row.day_high.max(stored.day_high);
    row.day_low = row.day_low.min(stored.day_low);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_merge_row_reconciles_day_bounds() {
        let mut stored = Instrument::seeded(
            "aapl",
            "AAPL",
            "Apple Inc.",
            "NASDAQ",
            "USD",
            dec!(100),
            0,
            dec!(1000),
        );
        stored.day_high = dec!(110);
        stored.day_low = dec!(90);

        let mut incoming = stored.clone();
        incoming.last_price = dec!(105);
        incoming.day_high = dec!(106);
        incoming.day_low = dec!(95);

        let merged = merge_row(&stored, &incoming);
        assert_eq!(merged.last_price, dec!(105));
        assert_eq!(merged.day_high, dec!(110));
        assert_eq!(merged.day_low, dec!(90));
    }

    #[test]
    fn test_merge_row_takes_wider_incoming_bounds() {
        let stored = Instrument::seeded(
            "aapl",
            "AAPL",
            "Apple Inc.",
            "NASDAQ",
            "USD",
            dec!(100),
            0,
            dec!(1000),
        );

        let mut incoming = stored.clone();
        incoming.last_price = dec!(120);
        incoming.day_high = dec!(120);
        incoming.day_low = dec!(80);

        let merged = merge_row(&stored, &incoming);
        assert_eq!(merged.day_high, dec!(120));
        assert_eq!(merged.day_low, dec!(80));
    }
}

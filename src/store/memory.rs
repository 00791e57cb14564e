//! In-memory store implementation
//!
//! Used by tests and as the degraded-mode backend when no durable
//! storage is reachable.

use super::{merge_row, QuoteStore, StoreError};
use crate::instrument::{Instrument, TickPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    instruments: HashMap<String, Instrument>,
    // Keyed by (timestamp, instrument_id) so range scans come out
    // time-ordered and duplicate points are naturally rejected.
    history: BTreeMap<(DateTime<Utc>, String), TickPoint>,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored history points (test visibility)
    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    async fn load_instruments(&self) -> Result<Vec<Instrument>, StoreError> {
        let state = self.inner.read().await;
        let mut rows: Vec<Instrument> = state.instruments.values().cloned().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(rows)
    }

    async fn apply_flush(
        &self,
        deltas: &[Instrument],
        history: &[TickPoint],
    ) -> Result<(), StoreError> {
        let mut state = self.inner.write().await;

        for row in deltas {
            let merged = match state.instruments.get(&row.id) {
                Some(stored) => merge_row(stored, row),
                None => row.clone(),
            };
            state.instruments.insert(row.id.clone(), merged);
        }

        for point in history {
            let key = (point.timestamp, point.instrument_id.clone());
            state.history.entry(key).or_insert_with(|| point.clone());
        }

        Ok(())
    }

    async fn history(
        &self,
        instrument_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TickPoint>, StoreError> {
        let state = self.inner.read().await;
        let points = state
            .history
            .range((from, String::new())..)
            .take_while(|((ts, _), _)| *ts <= to)
            .filter(|((_, id), _)| id == instrument_id)
            .map(|(_, p)| p.clone())
            .collect();
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample(id: &str) -> Instrument {
        Instrument::seeded(id, id.to_uppercase(), id, "NASDAQ", "USD", dec!(100), 0, dec!(1000))
    }

    fn point(id: &str, price: rust_decimal::Decimal, ts: DateTime<Utc>) -> TickPoint {
        TickPoint {
            instrument_id: id.to_string(),
            price,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn test_flush_and_load_round_trip() {
        let store = MemoryStore::new();
        let mut row = sample("aapl");
        row.last_price = dec!(101.23);
        row.day_high = dec!(102.00);
        row.day_low = dec!(99.87);

        store.apply_flush(&[row.clone()], &[]).await.unwrap();

        let loaded = store.load_instruments().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].last_price, dec!(101.23));
        assert_eq!(loaded[0].day_high, dec!(102.00));
        assert_eq!(loaded[0].day_low, dec!(99.87));
    }

    #[tokio::test]
    async fn test_repeated_flush_does_not_duplicate_history() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let points = vec![
            point("aapl", dec!(100), now),
            point("aapl", dec!(101), now + Duration::seconds(1)),
        ];

        store.apply_flush(&[], &points).await.unwrap();
        store.apply_flush(&[], &points).await.unwrap();

        assert_eq!(store.history_len().await, 2);
    }

    #[tokio::test]
    async fn test_history_window_is_ordered_and_filtered() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let points = vec![
            point("aapl", dec!(102), now),
            point("aapl", dec!(100), now - Duration::hours(2)),
            point("msft", dec!(400), now - Duration::minutes(30)),
            point("aapl", dec!(101), now - Duration::hours(1)),
        ];
        store.apply_flush(&[], &points).await.unwrap();

        let window = store
            .history("aapl", now - Duration::minutes(90), now)
            .await
            .unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window[0].price, dec!(101));
        assert_eq!(window[1].price, dec!(102));
    }

    #[tokio::test]
    async fn test_upsert_keeps_wider_stored_bounds() {
        let store = MemoryStore::new();
        let mut first = sample("aapl");
        first.day_high = dec!(110);
        first.day_low = dec!(90);
        store.apply_flush(&[first], &[]).await.unwrap();

        let mut second = sample("aapl");
        second.last_price = dec!(105);
        second.day_high = dec!(106);
        second.day_low = dec!(95);
        store.apply_flush(&[second], &[]).await.unwrap();

        let loaded = store.load_instruments().await.unwrap();
        assert_eq!(loaded[0].last_price, dec!(105));
        assert_eq!(loaded[0].day_high, dec!(110));
        assert_eq!(loaded[0].day_low, dec!(90));
    }
}

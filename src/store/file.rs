//! JSON-file store implementation
//!
//! Latest quotes live in `instruments.json` (rewritten atomically via a
//! temp file and rename); tick history is appended to `history.jsonl`,
//! one point per line. A key index of already-written history points is
//! kept in memory so retried flushes never duplicate rows.

use super::{merge_row, QuoteStore, StoreError};
use crate::instrument::{Instrument, TickPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const INSTRUMENTS_FILE: &str = "instruments.json";
const HISTORY_FILE: &str = "history.jsonl";

/// Store backed by JSON files in a data directory
pub struct JsonFileStore {
    dir: PathBuf,
    history_index: Mutex<HashSet<(String, DateTime<Utc>)>>,
}

impl JsonFileStore {
    /// Open (or create) a store rooted at the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut index = HashSet::new();
        let history_path = dir.join(HISTORY_FILE);
        if history_path.exists() {
            let reader = BufReader::new(File::open(&history_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TickPoint>(&line) {
                    Ok(point) => {
                        index.insert((point.instrument_id, point.timestamp));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed history line");
                    }
                }
            }
        }

        Ok(Self {
            dir,
            history_index: Mutex::new(index),
        })
    }

    fn instruments_path(&self) -> PathBuf {
        self.dir.join(INSTRUMENTS_FILE)
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn read_instruments(&self) -> Result<HashMap<String, Instrument>, StoreError> {
        let path = self.instruments_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let rows: Vec<Instrument> = serde_json::from_reader(reader)?;
        Ok(rows.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    fn write_instruments(&self, rows: &HashMap<String, Instrument>) -> Result<(), StoreError> {
        let mut sorted: Vec<&Instrument> = rows.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let tmp = self.dir.join(format!("{INSTRUMENTS_FILE}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &sorted)?;
            writer.flush()?;
        }
        fs::rename(&tmp, self.instruments_path())?;
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for JsonFileStore {
    async fn load_instruments(&self) -> Result<Vec<Instrument>, StoreError> {
        let mut rows: Vec<Instrument> = self.read_instruments()?.into_values().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(rows)
    }

    async fn apply_flush(
        &self,
        deltas: &[Instrument],
        history: &[TickPoint],
    ) -> Result<(), StoreError> {
        if !deltas.is_empty() {
            let mut stored = self.read_instruments()?;
            for row in deltas {
                let merged = match stored.get(&row.id) {
                    Some(existing) => merge_row(existing, row),
                    None => row.clone(),
                };
                stored.insert(row.id.clone(), merged);
            }
            self.write_instruments(&stored)?;
        }

        let mut index = self.history_index.lock().await;
        let fresh: Vec<&TickPoint> = history
            .iter()
            .filter(|p| !index.contains(&(p.instrument_id.clone(), p.timestamp)))
            .collect();

        if !fresh.is_empty() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.history_path())?;
            let mut writer = BufWriter::new(file);
            for point in &fresh {
                serde_json::to_writer(&mut writer, point)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;

            for point in fresh {
                index.insert((point.instrument_id.clone(), point.timestamp));
            }
        }

        Ok(())
    }

    async fn history(
        &self,
        instrument_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TickPoint>, StoreError> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(vec![]);
        }

        let reader = BufReader::new(File::open(path)?);
        let mut points: Vec<TickPoint> = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Ok(point) = serde_json::from_str::<TickPoint>(&line) else {
                continue;
            };
            if point.instrument_id == instrument_id
                && point.timestamp >= from
                && point.timestamp <= to
            {
                points.push(point);
            }
        }
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn sample(id: &str) -> Instrument {
        Instrument::seeded(id, id.to_uppercase(), id, "NASDAQ", "USD", dec!(100), 0, dec!(1000))
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/data");
        let store = JsonFileStore::open(&dir).unwrap();
        assert!(dir.exists());
        assert!(store.load_instruments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_then_load_preserves_prices_exactly() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path()).unwrap();

        let mut row = sample("aapl");
        row.last_price = dec!(178.53);
        row.day_high = dec!(180.00);
        row.day_low = dec!(177.01);
        row.volume = 123_456;
        store.apply_flush(&[row], &[]).await.unwrap();

        let loaded = store.load_instruments().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].last_price, dec!(178.53));
        assert_eq!(loaded[0].day_high, dec!(180.00));
        assert_eq!(loaded[0].day_low, dec!(177.01));
        assert_eq!(loaded[0].volume, 123_456);
    }

    #[tokio::test]
    async fn test_history_append_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path()).unwrap();

        let now = Utc::now();
        let points = vec![
            TickPoint {
                instrument_id: "aapl".to_string(),
                price: dec!(100),
                timestamp: now,
            },
            TickPoint {
                instrument_id: "aapl".to_string(),
                price: dec!(101),
                timestamp: now + Duration::seconds(1),
            },
        ];

        store.apply_flush(&[], &points).await.unwrap();
        store.apply_flush(&[], &points).await.unwrap();

        let window = store
            .history("aapl", now - Duration::seconds(10), now + Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn test_index_rebuilt_on_reopen() {
        let temp = TempDir::new().unwrap();
        let now = Utc::now();
        let points = vec![TickPoint {
            instrument_id: "aapl".to_string(),
            price: dec!(100),
            timestamp: now,
        }];

        {
            let store = JsonFileStore::open(temp.path()).unwrap();
            store.apply_flush(&[], &points).await.unwrap();
        }

        // A new process appending the same point must still dedupe.
        let store = JsonFileStore::open(temp.path()).unwrap();
        store.apply_flush(&[], &points).await.unwrap();

        let window = store
            .history("aapl", now - Duration::seconds(10), now + Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_day_bounds_merge_against_stored_row() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path()).unwrap();

        let mut first = sample("aapl");
        first.day_high = dec!(120);
        first.day_low = dec!(95);
        store.apply_flush(&[first], &[]).await.unwrap();

        let mut second = sample("aapl");
        second.last_price = dec!(110);
        second.day_high = dec!(111);
        second.day_low = dec!(100);
        store.apply_flush(&[second], &[]).await.unwrap();

        let loaded = store.load_instruments().await.unwrap();
        assert_eq!(loaded[0].last_price, dec!(110));
        assert_eq!(loaded[0].day_high, dec!(120));
        assert_eq!(loaded[0].day_low, dec!(95));
    }
}

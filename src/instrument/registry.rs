//! In-memory instrument registry
//!
//! Single-writer discipline: only the price mutator and the bootstrap
//! loader mutate entries. Readers always receive cloned snapshots, never
//! references into the map, so a reader can never observe a
//! partially-applied mutation.

use super::Instrument;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from registry mutations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No instrument with the given id
    #[error("instrument not found: {0}")]
    NotFound(String),
    /// Mutation closure rejected the instrument
    #[error("mutation rejected for {id}: {reason}")]
    Rejected { id: String, reason: String },
}

/// Canonical in-memory state for the instrument universe
#[derive(Debug, Default)]
pub struct Registry {
    instruments: RwLock<HashMap<String, Instrument>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of a single instrument
    pub async fn get(&self, id: &str) -> Option<Instrument> {
        self.instruments.read().await.get(id).cloned()
    }

    /// Get a consistent snapshot of all instruments
    pub async fn get_all(&self) -> Vec<Instrument> {
        let mut all: Vec<Instrument> = self.instruments.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    /// Get snapshots of all instruments listed on the given market
    pub async fn get_by_market(&self, market: &str) -> Vec<Instrument> {
        let mut filtered: Vec<Instrument> = self
            .instruments
            .read()
            .await
            .values()
            .filter(|i| i.market.eq_ignore_ascii_case(market))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        filtered
    }

    /// Ids of all registered instruments
    pub async fn ids(&self) -> Vec<String> {
        self.instruments.read().await.keys().cloned().collect()
    }

    /// Number of registered instruments
    pub async fn len(&self) -> usize {
        self.instruments.read().await.len()
    }

    /// Whether the registry holds no instruments
    pub async fn is_empty(&self) -> bool {
        self.instruments.read().await.is_empty()
    }

    /// Apply an in-place mutation, returning the new snapshot
    ///
    /// The closure runs on a working copy; the entry is replaced only if
    /// the closure succeeds, so a rejected mutation leaves the stored
    /// state untouched.
    pub async fn apply_mutation<F>(&self, id: &str, f: F) -> Result<Instrument, RegistryError>
    where
        F: FnOnce(&mut Instrument) -> Result<(), String>,
    {
        let mut instruments = self.instruments.write().await;
        let entry = instruments
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut working = entry.clone();
        f(&mut working).map_err(|reason| RegistryError::Rejected {
            id: id.to_string(),
            reason,
        })?;

        *entry = working.clone();
        Ok(working)
    }

    /// Insert an instrument only if the id is not already registered
    ///
    /// Bootstrap-only path: a live, already-mutated entry is never
    /// overwritten by durable data. Returns true if inserted.
    pub async fn insert_new(&self, instrument: Instrument) -> bool {
        let mut instruments = self.instruments.write().await;
        if instruments.contains_key(&instrument.id) {
            return false;
        }
        instruments.insert(instrument.id.clone(), instrument);
        true
    }
}

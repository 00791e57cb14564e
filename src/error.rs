//! Engine-level error types

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the engine's query and lifecycle operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Query referenced an instrument the registry does not hold
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),
    /// Durable store operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    /// Engine could not reach a tick-ready state at startup
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),
}

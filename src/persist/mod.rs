//! Write-behind persistence
//!
//! Tick mutations land in in-memory pending buffers and are flushed to
//! the durable store on a slow cycle, so the tick loop never waits on
//! storage. Durable history may lag live state by up to one flush
//! interval; the authoritative last price is re-persisted every cycle.

mod buffers;
mod worker;

pub use buffers::{PendingBatch, PendingBuffers};
pub use worker::FlushWorker;

//! tickfeed: real-time market-data engine for a demo trading platform
//!
//! This library provides the core components for:
//! - An in-memory instrument registry with snapshot reads
//! - A bounded random-walk price mutator driving per-tick updates
//! - Global and scoped subscriber fan-out with at-most-one-tick latency
//! - Write-behind persistence of latest quotes and tick history
//! - Bootstrap from durable storage with seed-default fallback
//! - Range-filtered history queries with synthetic fallback
//! - Full observability stack

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod instrument;
pub mod mutator;
pub mod persist;
pub mod router;
pub mod store;
pub mod telemetry;

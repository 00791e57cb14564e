//! Telemetry module
//!
//! Structured logging and Prometheus metrics for the engine

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::{
    record_dropped_message, record_evicted_points, record_flush_failure, record_flush_success,
    record_tick, set_connected_consumers, set_pending_sizes,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Guard that cleans up telemetry on drop
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level)?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()?;
        tracing::info!(port, "Prometheus exporter listening");
    }

    Ok(TelemetryGuard { _priv: () })
}

//! Prometheus metrics for the tick, flush, and fan-out paths

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one completed tick cycle
pub fn record_tick(instruments: usize, duration: Duration) {
    counter!("tickfeed_ticks_total").increment(1);
    gauge!("tickfeed_tick_batch_size").set(instruments as f64);
    histogram!("tickfeed_tick_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Record a successful flush cycle
pub fn record_flush_success(deltas: usize, points: usize, duration: Duration) {
    counter!("tickfeed_flushes_total").increment(1);
    counter!("tickfeed_flushed_deltas_total").increment(deltas as u64);
    counter!("tickfeed_flushed_points_total").increment(points as u64);
    histogram!("tickfeed_flush_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Record a failed or timed-out flush cycle
pub fn record_flush_failure() {
    counter!("tickfeed_flush_failures_total").increment(1);
}

/// Record history points evicted under sustained flush failure
pub fn record_evicted_points(n: u64) {
    counter!("tickfeed_evicted_points_total").increment(n);
}

/// Update pending buffer size gauges
pub fn set_pending_sizes(deltas: usize, points: usize) {
    gauge!("tickfeed_pending_deltas").set(deltas as f64);
    gauge!("tickfeed_pending_points").set(points as f64);
}

/// Update the connected consumer gauge
pub fn set_connected_consumers(n: usize) {
    gauge!("tickfeed_connected_consumers").set(n as f64);
}

/// Record a fan-out message dropped on a full or closed channel
pub fn record_dropped_message() {
    counter!("tickfeed_dropped_messages_total").increment(1);
}

//! Prometheus metrics

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Count a finished turn by terminal outcome.
pub fn record_turn(outcome: &'static str) {
    counter!("voice_relay_turns_total", "outcome" => outcome).increment(1);
}

/// Track the number of joined voice sessions.
pub fn record_session_count(count: usize) {
    gauge!("voice_relay_sessions").set(count as f64);
}

/// Record a command handler's latency.
pub fn record_command_latency(command: &'static str, millis: f64) {
    histogram!("voice_relay_command_latency_ms", "command" => command).record(millis);
}

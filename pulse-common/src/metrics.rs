use crate::{configs::TelemetryConfig, error::Error};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Counts scheduler ticks, including failed ones
pub const ROUNDS_TOTAL_COUNTER: &str = "collector.rounds_total";
/// Counts rounds whose sample reached the queue
pub const ROUNDS_SUCCEEDED_COUNTER: &str = "collector.rounds_succeeded";
/// Counts rounds that ended with an error
pub const ROUNDS_FAILED_COUNTER: &str = "collector.rounds_failed";
/// Measures duration of a round in nanoseconds
pub const ROUND_TIMER: &str = "collector.round_timer";

/// Counts per-source query failures
pub const SOURCES_FAILED_COUNTER: &str = "sources.failed_count";
/// Counts source start attempts that failed
pub const SOURCES_START_FAILED_COUNTER: &str = "sources.start_failed_count";

/// Observes number of events waiting in the queue
pub const QUEUE_DEPTH: &str = "queue.depth";
/// Counts samples dropped because the queue was full
pub const EVENTS_DROPPED_COUNTER: &str = "queue.dropped_count";

/// Counts handler errors in consumers
pub const CONSUMER_ERRORS_COUNTER: &str = "consumers.error_count";

/// Installs the Prometheus exporter if configured and registers agent metrics.
/// Without an installed recorder the metric macros are no-ops.
/// # Errors
/// Fails if the exporter can't be installed.
pub fn init_counters(telemetry: Option<&TelemetryConfig>) -> Result<(), Error> {
    if let Some(address) = telemetry.and_then(TelemetryConfig::prometheus) {
        PrometheusBuilder::new()
            .listen_address(address)
            .install()
            .map_err(|e| Error::config(format!("can't install prometheus exporter: {}", e)))?;
        info!("prometheus exporter listens on {}", address);
    }
    init_collector();
    init_queue();
    Ok(())
}

fn init_collector() {
    register_counter!(ROUNDS_TOTAL_COUNTER);
    register_counter!(ROUNDS_SUCCEEDED_COUNTER);
    register_counter!(ROUNDS_FAILED_COUNTER);
    register_histogram!(ROUND_TIMER);
    register_counter!(SOURCES_FAILED_COUNTER);
    register_counter!(SOURCES_START_FAILED_COUNTER);
}

fn init_queue() {
    register_gauge!(QUEUE_DEPTH);
    register_counter!(EVENTS_DROPPED_COUNTER);
    register_counter!(CONSUMER_ERRORS_COUNTER);
}

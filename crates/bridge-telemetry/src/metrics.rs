//! Prometheus metrics for the SNS bridge.
//!
//! All metrics follow the naming convention: `sns_bridge_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PIPELINE METRICS
    // =========================================================================

    /// Messages dequeued from the queue
    pub static ref MESSAGES_RECEIVED: Counter = Counter::new(
        "sns_bridge_messages_received_total",
        "Total number of messages received from the queue"
    ).expect("metric creation failed");

    /// Dequeued messages by what happened to them
    pub static ref MESSAGES_HANDLED: CounterVec = CounterVec::new(
        Opts::new("sns_bridge_messages_handled_total", "Messages by disposition"),
        &["disposition"]  // delivered, duplicate, failed_verification, malformed
    ).expect("metric creation failed");

    /// Downstream rejections
    pub static ref DELIVERY_FAILURES: Counter = Counter::new(
        "sns_bridge_delivery_failures_total",
        "Total number of messages rejected by the downstream"
    ).expect("metric creation failed");

    /// Failed queue deletes
    pub static ref ACK_FAILURES: Counter = Counter::new(
        "sns_bridge_ack_failures_total",
        "Total number of messages that could not be deleted from the queue"
    ).expect("metric creation failed");

    /// Poll ticks that ended in an error
    pub static ref POLL_ERRORS: CounterVec = CounterVec::new(
        Opts::new("sns_bridge_poll_errors_total", "Poll ticks that failed"),
        &["kind"]  // receive, delivery
    ).expect("metric creation failed");

    /// Poll ticks that found the queue empty
    pub static ref EMPTY_POLLS: Counter = Counter::new(
        "sns_bridge_empty_polls_total",
        "Total number of polls that returned no message"
    ).expect("metric creation failed");

    // =========================================================================
    // LIFECYCLE METRICS
    // =========================================================================

    /// Consumers currently polling
    pub static ref CONSUMERS_RUNNING: Gauge = Gauge::new(
        "sns_bridge_consumers_running",
        "Number of consumers currently polling"
    ).expect("metric creation failed");
}

/// Proof that the bridge metrics are registered in [`REGISTRY`].
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    registered: usize,
}

impl MetricsHandle {
    /// Number of collectors registered by this call.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Register every bridge metric with the global registry.
///
/// Registering twice is harmless: collectors already present are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Pipeline
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(MESSAGES_HANDLED.clone()),
        Box::new(DELIVERY_FAILURES.clone()),
        Box::new(ACK_FAILURES.clone()),
        Box::new(POLL_ERRORS.clone()),
        Box::new(EMPTY_POLLS.clone()),
        // Lifecycle
        Box::new(CONSUMERS_RUNNING.clone()),
    ];

    let mut registered = 0;
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) => registered += 1,
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        register_metrics().unwrap();
        let second = register_metrics().unwrap();
        assert_eq!(second.registered(), 0);
    }

    #[test]
    fn test_counter_increment() {
        MESSAGES_RECEIVED.inc();
        assert!(MESSAGES_RECEIVED.get() >= 1.0);
    }

    #[test]
    fn test_disposition_labels() {
        MESSAGES_HANDLED.with_label_values(&["duplicate"]).inc();
        assert!(MESSAGES_HANDLED.with_label_values(&["duplicate"]).get() >= 1.0);
    }

    #[test]
    fn test_encode_contains_registered_metrics() {
        register_metrics().unwrap();
        ACK_FAILURES.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("sns_bridge_ack_failures_total"));
    }
}

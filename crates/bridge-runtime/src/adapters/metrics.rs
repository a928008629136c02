//! Pipeline observer backed by the bridge's Prometheus counters.

use bridge_telemetry::{
    ACK_FAILURES, DELIVERY_FAILURES, EMPTY_POLLS, MESSAGES_HANDLED, MESSAGES_RECEIVED, POLL_ERRORS,
};
use sns_bridge::{PipelineObserver, PollError, PollOutcome};

/// Label values for `sns_bridge_poll_errors_total`.
fn error_kind(error: &PollError) -> &'static str {
    match error {
        PollError::Receive(_) => "receive",
        PollError::Delivery { .. } => "delivery",
    }
}

/// Counts every poll tick.
///
/// A downstream rejection still dequeued a message, so it counts as received
/// and (when the delete succeeded) acknowledged, on top of the error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusObserver;

impl PrometheusObserver {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineObserver for PrometheusObserver {
    fn on_poll(&self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Empty => EMPTY_POLLS.inc(),
            PollOutcome::Handled {
                disposition,
                acknowledged,
                ..
            } => {
                MESSAGES_RECEIVED.inc();
                MESSAGES_HANDLED
                    .with_label_values(&[disposition.as_str()])
                    .inc();
                if !acknowledged {
                    ACK_FAILURES.inc();
                }
            }
        }
    }

    fn on_poll_error(&self, error: &PollError) {
        POLL_ERRORS.with_label_values(&[error_kind(error)]).inc();
        if let PollError::Delivery { acknowledged, .. } = error {
            MESSAGES_RECEIVED.inc();
            DELIVERY_FAILURES.inc();
            if !acknowledged {
                ACK_FAILURES.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sns_bridge::{DeliveryError, Disposition, RemoteError};

    // Counters are process-global; assert on deltas.

    #[test]
    fn test_handled_outcome_counts_disposition() {
        let observer = PrometheusObserver::new();
        let received = MESSAGES_RECEIVED.get();
        let duplicates = MESSAGES_HANDLED.with_label_values(&["duplicate"]).get();

        observer.on_poll(&PollOutcome::Handled {
            message_id: "m-1".to_string(),
            disposition: Disposition::Duplicate,
            acknowledged: true,
        });

        assert!(MESSAGES_RECEIVED.get() >= received + 1.0);
        assert!(MESSAGES_HANDLED.with_label_values(&["duplicate"]).get() >= duplicates + 1.0);
    }

    #[test]
    fn test_unacknowledged_message_counts_ack_failure() {
        let observer = PrometheusObserver::new();
        let before = ACK_FAILURES.get();
        observer.on_poll(&PollOutcome::Handled {
            message_id: "m-2".to_string(),
            disposition: Disposition::Delivered,
            acknowledged: false,
        });
        assert!(ACK_FAILURES.get() >= before + 1.0);
    }

    #[test]
    fn test_empty_poll() {
        let before = EMPTY_POLLS.get();
        PrometheusObserver::new().on_poll(&PollOutcome::Empty);
        assert!(EMPTY_POLLS.get() >= before + 1.0);
    }

    #[test]
    fn test_errors_are_labelled_by_kind() {
        let observer = PrometheusObserver::new();
        let receive = POLL_ERRORS.with_label_values(&["receive"]).get();
        let delivery = POLL_ERRORS.with_label_values(&["delivery"]).get();
        let failures = DELIVERY_FAILURES.get();

        observer.on_poll_error(&PollError::Receive(RemoteError::service(
            "ReceiveMessage",
            "throttled",
        )));
        observer.on_poll_error(&PollError::Delivery {
            message_id: "m-3".to_string(),
            acknowledged: true,
            source: DeliveryError::Rejected("full".to_string()),
        });

        assert!(POLL_ERRORS.with_label_values(&["receive"]).get() >= receive + 1.0);
        assert!(POLL_ERRORS.with_label_values(&["delivery"]).get() >= delivery + 1.0);
        assert!(DELIVERY_FAILURES.get() >= failures + 1.0);
    }
}

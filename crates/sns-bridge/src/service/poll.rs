//! # Delivery Pipeline
//!
//! One poll tick: receive → decode → verify → dedupe → deliver → acknowledge.
//!
//! ## Acknowledgement rules
//!
//! Every dequeued message is deleted from the queue, whatever happened to it:
//! malformed, failed verification, duplicate, delivered, or rejected by the
//! downstream. A failed delete is logged and left to the queue's own
//! visibility timeout. There is no dead-letter path.

use crate::domain::entities::{DeliveredMessage, Disposition, PollOutcome};
use crate::domain::envelope::NotificationEnvelope;
use crate::domain::errors::{DeliveryError, PollError};
use crate::domain::idempotency::IdempotencyCache;
use crate::ports::outbound::{Downstream, QueueService};
use crate::service::verifier::SignatureVerifier;
use std::sync::Arc;
use tracing::{debug, warn};

/// State owned by one consumer's poll loop.
pub struct PollContext {
    queues: Arc<dyn QueueService>,
    queue_url: String,
    verifier: Option<SignatureVerifier>,
    cache: Option<IdempotencyCache>,
    downstream: Arc<dyn Downstream>,
}

impl PollContext {
    /// Pipeline with verification and dedupe disabled.
    pub fn new(
        queues: Arc<dyn QueueService>,
        queue_url: impl Into<String>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            queues,
            queue_url: queue_url.into(),
            verifier: None,
            cache: None,
            downstream,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn with_idempotency(mut self, cache: IdempotencyCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// `PollError::Receive` if the receive call fails (nothing was dequeued);
    /// `PollError::Delivery` if the downstream rejected the message (it was
    /// still acknowledged when `acknowledged` is set).
    pub async fn poll_once(&mut self) -> Result<PollOutcome, PollError> {
        let received = self
            .queues
            .receive_message(&self.queue_url)
            .await
            .map_err(PollError::Receive)?;
        let Some(received) = received else {
            return Ok(PollOutcome::Empty);
        };

        let (message_id, disposition, delivery) = self.process(&received.body).await;
        let acknowledged = self.acknowledge(&received.receipt_handle, &message_id).await;

        match delivery {
            Ok(()) => Ok(PollOutcome::Handled {
                message_id,
                disposition,
                acknowledged,
            }),
            Err(source) => Err(PollError::Delivery {
                message_id,
                acknowledged,
                source,
            }),
        }
    }

    async fn process(&mut self, body: &str) -> (String, Disposition, Result<(), DeliveryError>) {
        let envelope = match NotificationEnvelope::from_json(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(queue_url = %self.queue_url, error = %e, "Discarding malformed notification");
                return (String::new(), Disposition::Malformed, Ok(()));
            }
        };
        let message_id = envelope.message_id().to_string();

        if let Some(verifier) = &self.verifier {
            if !verifier.verify(&envelope).await {
                warn!(message_id = %message_id, "Discarding notification with invalid signature");
                return (message_id, Disposition::FailedVerification, Ok(()));
            }
        }

        if let Some(cache) = &mut self.cache {
            if cache.already_processed(&message_id) {
                debug!(message_id = %message_id, "Skipping duplicate notification");
                return (message_id, Disposition::Duplicate, Ok(()));
            }
        }

        let delivery = self
            .downstream
            .deliver(DeliveredMessage::from_envelope(&envelope))
            .await;
        if delivery.is_ok() {
            debug!(message_id = %message_id, "Notification delivered");
        }
        (message_id, Disposition::Delivered, delivery)
    }

    async fn acknowledge(&self, receipt_handle: &str, message_id: &str) -> bool {
        match self.queues.delete_message(&self.queue_url, receipt_handle).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    queue_url = %self.queue_url,
                    message_id = %message_id,
                    error = %e,
                    "Failed to delete message; it will be redelivered"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::certificate::StaticKeySource;
    use crate::adapters::downstream::ChannelDownstream;
    use crate::adapters::memory::{operations, InMemoryCloud};
    use crate::domain::entities::HeaderField;
    use crate::ports::outbound::{NotificationService, QUEUE_PROTOCOL};
    use async_trait::async_trait;
    use rsa::RsaPrivateKey;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Rejecting;

    #[async_trait]
    impl Downstream for Rejecting {
        async fn deliver(&self, _message: DeliveredMessage) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected("boom".to_string()))
        }
    }

    async fn wired(cloud: &InMemoryCloud) -> (String, String) {
        let topic = cloud.create_topic("t").await.unwrap();
        let url = cloud.create_queue("q").await.unwrap();
        let arn = cloud.queue_arn(&url).await.unwrap();
        cloud.subscribe(&topic, QUEUE_PROTOCOL, &arn).await.unwrap();
        (topic, url)
    }

    async fn setup() -> (
        Arc<InMemoryCloud>,
        String,
        String,
        PollContext,
        UnboundedReceiver<DeliveredMessage>,
    ) {
        let cloud = Arc::new(InMemoryCloud::new());
        let (topic, url) = wired(&cloud).await;
        let (downstream, rx) = ChannelDownstream::new();
        let context = PollContext::new(cloud.clone(), url.clone(), Arc::new(downstream));
        (cloud, topic, url, context, rx)
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (_cloud, _topic, _url, mut context, _rx) = setup().await;
        assert_eq!(context.poll_once().await.unwrap(), PollOutcome::Empty);
    }

    #[tokio::test]
    async fn test_delivers_and_acknowledges() {
        let (cloud, topic, url, mut context, mut rx) = setup().await;
        let id = cloud.publish(&topic, "hello", Some("greeting")).await.unwrap();

        let outcome = context.poll_once().await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Handled {
                message_id: id.clone(),
                disposition: Disposition::Delivered,
                acknowledged: true,
            }
        );

        let delivered = rx.try_recv().unwrap();
        assert_eq!(delivered.body, "hello");
        assert_eq!(delivered.header(HeaderField::MessageId), id);
        assert_eq!(delivered.header(HeaderField::Subject), "greeting");
        assert_eq!(delivered.header(HeaderField::TopicArn), topic);
        assert_eq!(cloud.in_flight_count(&url), 0);
    }

    #[tokio::test]
    async fn test_duplicate_is_skipped_but_deleted() {
        let (cloud, topic, url, context, mut rx) = setup().await;
        let mut context = context.with_idempotency(IdempotencyCache::new());
        let id = cloud.publish(&topic, "m", None).await.unwrap();

        context.poll_once().await.unwrap();
        cloud.redeliver(&url, &id).unwrap();
        let outcome = context.poll_once().await.unwrap();

        assert!(matches!(
            outcome,
            PollOutcome::Handled {
                disposition: Disposition::Duplicate,
                acknowledged: true,
                ..
            }
        ));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(cloud.in_flight_count(&url), 0);
    }

    #[tokio::test]
    async fn test_without_idempotency_redelivery_is_delivered_again() {
        let (cloud, topic, url, mut context, mut rx) = setup().await;
        let id = cloud.publish(&topic, "m", None).await.unwrap();
        cloud.redeliver(&url, &id).unwrap();

        context.poll_once().await.unwrap();
        context.poll_once().await.unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_body_is_discarded_and_deleted() {
        let (cloud, _topic, url, mut context, mut rx) = setup().await;
        cloud.send_raw(&url, "this is not json").unwrap();

        let outcome = context.poll_once().await.unwrap();
        assert!(matches!(
            outcome,
            PollOutcome::Handled {
                disposition: Disposition::Malformed,
                acknowledged: true,
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(cloud.in_flight_count(&url), 0);
    }

    #[tokio::test]
    async fn test_unverified_message_is_discarded_and_deleted() {
        let (cloud, topic, url, context, mut rx) = setup().await;
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let verifier = SignatureVerifier::new(Arc::new(StaticKeySource::new(key.to_public_key())));
        let mut context = context.with_verifier(verifier);

        // This cloud does not sign, so the signature is empty.
        cloud.publish(&topic, "m", None).await.unwrap();
        let outcome = context.poll_once().await.unwrap();

        assert!(matches!(
            outcome,
            PollOutcome::Handled {
                disposition: Disposition::FailedVerification,
                acknowledged: true,
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(cloud.in_flight_count(&url), 0);
    }

    #[tokio::test]
    async fn test_downstream_error_still_acknowledges() {
        let cloud = Arc::new(InMemoryCloud::new());
        let (topic, url) = wired(&cloud).await;
        let mut context = PollContext::new(cloud.clone(), url.clone(), Arc::new(Rejecting));
        let id = cloud.publish(&topic, "m", None).await.unwrap();

        let err = context.poll_once().await.unwrap_err();
        assert_eq!(
            err,
            PollError::Delivery {
                message_id: id,
                acknowledged: true,
                source: DeliveryError::Rejected("boom".to_string()),
            }
        );
        assert_eq!(cloud.in_flight_count(&url), 0);
    }

    #[tokio::test]
    async fn test_receive_error_surfaces() {
        let (cloud, _topic, _url, mut context, _rx) = setup().await;
        cloud.fail_operation(operations::RECEIVE_MESSAGE, "throttled");
        assert!(matches!(context.poll_once().await, Err(PollError::Receive(_))));
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported_not_raised() {
        let (cloud, topic, url, mut context, mut rx) = setup().await;
        cloud.publish(&topic, "m", None).await.unwrap();
        cloud.fail_operation(operations::DELETE_MESSAGE, "network");

        let outcome = context.poll_once().await.unwrap();
        assert!(matches!(
            outcome,
            PollOutcome::Handled {
                disposition: Disposition::Delivered,
                acknowledged: false,
                ..
            }
        ));
        assert!(rx.try_recv().is_ok());
        assert_eq!(cloud.in_flight_count(&url), 1);
    }
}

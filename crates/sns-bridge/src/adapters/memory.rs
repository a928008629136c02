//! # In-Memory Cloud
//!
//! A process-local notification service and queue service, implementing both
//! outbound ports over one shared state. Used by the test suites and for
//! running the bridge without a network.
//!
//! ## Behaviour
//!
//! - Topics and queues are addressed exactly like the hosted services:
//!   `arn:aws:sns:us-east-1:000000000000:<name>`,
//!   `https://queue.amazonaws.com/000000000000/<name>`
//! - Publishing fans a JSON envelope out to every queue subscribed with the
//!   `sqs` protocol, signed when a signing key is configured
//! - Receiving moves a message in flight under a fresh receipt handle;
//!   deleting it with that handle acknowledges it
//! - Every call is logged, and any operation can be made to fail

use crate::domain::entities::ReceivedMessage;
use crate::domain::envelope::NotificationEnvelope;
use crate::domain::errors::RemoteError;
use crate::ports::outbound::{NotificationService, QueueService, QUEUE_PROTOCOL};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// Account id used in every generated ARN and URL.
pub const ACCOUNT_ID: &str = "000000000000";

/// Region used in every generated ARN.
pub const REGION: &str = "us-east-1";

/// Messages per queue kept for [`InMemoryCloud::redeliver`]; older ones are
/// forgotten.
pub const REDELIVERY_HISTORY: usize = 1000;

/// Operation names, as logged and as used for failure injection.
pub mod operations {
    pub const CREATE_TOPIC: &str = "CreateTopic";
    pub const DELETE_TOPIC: &str = "DeleteTopic";
    pub const SUBSCRIBE: &str = "Subscribe";
    pub const UNSUBSCRIBE: &str = "Unsubscribe";
    pub const PUBLISH: &str = "Publish";
    pub const CREATE_QUEUE: &str = "CreateQueue";
    pub const DELETE_QUEUE: &str = "DeleteQueue";
    pub const GET_QUEUE_ATTRIBUTES: &str = "GetQueueAttributes";
    pub const SET_QUEUE_ATTRIBUTES: &str = "SetQueueAttributes";
    pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
    pub const DELETE_MESSAGE: &str = "DeleteMessage";
}

use operations::*;

/// Sign an envelope in place of its current signature.
///
/// SHA-1 over the canonical string, PKCS#1 v1.5 RSA, base64 encoded.
///
/// # Errors
///
/// Returns the RSA error if the key is too small for the digest.
pub fn sign_envelope(
    envelope: NotificationEnvelope,
    key: &RsaPrivateKey,
) -> Result<NotificationEnvelope, rsa::Error> {
    let digest = Sha1::digest(envelope.canonical_bytes());
    let signature = key.sign(Pkcs1v15Sign::new::<Sha1>(), &digest)?;
    Ok(envelope.with_signature(STANDARD.encode(signature)))
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
}

#[derive(Debug)]
struct Subscription {
    topic_arn: String,
    protocol: String,
    endpoint: String,
}

#[derive(Debug)]
struct Queue {
    arn: String,
    policy: Option<String>,
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
    /// Most recently enqueued messages, for redelivery.
    history: VecDeque<StoredMessage>,
}

impl Queue {
    fn enqueue(&mut self, message: StoredMessage) {
        if self.history.len() == REDELIVERY_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(message.clone());
        self.visible.push_back(message);
    }
}

#[derive(Debug, Default)]
struct CloudState {
    /// Topic ARN -> topic name.
    topics: HashMap<String, String>,
    /// Subscription ARN -> subscription.
    subscriptions: HashMap<String, Subscription>,
    /// Queue URL -> queue.
    queues: HashMap<String, Queue>,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, String>,
}

impl CloudState {
    /// Log the call and apply any injected failure.
    fn enter(&mut self, operation: &'static str) -> Result<(), RemoteError> {
        self.calls.push(operation);
        match self.failures.get(operation) {
            Some(message) => Err(RemoteError::service(operation, message.clone())),
            None => Ok(()),
        }
    }

    fn queue_mut(
        &mut self,
        operation: &'static str,
        queue_url: &str,
    ) -> Result<&mut Queue, RemoteError> {
        self.queues
            .get_mut(queue_url)
            .ok_or_else(|| RemoteError::NotFound {
                operation,
                resource: queue_url.to_string(),
            })
    }

    fn queue_url_by_arn(&self, queue_arn: &str) -> Option<String> {
        self.queues
            .iter()
            .find(|(_, queue)| queue.arn == queue_arn)
            .map(|(url, _)| url.clone())
    }
}

// =============================================================================
// InMemoryCloud
// =============================================================================

/// In-memory notification and queue services.
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
    signing_key: Option<RsaPrivateKey>,
}

impl InMemoryCloud {
    /// Cloud that publishes unsigned envelopes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState::default()),
            signing_key: None,
        }
    }

    /// Cloud that signs every published envelope with `key`.
    #[must_use]
    pub fn with_signing_key(key: RsaPrivateKey) -> Self {
        Self {
            state: Mutex::new(CloudState::default()),
            signing_key: Some(key),
        }
    }

    /// Public half of the signing key, if any.
    #[must_use]
    pub fn verifying_key(&self) -> Option<RsaPublicKey> {
        self.signing_key.as_ref().map(RsaPublicKey::from)
    }

    #[must_use]
    pub fn topic_arn(name: &str) -> String {
        format!("arn:aws:sns:{REGION}:{ACCOUNT_ID}:{name}")
    }

    #[must_use]
    pub fn queue_arn_for(name: &str) -> String {
        format!("arn:aws:sqs:{REGION}:{ACCOUNT_ID}:{name}")
    }

    #[must_use]
    pub fn queue_url(name: &str) -> String {
        format!("https://queue.amazonaws.com/{ACCOUNT_ID}/{name}")
    }

    // =========================================================================
    // Failure injection and call log
    // =========================================================================

    /// Make every future call of `operation` fail with `message`.
    pub fn fail_operation(&self, operation: &'static str, message: impl Into<String>) {
        self.state.lock().failures.insert(operation, message.into());
    }

    /// Undo [`fail_operation`](Self::fail_operation).
    pub fn clear_failure(&self, operation: &'static str) {
        self.state.lock().failures.remove(operation);
    }

    /// Operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// How many times `operation` was called.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    #[must_use]
    pub fn topic_exists(&self, topic_arn: &str) -> bool {
        self.state.lock().topics.contains_key(topic_arn)
    }

    #[must_use]
    pub fn queue_exists(&self, queue_url: &str) -> bool {
        self.state.lock().queues.contains_key(queue_url)
    }

    /// Policy attached to a queue.
    #[must_use]
    pub fn queue_policy(&self, queue_url: &str) -> Option<String> {
        self.state
            .lock()
            .queues
            .get(queue_url)
            .and_then(|queue| queue.policy.clone())
    }

    /// Endpoints subscribed to a topic.
    #[must_use]
    pub fn subscribed_endpoints(&self, topic_arn: &str) -> Vec<String> {
        self.state
            .lock()
            .subscriptions
            .values()
            .filter(|sub| sub.topic_arn == topic_arn)
            .map(|sub| sub.endpoint.clone())
            .collect()
    }

    /// Messages waiting to be received.
    #[must_use]
    pub fn pending_count(&self, queue_url: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue_url)
            .map_or(0, |queue| queue.visible.len())
    }

    /// Messages received but not yet deleted.
    #[must_use]
    pub fn in_flight_count(&self, queue_url: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue_url)
            .map_or(0, |queue| queue.in_flight.len())
    }

    // =========================================================================
    // Queue-side helpers
    // =========================================================================

    /// Put a raw body straight onto a queue, bypassing any topic.
    ///
    /// # Errors
    ///
    /// `RemoteError::NotFound` if the queue does not exist.
    pub fn send_raw(&self, queue_url: &str, body: impl Into<String>) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        let queue = state.queue_mut("SendMessage", queue_url)?;
        let message = StoredMessage {
            message_id: Uuid::new_v4().to_string(),
            body: body.into(),
        };
        queue.enqueue(message);
        Ok(())
    }

    /// Deliver an already-seen message again, as the queue service does
    /// when it cannot be sure a delivery was acknowledged.
    ///
    /// # Errors
    ///
    /// `RemoteError::NotFound` if the queue or message id is unknown.
    pub fn redeliver(&self, queue_url: &str, message_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        let queue = state.queue_mut("Redeliver", queue_url)?;
        let message = queue
            .history
            .iter()
            .find(|m| m.message_id == message_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                operation: "Redeliver",
                resource: message_id.to_string(),
            })?;
        queue.visible.push_back(message);
        Ok(())
    }

    fn build_envelope(
        &self,
        topic_arn: &str,
        subscription_arn: &str,
        message_id: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<NotificationEnvelope, RemoteError> {
        let envelope = NotificationEnvelope::default()
            .with_message_id(message_id)
            .with_timestamp(
                chrono::Utc::now()
                    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    .to_string(),
            )
            .with_topic_arn(topic_arn)
            .with_type("Notification")
            .with_unsubscribe_url(format!(
                "https://sns.{REGION}.amazonaws.com/?Action=Unsubscribe&SubscriptionArn={subscription_arn}"
            ))
            .with_message(message)
            .with_subject(subject.map(str::to_string))
            .with_signature_version("1");

        match &self.signing_key {
            Some(key) => sign_envelope(envelope, key)
                .map_err(|e| RemoteError::service(PUBLISH, format!("signing failed: {e}"))),
            None => Ok(envelope),
        }
    }
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationService for InMemoryCloud {
    async fn create_topic(&self, name: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(CREATE_TOPIC)?;
        let arn = Self::topic_arn(name);
        state.topics.insert(arn.clone(), name.to_string());
        debug!(topic_arn = %arn, "Topic created");
        Ok(arn)
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(DELETE_TOPIC)?;
        if state.topics.remove(topic_arn).is_none() {
            return Err(RemoteError::NotFound {
                operation: DELETE_TOPIC,
                resource: topic_arn.to_string(),
            });
        }
        state.subscriptions.retain(|_, sub| sub.topic_arn != topic_arn);
        debug!(topic_arn = %topic_arn, "Topic deleted");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(SUBSCRIBE)?;
        if !state.topics.contains_key(topic_arn) {
            return Err(RemoteError::NotFound {
                operation: SUBSCRIBE,
                resource: topic_arn.to_string(),
            });
        }
        let subscription_arn = format!("{topic_arn}:{}", Uuid::new_v4());
        state.subscriptions.insert(
            subscription_arn.clone(),
            Subscription {
                topic_arn: topic_arn.to_string(),
                protocol: protocol.to_string(),
                endpoint: endpoint.to_string(),
            },
        );
        debug!(subscription_arn = %subscription_arn, endpoint = %endpoint, "Subscribed");
        Ok(subscription_arn)
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(UNSUBSCRIBE)?;
        state
            .subscriptions
            .remove(subscription_arn)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound {
                operation: UNSUBSCRIBE,
                resource: subscription_arn.to_string(),
            })
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(PUBLISH)?;
        if !state.topics.contains_key(topic_arn) {
            return Err(RemoteError::NotFound {
                operation: PUBLISH,
                resource: topic_arn.to_string(),
            });
        }

        let message_id = Uuid::new_v4().to_string();
        let targets: Vec<(String, String)> = state
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.topic_arn == topic_arn && sub.protocol == QUEUE_PROTOCOL)
            .filter_map(|(sub_arn, sub)| {
                state
                    .queue_url_by_arn(&sub.endpoint)
                    .map(|url| (sub_arn.clone(), url))
            })
            .collect();

        for (subscription_arn, queue_url) in &targets {
            let envelope =
                self.build_envelope(topic_arn, subscription_arn, &message_id, message, subject)?;
            let stored = StoredMessage {
                message_id: message_id.clone(),
                body: envelope.to_json(),
            };
            if let Some(queue) = state.queues.get_mut(queue_url) {
                queue.enqueue(stored);
            }
        }

        debug!(
            topic_arn = %topic_arn,
            message_id = %message_id,
            queues = targets.len(),
            "Notification published"
        );
        Ok(message_id)
    }
}

#[async_trait]
impl QueueService for InMemoryCloud {
    async fn create_queue(&self, name: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(CREATE_QUEUE)?;
        let url = Self::queue_url(name);
        state.queues.entry(url.clone()).or_insert_with(|| Queue {
            arn: Self::queue_arn_for(name),
            policy: None,
            visible: VecDeque::new(),
            in_flight: HashMap::new(),
            history: VecDeque::new(),
        });
        debug!(queue_url = %url, "Queue created");
        Ok(url)
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(DELETE_QUEUE)?;
        state
            .queues
            .remove(queue_url)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound {
                operation: DELETE_QUEUE,
                resource: queue_url.to_string(),
            })
    }

    async fn queue_arn(&self, queue_url: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.enter(GET_QUEUE_ATTRIBUTES)?;
        Ok(state.queue_mut(GET_QUEUE_ATTRIBUTES, queue_url)?.arn.clone())
    }

    async fn set_policy(&self, queue_url: &str, policy: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(SET_QUEUE_ATTRIBUTES)?;
        state.queue_mut(SET_QUEUE_ATTRIBUTES, queue_url)?.policy = Some(policy.to_string());
        Ok(())
    }

    async fn receive_message(
        &self,
        queue_url: &str,
    ) -> Result<Option<ReceivedMessage>, RemoteError> {
        let mut state = self.state.lock();
        state.enter(RECEIVE_MESSAGE)?;
        let queue = state.queue_mut(RECEIVE_MESSAGE, queue_url)?;
        let Some(message) = queue.visible.pop_front() else {
            return Ok(None);
        };
        let receipt_handle = Uuid::new_v4().to_string();
        let body = message.body.clone();
        queue.in_flight.insert(receipt_handle.clone(), message);
        Ok(Some(ReceivedMessage {
            body,
            receipt_handle,
        }))
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.enter(DELETE_MESSAGE)?;
        let queue = state.queue_mut(DELETE_MESSAGE, queue_url)?;
        queue
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound {
                operation: DELETE_MESSAGE,
                resource: receipt_handle.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wired(cloud: &InMemoryCloud) -> (String, String) {
        let topic = cloud.create_topic("orders").await.unwrap();
        let queue_url = cloud.create_queue("orders-q").await.unwrap();
        let queue_arn = cloud.queue_arn(&queue_url).await.unwrap();
        cloud.subscribe(&topic, QUEUE_PROTOCOL, &queue_arn).await.unwrap();
        (topic, queue_url)
    }

    #[tokio::test]
    async fn test_identities_follow_hosted_format() {
        let cloud = InMemoryCloud::new();
        let topic = cloud.create_topic("orders").await.unwrap();
        let url = cloud.create_queue("orders-q").await.unwrap();
        assert_eq!(topic, "arn:aws:sns:us-east-1:000000000000:orders");
        assert_eq!(url, "https://queue.amazonaws.com/000000000000/orders-q");
        assert_eq!(
            cloud.queue_arn(&url).await.unwrap(),
            "arn:aws:sqs:us-east-1:000000000000:orders-q"
        );
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let cloud = InMemoryCloud::new();
        let first = cloud.create_topic("t").await.unwrap();
        let second = cloud.create_topic("t").await.unwrap();
        assert_eq!(first, second);

        let url = cloud.create_queue("q").await.unwrap();
        cloud.set_policy(&url, "p").await.unwrap();
        cloud.create_queue("q").await.unwrap();
        assert_eq!(cloud.queue_policy(&url).as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn test_publish_fans_out_envelope() {
        let cloud = InMemoryCloud::new();
        let (topic, queue_url) = wired(&cloud).await;

        let id = cloud.publish(&topic, "hello", Some("greeting")).await.unwrap();
        assert_eq!(cloud.pending_count(&queue_url), 1);

        let received = cloud.receive_message(&queue_url).await.unwrap().unwrap();
        let envelope = NotificationEnvelope::from_json(&received.body).unwrap();
        assert_eq!(envelope.message_id(), id);
        assert_eq!(envelope.message(), "hello");
        assert_eq!(envelope.subject(), Some("greeting"));
        assert_eq!(envelope.topic_arn(), topic);
        assert_eq!(envelope.message_type(), "Notification");
        assert!(envelope.signature().is_empty());
    }

    #[tokio::test]
    async fn test_receive_then_delete_acknowledges() {
        let cloud = InMemoryCloud::new();
        let (topic, queue_url) = wired(&cloud).await;
        cloud.publish(&topic, "m", None).await.unwrap();

        let received = cloud.receive_message(&queue_url).await.unwrap().unwrap();
        assert_eq!(cloud.pending_count(&queue_url), 0);
        assert_eq!(cloud.in_flight_count(&queue_url), 1);

        cloud
            .delete_message(&queue_url, &received.receipt_handle)
            .await
            .unwrap();
        assert_eq!(cloud.in_flight_count(&queue_url), 0);
        assert!(cloud.receive_message(&queue_url).await.unwrap().is_none());

        let again = cloud.delete_message(&queue_url, &received.receipt_handle).await;
        assert!(matches!(again, Err(RemoteError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_redeliver_repeats_message_id() {
        let cloud = InMemoryCloud::new();
        let (topic, queue_url) = wired(&cloud).await;
        let id = cloud.publish(&topic, "m", None).await.unwrap();

        cloud.redeliver(&queue_url, &id).unwrap();
        let first = cloud.receive_message(&queue_url).await.unwrap().unwrap();
        let second = cloud.receive_message(&queue_url).await.unwrap().unwrap();
        assert_eq!(first.body, second.body);
        assert_ne!(first.receipt_handle, second.receipt_handle);
    }

    #[tokio::test]
    async fn test_redelivery_history_is_bounded() {
        let cloud = InMemoryCloud::new();
        let (topic, queue_url) = wired(&cloud).await;

        let first = cloud.publish(&topic, "m-0", None).await.unwrap();
        let mut last = first.clone();
        for i in 1..=REDELIVERY_HISTORY {
            last = cloud.publish(&topic, &format!("m-{i}"), None).await.unwrap();
        }

        assert_eq!(
            cloud.state.lock().queues[&queue_url].history.len(),
            REDELIVERY_HISTORY
        );
        assert!(matches!(
            cloud.redeliver(&queue_url, &first),
            Err(RemoteError::NotFound { .. })
        ));
        assert!(cloud.redeliver(&queue_url, &last).is_ok());
    }

    #[tokio::test]
    async fn test_delete_topic_drops_subscriptions() {
        let cloud = InMemoryCloud::new();
        let (topic, _) = wired(&cloud).await;
        assert_eq!(cloud.subscribed_endpoints(&topic).len(), 1);

        cloud.delete_topic(&topic).await.unwrap();
        assert!(!cloud.topic_exists(&topic));
        assert!(cloud.subscribed_endpoints(&topic).is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_and_call_log() {
        let cloud = InMemoryCloud::new();
        cloud.fail_operation(CREATE_QUEUE, "throttled");

        let err = cloud.create_queue("q").await.unwrap_err();
        assert_eq!(err, RemoteError::service(CREATE_QUEUE, "throttled"));
        assert_eq!(cloud.call_count(CREATE_QUEUE), 1);

        cloud.clear_failure(CREATE_QUEUE);
        assert!(cloud.create_queue("q").await.is_ok());
        assert_eq!(cloud.calls(), vec![CREATE_QUEUE, CREATE_QUEUE]);
    }

    #[tokio::test]
    async fn test_signing_cloud_signs_envelopes() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let cloud = InMemoryCloud::with_signing_key(key);
        let (topic, queue_url) = wired(&cloud).await;
        cloud.publish(&topic, "m", None).await.unwrap();

        let received = cloud.receive_message(&queue_url).await.unwrap().unwrap();
        let envelope = NotificationEnvelope::from_json(&received.body).unwrap();
        let signature = STANDARD.decode(envelope.signature()).unwrap();
        let digest = Sha1::digest(envelope.canonical_bytes());
        cloud
            .verifying_key()
            .unwrap()
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
            .unwrap();
    }
}

//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits for everything the bridge depends on: the notification and queue
//! services, the signing key, the downstream collaborator, and an observer
//! for poll results.

use crate::domain::entities::{DeliveredMessage, PollOutcome, ReceivedMessage};
use crate::domain::errors::{DeliveryError, PollError, RemoteError, VerificationError};
use async_trait::async_trait;
use rsa::RsaPublicKey;

/// Subscription protocol used when binding a queue to a topic.
pub const QUEUE_PROTOCOL: &str = "sqs";

/// Pub/sub notification service (topics, subscriptions, publish).
///
/// Every call is a remote call with its own retry behaviour; the bridge does
/// not retry on top.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Create a topic by name and return its ARN.
    ///
    /// Creating a name that already exists returns the existing ARN.
    async fn create_topic(&self, name: &str) -> Result<String, RemoteError>;

    /// Delete a topic and all of its subscriptions.
    async fn delete_topic(&self, topic_arn: &str) -> Result<(), RemoteError>;

    /// Bind an endpoint to a topic and return the subscription ARN.
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, RemoteError>;

    /// Remove a subscription.
    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), RemoteError>;

    /// Publish a message and return the assigned message id.
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, RemoteError>;
}

/// Point-to-point queue service.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Create a queue by name and return its URL.
    async fn create_queue(&self, name: &str) -> Result<String, RemoteError>;

    /// Delete a queue.
    async fn delete_queue(&self, queue_url: &str) -> Result<(), RemoteError>;

    /// Read the queue's own ARN attribute.
    async fn queue_arn(&self, queue_url: &str) -> Result<String, RemoteError>;

    /// Set the queue's access policy attribute.
    async fn set_policy(&self, queue_url: &str, policy: &str) -> Result<(), RemoteError>;

    /// Receive at most one message.
    async fn receive_message(&self, queue_url: &str)
        -> Result<Option<ReceivedMessage>, RemoteError>;

    /// Delete (acknowledge) a received message.
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
        -> Result<(), RemoteError>;
}

/// Source of the public key notifications are signed with.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// The signing key. Implementations may fetch on first use and cache.
    async fn signing_key(&self) -> Result<RsaPublicKey, VerificationError>;
}

/// The routing collaborator that receives verified notifications.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Process one delivered message.
    ///
    /// # Errors
    ///
    /// `DeliveryError` surfaces as a failed poll tick; the message is
    /// acknowledged regardless.
    async fn deliver(&self, message: DeliveredMessage) -> Result<(), DeliveryError>;
}

/// Receives the result of every poll tick.
pub trait PipelineObserver: Send + Sync {
    fn on_poll(&self, outcome: &PollOutcome);

    fn on_poll_error(&self, error: &PollError);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl PipelineObserver for NoOpObserver {
    fn on_poll(&self, _outcome: &PollOutcome) {}
    fn on_poll_error(&self, _error: &PollError) {}
}

//! # Endpoint
//!
//! One configured channel: its configuration, its service clients, and the
//! resolved topic/queue identities.
//!
//! ## Resolution contract
//!
//! The topic ARN and the queue ARN/URL are resolved on first use and then
//! memoized for the lifetime of the endpoint. They are never re-resolved;
//! a new endpoint starts from scratch. Teardown only ever touches resources
//! that were resolved, so stopping a consumer never creates anything.

use crate::adapters::certificate::HttpCertificateSource;
use crate::domain::channel::ChannelUri;
use crate::domain::config::EndpointConfig;
use crate::domain::errors::{ChannelUriError, ProvisioningError};
use crate::domain::identity::ResolvedQueue;
use crate::ports::outbound::{Downstream, NotificationService, QueueService, SigningKeySource};
use crate::service::consumer::SnsConsumer;
use crate::service::producer::SnsProducer;
use crate::service::provisioner::ResourceProvisioner;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Memoized identities.
#[derive(Debug, Default)]
struct Resolution {
    topic_arn: Option<String>,
    queue: Option<ResolvedQueue>,
}

/// A configured topic/queue channel.
pub struct SnsEndpoint {
    config: EndpointConfig,
    notifications: Arc<dyn NotificationService>,
    queues: Arc<dyn QueueService>,
    keys: Option<Arc<dyn SigningKeySource>>,
    provisioner: ResourceProvisioner,
    resolution: Mutex<Resolution>,
}

impl SnsEndpoint {
    /// Endpoint over the given services.
    ///
    /// Signatures, when enabled, are checked against the process-wide
    /// [`HttpCertificateSource`] unless
    /// [`with_key_source`](Self::with_key_source) sets another source.
    pub fn new(
        config: EndpointConfig,
        notifications: Arc<dyn NotificationService>,
        queues: Arc<dyn QueueService>,
    ) -> Self {
        Self {
            provisioner: ResourceProvisioner::new(notifications.clone(), queues.clone()),
            config,
            notifications,
            queues,
            keys: None,
            resolution: Mutex::new(Resolution::default()),
        }
    }

    /// Endpoint configured from a channel URI.
    ///
    /// # Errors
    ///
    /// `ChannelUriError` if the URI does not parse or carries bad parameters.
    pub fn from_uri(
        uri: &str,
        notifications: Arc<dyn NotificationService>,
        queues: Arc<dyn QueueService>,
    ) -> Result<Self, ChannelUriError> {
        let config = ChannelUri::parse(uri)?.to_config()?;
        Ok(Self::new(config, notifications, queues))
    }

    /// Replace the signing key source.
    #[must_use]
    pub fn with_key_source(mut self, keys: Arc<dyn SigningKeySource>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationService> {
        &self.notifications
    }

    pub fn queues(&self) -> &Arc<dyn QueueService> {
        &self.queues
    }

    /// Key source for signature checks: the one set with
    /// [`with_key_source`](Self::with_key_source), else the shared
    /// [`HttpCertificateSource`], created on first call.
    pub fn key_source(&self) -> Arc<dyn SigningKeySource> {
        match &self.keys {
            Some(keys) => Arc::clone(keys),
            None => HttpCertificateSource::shared(),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Topic ARN, resolved once.
    ///
    /// # Errors
    ///
    /// `ProvisioningError` if the topic has to be created and that fails.
    /// Nothing is memoized on failure.
    pub async fn resolve_topic(&self) -> Result<String, ProvisioningError> {
        let mut resolution = self.resolution.lock().await;
        self.resolve_topic_locked(&mut resolution).await
    }

    /// Queue ARN and URL, resolved once (resolving the topic first).
    ///
    /// # Errors
    ///
    /// `ProvisioningError::NoQueueConfigured` for a producer-only endpoint,
    /// or any failure from topic or queue provisioning.
    pub async fn resolve_queue(&self) -> Result<ResolvedQueue, ProvisioningError> {
        let mut resolution = self.resolution.lock().await;
        if let Some(queue) = &resolution.queue {
            return Ok(queue.clone());
        }
        let queue_ref = self
            .config
            .queue
            .as_ref()
            .ok_or(ProvisioningError::NoQueueConfigured)?;
        let topic_arn = self.resolve_topic_locked(&mut resolution).await?;
        let queue = self.provisioner.resolve_queue(queue_ref, &topic_arn).await?;
        resolution.queue = Some(queue.clone());
        Ok(queue)
    }

    async fn resolve_topic_locked(
        &self,
        resolution: &mut Resolution,
    ) -> Result<String, ProvisioningError> {
        if let Some(arn) = &resolution.topic_arn {
            return Ok(arn.clone());
        }
        let arn = self.provisioner.resolve_topic(&self.config.topic).await?;
        resolution.topic_arn = Some(arn.clone());
        Ok(arn)
    }

    /// Topic ARN if already resolved.
    pub async fn resolved_topic(&self) -> Option<String> {
        self.resolution.lock().await.topic_arn.clone()
    }

    /// Queue identity if already resolved.
    pub async fn resolved_queue(&self) -> Option<ResolvedQueue> {
        self.resolution.lock().await.queue.clone()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Delete the topic and/or queue as configured.
    ///
    /// Best-effort: failures are logged and never returned. Unresolved
    /// resources are skipped.
    pub async fn teardown(&self) {
        let resolution = self.resolution.lock().await;

        if self.config.delete_topic_on_stop {
            if let Some(topic_arn) = &resolution.topic_arn {
                match self.notifications.delete_topic(topic_arn).await {
                    Ok(()) => info!(topic_arn = %topic_arn, "Topic deleted"),
                    Err(e) => warn!(topic_arn = %topic_arn, error = %e, "Failed to delete topic"),
                }
            }
        }

        if self.config.delete_queue_on_stop {
            if let Some(queue) = &resolution.queue {
                match self.queues.delete_queue(&queue.url).await {
                    Ok(()) => info!(queue_url = %queue.url, "Queue deleted"),
                    Err(e) => warn!(queue_url = %queue.url, error = %e, "Failed to delete queue"),
                }
            }
        }
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// Consumer delivering this channel's notifications to `downstream`.
    pub fn create_consumer(self: &Arc<Self>, downstream: Arc<dyn Downstream>) -> SnsConsumer {
        SnsConsumer::new(Arc::clone(self), downstream)
    }

    /// Producer publishing to this channel's topic.
    pub fn create_producer(self: &Arc<Self>) -> SnsProducer {
        SnsProducer::new(Arc::clone(self))
    }

    /// Channel URI for display, credentials hidden.
    pub fn redacted_uri(&self) -> String {
        ChannelUri::from_config(&self.config).redacted()
    }
}

impl fmt::Display for SnsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint[{}]", self.redacted_uri())
    }
}

//! Companion producer: publishes messages to the endpoint's topic.

use crate::domain::errors::PublishError;
use crate::service::endpoint::SnsEndpoint;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Publishes to a channel's topic, resolving (or creating) it on first use.
pub struct SnsProducer {
    endpoint: Arc<SnsEndpoint>,
}

impl SnsProducer {
    pub fn new(endpoint: Arc<SnsEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Publish with the endpoint's configured subject, if any.
    ///
    /// # Errors
    ///
    /// `PublishError` if the topic cannot be resolved or the publish fails.
    pub async fn publish(&self, message: &str) -> Result<String, PublishError> {
        let subject = self.endpoint.config().subject.as_deref();
        self.publish_with_subject(message, subject).await
    }

    /// Publish with an explicit subject.
    ///
    /// # Errors
    ///
    /// `PublishError` if the topic cannot be resolved or the publish fails.
    pub async fn publish_with_subject(
        &self,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, PublishError> {
        let topic_arn = self.endpoint.resolve_topic().await?;
        let message_id = self
            .endpoint
            .notifications()
            .publish(&topic_arn, message, subject)
            .await?;
        debug!(topic_arn = %topic_arn, message_id = %message_id, "Published");
        Ok(message_id)
    }
}

impl fmt::Display for SnsProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer[{}]", self.endpoint.redacted_uri())
    }
}

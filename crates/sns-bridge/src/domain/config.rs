//! # Endpoint Configuration
//!
//! Typed configuration for one topic/queue channel. Built programmatically or
//! parsed from a channel URI (see [`crate::domain::channel`]).
//!
//! All timeouts and flags have defaults matching a plain scheduled poller:
//! poll every 500 ms, no dedupe, no verification, keep resources on stop.

use crate::domain::identity::{QueueRef, TopicRef};
use std::fmt;
use std::time::Duration;

/// Placeholder shown instead of credential values.
pub const REDACTED: &str = "hidden";

/// Access/secret key pair. `Debug` never prints the values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &REDACTED)
            .field("secret_key", &REDACTED)
            .finish()
    }
}

/// Configuration for one bridge endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Credentials passed to the remote service clients.
    pub credentials: Credentials,
    /// Topic to subscribe to (or publish to).
    pub topic: TopicRef,
    /// Queue to deliver into. `None` for producer-only endpoints.
    pub queue: Option<QueueRef>,
    /// Delete the topic when the consumer stops (skips the unsubscribe).
    pub delete_topic_on_stop: bool,
    /// Delete the queue when the consumer stops.
    pub delete_queue_on_stop: bool,
    /// Drop notifications whose message id was recently delivered.
    pub idempotent: bool,
    /// Check each notification's signature before delivering it.
    pub verify_signature: bool,
    /// Delay between poll ticks.
    pub poll_delay: Duration,
    /// Subject attached by the producer when publishing.
    pub subject: Option<String>,
}

impl EndpointConfig {
    /// Default delay between poll ticks.
    pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(500);

    /// Endpoint for a topic with default flags and no queue.
    pub fn new(topic: TopicRef) -> Self {
        Self {
            credentials: Credentials::default(),
            topic,
            queue: None,
            delete_topic_on_stop: false,
            delete_queue_on_stop: false,
            idempotent: false,
            verify_signature: false,
            poll_delay: Self::DEFAULT_POLL_DELAY,
            subject: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_queue(mut self, queue: QueueRef) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn with_delete_topic_on_stop(mut self, delete: bool) -> Self {
        self.delete_topic_on_stop = delete;
        self
    }

    #[must_use]
    pub fn with_delete_queue_on_stop(mut self, delete: bool) -> Self {
        self.delete_queue_on_stop = delete;
        self
    }

    #[must_use]
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    #[must_use]
    pub fn with_verify_signature(mut self, verify: bool) -> Self {
        self.verify_signature = verify;
        self
    }

    #[must_use]
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EndpointConfig::new(TopicRef::Name("orders".to_string()));
        assert_eq!(config.poll_delay, Duration::from_millis(500));
        assert!(!config.idempotent);
        assert!(!config.verify_signature);
        assert!(!config.delete_topic_on_stop);
        assert!(!config.delete_queue_on_stop);
        assert!(config.queue.is_none());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("AKIAEXAMPLE", "s3cr3t/key+");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("hidden"));
    }
}

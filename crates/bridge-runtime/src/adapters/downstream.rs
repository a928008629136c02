//! Downstream that logs each delivered notification.

use async_trait::async_trait;
use sns_bridge::{DeliveredMessage, DeliveryError, Downstream, HeaderField};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Writes every notification to the log at `info`. Never rejects.
#[derive(Debug, Default)]
pub struct LoggingDownstream {
    delivered: AtomicU64,
}

impl LoggingDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications seen so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Downstream for LoggingDownstream {
    async fn deliver(&self, message: DeliveredMessage) -> Result<(), DeliveryError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        info!(
            message_id = %message.header(HeaderField::MessageId),
            topic_arn = %message.header(HeaderField::TopicArn),
            subject = %message.header(HeaderField::Subject),
            body = %message.body,
            "Notification received"
        );
        Ok(())
    }
}

//! Downstream adapters: forward delivered messages into a channel, or filter
//! them by subject before passing them on.

use crate::domain::entities::{DeliveredMessage, HeaderField};
use crate::domain::errors::DeliveryError;
use crate::ports::outbound::Downstream;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Forwards every delivered message into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDownstream {
    sender: mpsc::UnboundedSender<DeliveredMessage>,
}

impl ChannelDownstream {
    /// Downstream plus the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveredMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Downstream for ChannelDownstream {
    async fn deliver(&self, message: DeliveredMessage) -> Result<(), DeliveryError> {
        self.sender
            .send(message)
            .map_err(|_| DeliveryError::Rejected("receiver dropped".to_string()))
    }
}

/// Passes on only messages whose `SNS:Subject` equals the wanted subject.
///
/// Everything else is accepted and dropped.
pub struct SubjectFilter<D> {
    subject: String,
    inner: D,
}

impl<D: Downstream> SubjectFilter<D> {
    pub fn new(subject: impl Into<String>, inner: D) -> Self {
        Self {
            subject: subject.into(),
            inner,
        }
    }
}

#[async_trait]
impl<D: Downstream> Downstream for SubjectFilter<D> {
    async fn deliver(&self, message: DeliveredMessage) -> Result<(), DeliveryError> {
        if message.header(HeaderField::Subject) != self.subject {
            return Ok(());
        }
        self.inner.deliver(message).await
    }
}

//! # Domain Entities
//!
//! Messages as they cross the bridge: raw from the queue, and enriched for
//! the downstream collaborator.

use crate::domain::envelope::NotificationEnvelope;
use std::fmt;

/// Namespace prefix for metadata names handed downstream.
pub const HEADER_PREFIX: &str = "SNS:";

/// A raw message received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Raw body (a JSON notification envelope).
    pub body: String,
    /// Handle used to acknowledge (delete) this delivery.
    pub receipt_handle: String,
}

/// The nine envelope fields exposed as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    MessageId,
    Timestamp,
    TopicArn,
    Type,
    UnsubscribeUrl,
    Message,
    Subject,
    Signature,
    SignatureVersion,
}

impl HeaderField {
    /// Every field, in delivery order.
    pub const ALL: [HeaderField; 9] = [
        HeaderField::MessageId,
        HeaderField::Timestamp,
        HeaderField::TopicArn,
        HeaderField::Type,
        HeaderField::UnsubscribeUrl,
        HeaderField::Message,
        HeaderField::Subject,
        HeaderField::Signature,
        HeaderField::SignatureVersion,
    ];

    /// Envelope key for this field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            HeaderField::MessageId => "MessageId",
            HeaderField::Timestamp => "Timestamp",
            HeaderField::TopicArn => "TopicArn",
            HeaderField::Type => "Type",
            HeaderField::UnsubscribeUrl => "UnsubscribeURL",
            HeaderField::Message => "Message",
            HeaderField::Subject => "Subject",
            HeaderField::Signature => "Signature",
            HeaderField::SignatureVersion => "SignatureVersion",
        }
    }

    /// Namespaced metadata name, e.g. `SNS:Subject`.
    #[must_use]
    pub fn header_name(self) -> String {
        format!("{HEADER_PREFIX}{}", self.key())
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HEADER_PREFIX}{}", self.key())
    }
}

/// Fixed metadata record carried by every delivered message.
///
/// Values are plain strings; an absent subject is the empty string here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationHeaders {
    pub message_id: String,
    pub timestamp: String,
    pub topic_arn: String,
    pub message_type: String,
    pub unsubscribe_url: String,
    pub message: String,
    pub subject: String,
    pub signature: String,
    pub signature_version: String,
}

impl NotificationHeaders {
    /// Copy the nine fields out of an envelope.
    #[must_use]
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Self {
        Self {
            message_id: envelope.message_id().to_string(),
            timestamp: envelope.timestamp().to_string(),
            topic_arn: envelope.topic_arn().to_string(),
            message_type: envelope.message_type().to_string(),
            unsubscribe_url: envelope.unsubscribe_url().to_string(),
            message: envelope.message().to_string(),
            subject: envelope.subject().unwrap_or_default().to_string(),
            signature: envelope.signature().to_string(),
            signature_version: envelope.signature_version().to_string(),
        }
    }

    /// Value of one field.
    #[must_use]
    pub fn get(&self, field: HeaderField) -> &str {
        match field {
            HeaderField::MessageId => &self.message_id,
            HeaderField::Timestamp => &self.timestamp,
            HeaderField::TopicArn => &self.topic_arn,
            HeaderField::Type => &self.message_type,
            HeaderField::UnsubscribeUrl => &self.unsubscribe_url,
            HeaderField::Message => &self.message,
            HeaderField::Subject => &self.subject,
            HeaderField::Signature => &self.signature,
            HeaderField::SignatureVersion => &self.signature_version,
        }
    }

    /// `(field, value)` pairs in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = (HeaderField, &str)> + '_ {
        HeaderField::ALL.into_iter().map(|field| (field, self.get(field)))
    }
}

/// A verified notification handed to the downstream collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// The envelope's `Message` field.
    pub body: String,
    /// All nine envelope fields.
    pub headers: NotificationHeaders,
}

impl DeliveredMessage {
    #[must_use]
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Self {
        Self {
            body: envelope.message().to_string(),
            headers: NotificationHeaders::from_envelope(envelope),
        }
    }

    /// Shorthand for `headers.get(field)`.
    #[must_use]
    pub fn header(&self, field: HeaderField) -> &str {
        self.headers.get(field)
    }
}

// =============================================================================
// Poll outcomes
// =============================================================================

/// What happened to a dequeued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Handed to the downstream collaborator.
    Delivered,
    /// Dropped: the message id was recently delivered.
    Duplicate,
    /// Dropped: the signature did not check out.
    FailedVerification,
    /// Dropped: the body was not a JSON object.
    Malformed,
}

impl Disposition {
    /// Stable lowercase label, used for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Disposition::Delivered => "delivered",
            Disposition::Duplicate => "duplicate",
            Disposition::FailedVerification => "failed_verification",
            Disposition::Malformed => "malformed",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The queue had nothing to deliver.
    Empty,
    /// One message was dequeued and dealt with.
    Handled {
        /// Envelope message id (empty for malformed bodies).
        message_id: String,
        disposition: Disposition,
        /// Whether the delete-message call succeeded.
        acknowledged: bool,
    },
}

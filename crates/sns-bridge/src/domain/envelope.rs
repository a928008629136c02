//! # Notification Envelope
//!
//! The decoded JSON document a topic delivers into a subscribed queue, plus
//! the canonical byte form its signature is computed over.
//!
//! Decoding is permissive: a missing or `null` key reads as an empty string.
//! `Subject` is the one field whose absence is tracked, because the canonical
//! string only includes it when present.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors decoding a raw queue body into an envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The body is not JSON at all.
    #[error("Notification body is not JSON: {0}")]
    InvalidJson(String),

    /// The body is JSON but not an object.
    #[error("Notification body is not a JSON object")]
    NotAnObject,
}

/// One notification as received from the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TopicArn")]
    topic_arn: String,
    #[serde(rename = "Type")]
    message_type: String,
    #[serde(rename = "UnsubscribeURL")]
    unsubscribe_url: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Subject", skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(rename = "Signature")]
    signature: String,
    #[serde(rename = "SignatureVersion")]
    signature_version: String,
}

impl NotificationEnvelope {
    /// Decode a raw queue body.
    ///
    /// # Errors
    ///
    /// `EnvelopeError` if the body is not a JSON object. Individual fields
    /// never fail: missing keys become empty strings, and non-string scalars
    /// are rendered as their JSON text.
    pub fn from_json(body: &str) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        Ok(Self {
            message_id: field(&object, "MessageId").unwrap_or_default(),
            timestamp: field(&object, "Timestamp").unwrap_or_default(),
            topic_arn: field(&object, "TopicArn").unwrap_or_default(),
            message_type: field(&object, "Type").unwrap_or_default(),
            unsubscribe_url: field(&object, "UnsubscribeURL").unwrap_or_default(),
            message: field(&object, "Message").unwrap_or_default(),
            subject: field(&object, "Subject"),
            signature: field(&object, "Signature").unwrap_or_default(),
            signature_version: field(&object, "SignatureVersion").unwrap_or_default(),
        })
    }

    /// Encode as the JSON document a topic would deliver.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Canonical byte string the signature is computed over.
    ///
    /// `name\nvalue\n` pairs for `Message`, `MessageId`, `Subject` (only when
    /// present), `Timestamp`, `TopicArn`, `Type`, in that order, UTF-8.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut canonical = String::new();
        push_pair(&mut canonical, "Message", &self.message);
        push_pair(&mut canonical, "MessageId", &self.message_id);
        if let Some(subject) = &self.subject {
            push_pair(&mut canonical, "Subject", subject);
        }
        push_pair(&mut canonical, "Timestamp", &self.timestamp);
        push_pair(&mut canonical, "TopicArn", &self.topic_arn);
        push_pair(&mut canonical, "Type", &self.message_type);
        canonical.into_bytes()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn unsubscribe_url(&self) -> &str {
        &self.unsubscribe_url
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Subject, if the publisher set one.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Base64-encoded signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn signature_version(&self) -> &str {
        &self.signature_version
    }

    // =========================================================================
    // Builders (used by publishers and tests)
    // =========================================================================

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    #[must_use]
    pub fn with_topic_arn(mut self, topic_arn: impl Into<String>) -> Self {
        self.topic_arn = topic_arn.into();
        self
    }

    #[must_use]
    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = message_type.into();
        self
    }

    #[must_use]
    pub fn with_unsubscribe_url(mut self, unsubscribe_url: impl Into<String>) -> Self {
        self.unsubscribe_url = unsubscribe_url.into();
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    #[must_use]
    pub fn with_signature_version(mut self, signature_version: impl Into<String>) -> Self {
        self.signature_version = signature_version.into();
        self
    }
}

fn field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn push_pair(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push('\n');
    out.push_str(value);
    out.push('\n');
}

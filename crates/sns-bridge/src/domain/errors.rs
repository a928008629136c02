//! # Bridge Errors
//!
//! Error types for every stage of the bridge: configuration, provisioning,
//! remote calls, verification, delivery, polling and lifecycle.
//!
//! Only provisioning and lifecycle errors ever reach the caller of `start()`.
//! Verification errors are downgraded to "not verified", teardown errors are
//! logged, and poll errors are reported to the scheduler.

use thiserror::Error;

/// Errors produced while parsing a channel URI into an endpoint configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelUriError {
    /// The URI does not start with the `sns:` scheme.
    #[error("Channel URI must use the '{expected}' scheme: {uri}")]
    InvalidScheme { expected: &'static str, uri: String },

    /// The URI names no topic.
    #[error("Channel URI has no topic reference")]
    MissingTopic,

    /// A query parameter is not of the form `key=value`.
    #[error("Malformed query parameter: {0}")]
    MalformedParameter(String),

    /// A query parameter is not understood by the endpoint.
    #[error("Unknown channel parameter: {0}")]
    UnknownParameter(String),

    /// A boolean parameter holds something other than `true`/`false`.
    #[error("Parameter {name} must be true or false, got {value}")]
    InvalidBoolean { name: String, value: String },

    /// The poll delay is not a number of milliseconds.
    #[error("Parameter delay must be milliseconds, got {0}")]
    InvalidDelay(String),

    /// Both `queueName` and `queueArn` were supplied.
    #[error("Channel URI may name a queue by queueName or queueArn, not both")]
    ConflictingQueue,
}

/// Errors from parsing resource identities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The ARN has fewer than the two trailing `:` segments (account, name).
    #[error("Malformed ARN '{0}': expected at least account and name segments")]
    MalformedArn(String),
}

/// Error returned by a remote notification or queue service call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The service rejected or failed the operation.
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    /// The service answered but omitted a field the bridge needs.
    #[error("{operation} returned no {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    /// The addressed topic, queue, subscription or receipt does not exist.
    #[error("{operation}: no such resource {resource}")]
    NotFound {
        operation: &'static str,
        resource: String,
    },
}

impl RemoteError {
    /// Shorthand for a [`RemoteError::Service`] failure.
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            operation,
            message: message.into(),
        }
    }
}

/// Errors while resolving or creating the topic and queue.
///
/// Provisioning is not atomic: a failure part-way through leaves any resource
/// already created in place. Retrying is safe because creation by name is
/// idempotent at the remote services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Creating the topic by name failed.
    #[error("Failed to create topic '{name}': {source}")]
    CreateTopic { name: String, source: RemoteError },

    /// Creating the queue by name failed.
    #[error("Failed to create queue '{name}': {source}")]
    CreateQueue { name: String, source: RemoteError },

    /// Reading the new queue's ARN attribute failed.
    #[error("Failed to read ARN of queue {queue_url}: {source}")]
    QueueArn {
        queue_url: String,
        source: RemoteError,
    },

    /// Attaching the delivery policy to the queue failed.
    #[error("Failed to set policy on queue {queue_url}: {source}")]
    SetPolicy {
        queue_url: String,
        source: RemoteError,
    },

    /// A literal queue ARN could not be turned into a queue URL.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The endpoint has no queue reference (producer-only configuration).
    #[error("Endpoint has no queue configured")]
    NoQueueConfigured,
}

/// Reasons a notification fails authenticity checking.
///
/// These never escape the verifier; they only explain a `false` result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// The `Signature` field is not valid base64.
    #[error("Signature is not valid base64: {0}")]
    SignatureEncoding(String),

    /// The signing certificate could not be fetched.
    #[error("Failed to fetch signing certificate: {0}")]
    KeyFetch(String),

    /// The signing certificate could not be parsed into an RSA key.
    #[error("Invalid signing certificate: {0}")]
    InvalidCertificate(String),

    /// The signature does not match the canonical string.
    #[error("Signature does not match notification content")]
    Mismatch,
}

/// Error raised by the downstream collaborator for one delivered message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The downstream refused or failed to process the message.
    #[error("Downstream rejected message: {0}")]
    Rejected(String),
}

/// Failure of a single poll tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// Receiving from the queue failed; the next tick is the retry.
    #[error("Receive failed: {0}")]
    Receive(RemoteError),

    /// The downstream failed. The message was still acknowledged if
    /// `acknowledged` is set.
    #[error("Delivery of message {message_id} failed: {source}")]
    Delivery {
        message_id: String,
        acknowledged: bool,
        source: DeliveryError,
    },
}

/// Errors from the consumer start/stop state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start()` was called in a state other than `Idle`.
    #[error("Cannot start consumer in state {0}")]
    InvalidState(String),

    /// Topic or queue provisioning failed.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Subscribing the queue to the topic failed.
    #[error("Failed to subscribe queue to topic: {0}")]
    Subscribe(RemoteError),
}

/// Errors from the companion producer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The topic could not be resolved.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// The publish call failed.
    #[error("Publish failed: {0}")]
    Remote(#[from] RemoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioning_error_wraps_remote_source() {
        let err = ProvisioningError::CreateQueue {
            name: "orders".to_string(),
            source: RemoteError::service("CreateQueue", "throttled"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create queue 'orders': CreateQueue failed: throttled"
        );
    }

    #[test]
    fn test_lifecycle_error_is_transparent_over_provisioning() {
        let err: LifecycleError = ProvisioningError::NoQueueConfigured.into();
        assert_eq!(err.to_string(), "Endpoint has no queue configured");
    }
}

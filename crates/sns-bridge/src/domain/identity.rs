//! # Resource Identities
//!
//! Topic and queue references, ARN recognition, and the deterministic
//! ARN → queue URL derivation.

use crate::domain::errors::IdentityError;

/// Prefix shared by every literal ARN.
pub const ARN_PREFIX: &str = "arn:aws";

/// Marker that turns a channel's topic reference into create-by-name.
pub const TOPIC_NAME_MARKER: &str = "topicName/";

/// Host used when deriving a queue URL from a queue ARN.
pub const QUEUE_URL_BASE: &str = "https://queue.amazonaws.com";

/// How the endpoint names its topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicRef {
    /// A literal topic ARN, used as-is.
    Arn(String),
    /// A topic name, created (or looked up) at start.
    Name(String),
}

impl TopicRef {
    /// Interpret a channel topic reference.
    ///
    /// Anything starting with `arn:aws` is a literal ARN; everything else is a
    /// name, taken from after the last `/` so that `topicName/orders` and
    /// `orders` both resolve to `orders`.
    pub fn from_reference(reference: &str) -> Self {
        if is_literal_arn(reference) {
            Self::Arn(reference.to_string())
        } else {
            let name = reference
                .rsplit_once('/')
                .map_or(reference, |(_, name)| name);
            Self::Name(name.to_string())
        }
    }

    /// Render back to the reference form used in a channel URI.
    pub fn to_reference(&self) -> String {
        match self {
            Self::Arn(arn) => arn.clone(),
            Self::Name(name) => format!("{TOPIC_NAME_MARKER}{name}"),
        }
    }
}

/// How the endpoint names its queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueRef {
    /// A literal queue ARN; the URL is derived, nothing is created.
    Arn(String),
    /// A queue name, created at start and given a delivery policy.
    Name(String),
}

/// A queue as the bridge addresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQueue {
    /// Queue ARN (the subscription endpoint).
    pub arn: String,
    /// Queue URL (the address for receive/delete calls).
    pub url: String,
}

/// Whether a reference is a literal ARN rather than a name.
#[must_use]
pub fn is_literal_arn(reference: &str) -> bool {
    reference.starts_with(ARN_PREFIX)
}

/// Derive a queue URL from a queue ARN.
///
/// The last two `:` segments are the account id and the queue name:
/// `arn:aws:sqs:us-east-1:266383121696:my-queue` →
/// `https://queue.amazonaws.com/266383121696/my-queue`.
///
/// # Errors
///
/// `IdentityError::MalformedArn` if the ARN has fewer than two segments.
pub fn queue_url_from_arn(queue_arn: &str) -> Result<String, IdentityError> {
    let mut segments = queue_arn.rsplit(':');
    let (Some(name), Some(account)) = (segments.next(), segments.next()) else {
        return Err(IdentityError::MalformedArn(queue_arn.to_string()));
    };
    Ok(format!("{QUEUE_URL_BASE}/{account}/{name}"))
}

/// Path component of a URL, without query or fragment.
///
/// `https://queue.amazonaws.com/123/q` → `/123/q`. A URL with no path yields
/// an empty string.
#[must_use]
pub fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let Some(start) = rest.find('/') else {
        return "";
    };
    let path = &rest[start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

//! # Channel URIs
//!
//! String form of an endpoint configuration:
//!
//! ```text
//! sns:<topic-arn | topicName/<name>>?accessKey=..&secretKey=..&queueName=..&delay=..
//! ```
//!
//! Query parameters keep their insertion order, so a URI renders exactly as
//! it was built. Values are percent-decoded on parse; on render, a value is
//! percent-encoded only if it holds a character that would break the query.
//! Credentials are never logged; use [`ChannelUri::redacted`] or
//! [`redact_credentials`] for display.

use crate::domain::config::{Credentials, EndpointConfig, REDACTED};
use crate::domain::errors::ChannelUriError;
use crate::domain::identity::{QueueRef, TopicRef, TOPIC_NAME_MARKER};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// URI scheme of a channel.
pub const SCHEME: &str = "sns";

/// Parameter names.
pub mod params {
    pub const ACCESS_KEY: &str = "accessKey";
    pub const SECRET_KEY: &str = "secretKey";
    pub const QUEUE_NAME: &str = "queueName";
    pub const QUEUE_ARN: &str = "queueArn";
    pub const DELAY: &str = "delay";
    pub const IDEMPOTENT: &str = "idempotent";
    pub const VERIFY: &str = "verify";
    pub const DELETE_TOPIC_ON_STOP: &str = "deleteTopicOnStop";
    pub const DELETE_QUEUE_ON_STOP: &str = "deleteQueueOnStop";
    pub const SUBJECT: &str = "subject";
}

/// Parameters whose values are credentials.
const CREDENTIAL_PARAMS: [&str; 2] = [params::ACCESS_KEY, params::SECRET_KEY];

/// Characters that cannot appear literally in a rendered value.
const QUERY_RESERVED: [char; 5] = ['&', '%', '#', '?', ' '];

/// A channel URI: a topic reference plus ordered query parameters.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ChannelUri {
    topic: String,
    params: Vec<(String, String)>,
}

impl ChannelUri {
    /// Empty URI with no topic and no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URI seeded with credentials and the usual consumer defaults
    /// (`delay=2000`, `idempotent=true`).
    #[must_use]
    pub fn with_credentials(credentials: &Credentials) -> Self {
        Self::new()
            .with_property(params::ACCESS_KEY, &credentials.access_key)
            .with_property(params::SECRET_KEY, &credentials.secret_key)
            .with_property(params::DELAY, "2000")
            .with_property(params::IDEMPOTENT, "true")
    }

    /// Parse a URI string.
    ///
    /// # Errors
    ///
    /// `ChannelUriError` if the scheme is not `sns:`, the topic is empty, or
    /// a parameter is not `key=value` with a value that percent-decodes to
    /// UTF-8.
    pub fn parse(uri: &str) -> Result<Self, ChannelUriError> {
        let rest = uri
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| ChannelUriError::InvalidScheme {
                expected: SCHEME,
                uri: redact_credentials(uri),
            })?;

        let (topic, query) = match rest.rsplit_once('?') {
            Some((topic, query)) => (topic, query),
            None => (rest, ""),
        };
        let topic = topic.strip_prefix("//").unwrap_or(topic);
        if topic.is_empty() {
            return Err(ChannelUriError::MissingTopic);
        }

        let mut channel = Self::new().with_topic_reference(topic);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ChannelUriError::MalformedParameter(redact_pair(pair)))?;
            let value = urlencoding::decode(value)
                .map_err(|_| ChannelUriError::MalformedParameter(redact_pair(pair)))?;
            channel.add_property(key, &value);
        }
        Ok(channel)
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Target a topic by literal ARN.
    #[must_use]
    pub fn with_topic_arn(self, topic_arn: &str) -> Self {
        self.with_topic_reference(topic_arn)
    }

    /// Target a topic by name (created at start).
    #[must_use]
    pub fn with_topic_name(self, topic_name: &str) -> Self {
        self.with_topic_reference(&format!("{TOPIC_NAME_MARKER}{topic_name}"))
    }

    #[must_use]
    pub fn with_queue_name(self, queue_name: &str) -> Self {
        self.with_property(params::QUEUE_NAME, queue_name)
    }

    #[must_use]
    pub fn with_queue_arn(self, queue_arn: &str) -> Self {
        self.with_property(params::QUEUE_ARN, queue_arn)
    }

    #[must_use]
    pub fn with_delete_queue_on_stop(self, delete: bool) -> Self {
        self.with_property(params::DELETE_QUEUE_ON_STOP, &delete.to_string())
    }

    #[must_use]
    pub fn with_delete_topic_on_stop(self, delete: bool) -> Self {
        self.with_property(params::DELETE_TOPIC_ON_STOP, &delete.to_string())
    }

    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_property(params::DELAY, &delay.as_millis().to_string())
    }

    /// Set a parameter; an existing key keeps its position.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.add_property(key, value);
        self
    }

    /// Set a parameter in place; an existing key keeps its position.
    pub fn add_property(&mut self, key: &str, value: &str) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }

    fn with_topic_reference(mut self, reference: &str) -> Self {
        self.topic = reference.to_string();
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The topic reference exactly as written: a literal ARN, or
    /// `topicName/<name>`.
    #[must_use]
    pub fn topic_reference(&self) -> &str {
        &self.topic
    }

    /// Value of a parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parameters in order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rendering safe for logs: credential values replaced by `hidden`.
    #[must_use]
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let mut out = format!("{SCHEME}:{}", self.topic);
        let mut delim = '?';
        for (key, value) in &self.params {
            let value = if redact && CREDENTIAL_PARAMS.contains(&key.as_str()) {
                Cow::Borrowed(REDACTED)
            } else {
                encode_value(value)
            };
            out.push(delim);
            out.push_str(key);
            out.push('=');
            out.push_str(&value);
            delim = '&';
        }
        out
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Build the typed endpoint configuration.
    ///
    /// # Errors
    ///
    /// `ChannelUriError` for unknown parameters, non-boolean flags, a
    /// non-numeric delay, or both `queueName` and `queueArn`.
    pub fn to_config(&self) -> Result<EndpointConfig, ChannelUriError> {
        if self.topic.is_empty() {
            return Err(ChannelUriError::MissingTopic);
        }

        let mut config = EndpointConfig::new(TopicRef::from_reference(&self.topic));
        for (key, value) in self.params() {
            match key {
                params::ACCESS_KEY => config.credentials.access_key = value.to_string(),
                params::SECRET_KEY => config.credentials.secret_key = value.to_string(),
                params::QUEUE_NAME | params::QUEUE_ARN => {
                    if config.queue.is_some() {
                        return Err(ChannelUriError::ConflictingQueue);
                    }
                    config.queue = Some(if key == params::QUEUE_NAME {
                        QueueRef::Name(value.to_string())
                    } else {
                        QueueRef::Arn(value.to_string())
                    });
                }
                params::DELAY => {
                    let millis = value
                        .parse::<u64>()
                        .map_err(|_| ChannelUriError::InvalidDelay(value.to_string()))?;
                    config.poll_delay = Duration::from_millis(millis);
                }
                params::IDEMPOTENT => config.idempotent = parse_bool(key, value)?,
                params::VERIFY => config.verify_signature = parse_bool(key, value)?,
                params::DELETE_TOPIC_ON_STOP => {
                    config.delete_topic_on_stop = parse_bool(key, value)?;
                }
                params::DELETE_QUEUE_ON_STOP => {
                    config.delete_queue_on_stop = parse_bool(key, value)?;
                }
                params::SUBJECT => config.subject = Some(value.to_string()),
                other => return Err(ChannelUriError::UnknownParameter(other.to_string())),
            }
        }
        Ok(config)
    }

    /// Render a configuration back into URI form.
    #[must_use]
    pub fn from_config(config: &EndpointConfig) -> Self {
        let mut uri = Self::new()
            .with_topic_reference(&config.topic.to_reference())
            .with_property(params::ACCESS_KEY, &config.credentials.access_key)
            .with_property(params::SECRET_KEY, &config.credentials.secret_key);
        match &config.queue {
            Some(QueueRef::Name(name)) => uri.add_property(params::QUEUE_NAME, name),
            Some(QueueRef::Arn(arn)) => uri.add_property(params::QUEUE_ARN, arn),
            None => {}
        }
        uri.with_delay(config.poll_delay)
            .with_property(params::IDEMPOTENT, &config.idempotent.to_string())
            .with_property(params::VERIFY, &config.verify_signature.to_string())
            .with_delete_topic_on_stop(config.delete_topic_on_stop)
            .with_delete_queue_on_stop(config.delete_queue_on_stop)
            .with_subject_param(config.subject.as_deref())
    }

    fn with_subject_param(self, subject: Option<&str>) -> Self {
        match subject {
            Some(subject) => self.with_property(params::SUBJECT, subject),
            None => self,
        }
    }
}

impl fmt::Display for ChannelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl fmt::Debug for ChannelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelUri").field(&self.redacted()).finish()
    }
}

/// Replace credential values in any URI string with `hidden`.
///
/// Only `accessKey` and `secretKey` values change; every other parameter is
/// left untouched and in order.
#[must_use]
pub fn redact_credentials(uri: &str) -> String {
    let Some((base, query)) = uri.split_once('?') else {
        return uri.to_string();
    };
    let query = query
        .split('&')
        .map(redact_pair)
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

fn redact_pair(pair: &str) -> String {
    match pair.split_once('=') {
        Some((key, _)) if CREDENTIAL_PARAMS.contains(&key) => format!("{key}={REDACTED}"),
        _ => pair.to_string(),
    }
}

fn encode_value(value: &str) -> Cow<'_, str> {
    if value.contains(&QUERY_RESERVED[..]) {
        urlencoding::encode(value)
    } else {
        Cow::Borrowed(value)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ChannelUriError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ChannelUriError::InvalidBoolean {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("1234", "abcd")
    }

    #[test]
    fn test_topic_name_no_extra_params() {
        let uri = ChannelUri::with_credentials(&credentials()).with_topic_name("topic123");
        assert_eq!(
            uri.to_string(),
            "sns:topicName/topic123?accessKey=1234&secretKey=abcd&delay=2000&idempotent=true"
        );
    }

    #[test]
    fn test_topic_name_some_extra_params() {
        let uri = ChannelUri::with_credentials(&credentials())
            .with_topic_name("topic123")
            .with_delete_queue_on_stop(true);
        assert_eq!(
            uri.to_string(),
            "sns:topicName/topic123?accessKey=1234&secretKey=abcd&delay=2000&idempotent=true&deleteQueueOnStop=true"
        );
    }

    #[test]
    fn test_topic_arn() {
        let uri =
            ChannelUri::with_credentials(&credentials()).with_topic_arn("arn:aws:sns:1234:5678");
        assert_eq!(
            uri.to_string(),
            "sns:arn:aws:sns:1234:5678?accessKey=1234&secretKey=abcd&delay=2000&idempotent=true"
        );
    }

    #[test]
    fn test_overriding_property_keeps_position() {
        let uri = ChannelUri::with_credentials(&credentials())
            .with_topic_name("t")
            .with_delay(Duration::from_millis(500));
        assert_eq!(
            uri.to_string(),
            "sns:topicName/t?accessKey=1234&secretKey=abcd&delay=500&idempotent=true"
        );
    }

    #[test]
    fn test_parse_extracts_literal_topic_arn() {
        let arn = "arn:aws:sns:us-east-1:266383121696:my-topic";
        let uri = ChannelUri::parse(&format!(
            "sns:{arn}?accessKey=1234&secretKey=abcd&queueName=q"
        ))
        .unwrap();
        assert_eq!(uri.topic_reference(), arn);
    }

    #[test]
    fn test_parse_extracts_topic_name_reference() {
        let uri = ChannelUri::parse("sns:topicName/orders?accessKey=1234&secretKey=abcd").unwrap();
        let reference = uri.topic_reference();
        assert!(reference.starts_with(TOPIC_NAME_MARKER));
        assert_eq!(reference.rsplit('/').next(), Some("orders"));
    }

    #[test]
    fn test_parse_strips_authority_slashes() {
        let uri = ChannelUri::parse("sns://topicName/orders?delay=10").unwrap();
        assert_eq!(uri.topic_reference(), "topicName/orders");
    }

    #[test]
    fn test_parse_without_query() {
        let uri = ChannelUri::parse("sns:topicName/orders").unwrap();
        assert_eq!(uri.params().count(), 0);
    }

    #[test]
    fn test_parse_rejects_other_scheme() {
        assert!(matches!(
            ChannelUri::parse("sqs:queue?accessKey=1234"),
            Err(ChannelUriError::InvalidScheme { .. })
        ));
        assert_eq!(
            ChannelUri::parse("sns:?delay=1"),
            Err(ChannelUriError::MissingTopic)
        );
    }

    #[test]
    fn test_parse_then_display_is_identity() {
        let raw = "sns:topicName/t?accessKey=1234&secretKey=abcd&queueName=q&delay=2000";
        assert_eq!(ChannelUri::parse(raw).unwrap().to_string(), raw);
    }

    #[test]
    fn test_redaction_hides_credentials_only() {
        let raw = "sns:topicName/t?accessKey=AKIA123&queueName=q&secretKey=a/b+c&delay=2000";
        assert_eq!(
            redact_credentials(raw),
            "sns:topicName/t?accessKey=hidden&queueName=q&secretKey=hidden&delay=2000"
        );
        assert_eq!(ChannelUri::parse(raw).unwrap().redacted(), redact_credentials(raw));
    }

    #[test]
    fn test_parse_percent_decodes_values() {
        let config = ChannelUri::parse(
            "sns:topicName/t?accessKey=AK&secretKey=a%2Fb%2Bc\
             &queueArn=arn%3Aaws%3Asqs%3Aus-east-1%3A1%3Aq",
        )
        .unwrap()
        .to_config()
        .unwrap();

        assert_eq!(config.credentials.secret_key, "a/b+c");
        assert_eq!(
            config.queue,
            Some(QueueRef::Arn("arn:aws:sqs:us-east-1:1:q".to_string()))
        );
    }

    #[test]
    fn test_reserved_characters_survive_render_and_parse() {
        let uri = ChannelUri::new()
            .with_topic_name("t")
            .with_property(params::SUBJECT, "fish & chips");
        assert_eq!(
            uri.to_string(),
            "sns:topicName/t?subject=fish%20%26%20chips"
        );

        let parsed = ChannelUri::parse(&uri.to_string()).unwrap();
        assert_eq!(parsed.param(params::SUBJECT), Some("fish & chips"));
        assert_eq!(parsed, uri);
    }

    #[test]
    fn test_invalid_utf8_escape_is_malformed() {
        assert!(matches!(
            ChannelUri::parse("sns:t?subject=%FF"),
            Err(ChannelUriError::MalformedParameter(_))
        ));
    }

    #[test]
    fn test_redaction_without_query_is_noop() {
        assert_eq!(redact_credentials("sns:topicName/t"), "sns:topicName/t");
    }

    #[test]
    fn test_debug_is_redacted() {
        let uri = ChannelUri::with_credentials(&credentials()).with_topic_name("t");
        let rendered = format!("{uri:?}");
        assert!(!rendered.contains("1234"));
        assert!(!rendered.contains("abcd"));
    }

    #[test]
    fn test_to_config() {
        let config = ChannelUri::parse(
            "sns:topicName/orders?accessKey=1234&secretKey=abcd&queueName=q&delay=250\
             &idempotent=true&verify=true&deleteTopicOnStop=true&deleteQueueOnStop=false&subject=s",
        )
        .unwrap()
        .to_config()
        .unwrap();

        assert_eq!(config.topic, TopicRef::Name("orders".to_string()));
        assert_eq!(config.queue, Some(QueueRef::Name("q".to_string())));
        assert_eq!(config.credentials, Credentials::new("1234", "abcd"));
        assert_eq!(config.poll_delay, Duration::from_millis(250));
        assert!(config.idempotent);
        assert!(config.verify_signature);
        assert!(config.delete_topic_on_stop);
        assert!(!config.delete_queue_on_stop);
        assert_eq!(config.subject.as_deref(), Some("s"));
    }

    #[test]
    fn test_to_config_errors() {
        let conflicting =
            ChannelUri::parse("sns:t?queueName=a&queueArn=arn:aws:sqs:r:1:a").unwrap();
        assert_eq!(conflicting.to_config(), Err(ChannelUriError::ConflictingQueue));

        let unknown = ChannelUri::parse("sns:t?colour=blue").unwrap();
        assert_eq!(
            unknown.to_config(),
            Err(ChannelUriError::UnknownParameter("colour".to_string()))
        );

        let bad_bool = ChannelUri::parse("sns:t?idempotent=yes").unwrap();
        assert!(matches!(
            bad_bool.to_config(),
            Err(ChannelUriError::InvalidBoolean { .. })
        ));

        let bad_delay = ChannelUri::parse("sns:t?delay=soon").unwrap();
        assert_eq!(
            bad_delay.to_config(),
            Err(ChannelUriError::InvalidDelay("soon".to_string()))
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EndpointConfig::new(TopicRef::Name("orders".to_string()))
            .with_credentials(credentials())
            .with_queue(QueueRef::Arn("arn:aws:sqs:us-east-1:1:q".to_string()))
            .with_idempotent(true)
            .with_poll_delay(Duration::from_millis(100))
            .with_subject("hello");
        let uri = ChannelUri::from_config(&config);
        assert_eq!(uri.to_config().unwrap(), config);
    }
}

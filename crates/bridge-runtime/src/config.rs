//! Command line configuration.

use clap::Parser;
use sns_bridge::{ChannelUri, ChannelUriError, EndpointConfig};

/// Default region when neither the flag nor `BRIDGE_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Parser, Debug, Clone)]
#[command(name = "sns-bridge")]
#[command(about = "Subscribe a queue to a notification topic and drain it")]
pub struct RuntimeArgs {
    /// Channel URI, e.g. `sns:topicName/orders?queueName=orders-q&verify=true`
    #[arg(short, long, env = "BRIDGE_CHANNEL")]
    pub channel: String,

    /// Region for the notification and queue services
    #[arg(short, long, env = "BRIDGE_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Override the URL the signing certificate is fetched from
    #[arg(long, env = "BRIDGE_CERTIFICATE_URL")]
    pub certificate_url: Option<String>,

    /// Print the metrics exposition on shutdown
    #[arg(long)]
    pub dump_metrics: bool,
}

impl RuntimeArgs {
    /// Parse the channel URI into an endpoint configuration.
    ///
    /// # Errors
    ///
    /// `ChannelUriError` for a malformed URI or bad parameter.
    pub fn endpoint_config(&self) -> Result<EndpointConfig, ChannelUriError> {
        ChannelUri::parse(&self.channel)?.to_config()
    }

    /// Channel URI with credentials hidden, for logging.
    pub fn redacted_channel(&self) -> String {
        sns_bridge::redact_credentials(&self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sns_bridge::TopicRef;

    #[test]
    fn test_parse_minimal_args() {
        let args = RuntimeArgs::try_parse_from(["sns-bridge", "--channel", "sns:topicName/orders"])
            .unwrap();
        assert_eq!(args.channel, "sns:topicName/orders");
        assert_eq!(args.certificate_url, None);
        assert!(!args.dump_metrics);

        let config = args.endpoint_config().unwrap();
        assert_eq!(config.topic, TopicRef::Name("orders".to_string()));
    }

    #[test]
    fn test_channel_is_required() {
        if std::env::var("BRIDGE_CHANNEL").is_ok() {
            return;
        }
        assert!(RuntimeArgs::try_parse_from(["sns-bridge"]).is_err());
    }

    #[test]
    fn test_explicit_region_and_certificate() {
        let args = RuntimeArgs::try_parse_from([
            "sns-bridge",
            "-c",
            "sns:topicName/t",
            "-r",
            "eu-west-1",
            "--certificate-url",
            "https://example.test/cert.pem",
        ])
        .unwrap();
        assert_eq!(args.region, "eu-west-1");
        assert_eq!(args.certificate_url.as_deref(), Some("https://example.test/cert.pem"));
    }

    #[test]
    fn test_bad_channel_is_reported() {
        let args =
            RuntimeArgs::try_parse_from(["sns-bridge", "--channel", "sqs:topicName/t"]).unwrap();
        assert!(args.endpoint_config().is_err());
    }

    #[test]
    fn test_redacted_channel_hides_secret() {
        let args = RuntimeArgs::try_parse_from([
            "sns-bridge",
            "--channel",
            "sns:topicName/t?accessKey=AK&secretKey=SK",
        ])
        .unwrap();
        let redacted = args.redacted_channel();
        assert!(!redacted.contains("SK"));
        assert!(!redacted.contains("AK"));
    }
}

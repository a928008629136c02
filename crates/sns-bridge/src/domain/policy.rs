//! # Queue Delivery Policy
//!
//! The access policy attached to a newly created queue so that the topic may
//! send into it. Rendered from a template with three substitution points.

use crate::domain::identity::url_path;

/// Policy template shipped with the crate.
pub const DEFAULT_POLICY_TEMPLATE: &str =
    include_str!("../../resources/default-sqs-policy-template.json");

/// Placeholder for the topic ARN.
pub const TOPIC_ARN_PLACEHOLDER: &str = "$SNS_ARN";

/// Placeholder for the queue ARN.
pub const QUEUE_ARN_PLACEHOLDER: &str = "$SQS_ARN";

/// Placeholder for the queue URL's path.
pub const QUEUE_PATH_PLACEHOLDER: &str = "$SQS_URL";

/// Render the default policy for a topic/queue pair.
#[must_use]
pub fn render_policy(topic_arn: &str, queue_arn: &str, queue_url: &str) -> String {
    render_policy_template(DEFAULT_POLICY_TEMPLATE, topic_arn, queue_arn, queue_url)
}

/// Render a policy template.
///
/// Substitutes the three placeholders, then replaces every line break with a
/// space so the result is a single line.
#[must_use]
pub fn render_policy_template(
    template: &str,
    topic_arn: &str,
    queue_arn: &str,
    queue_url: &str,
) -> String {
    template
        .replace(TOPIC_ARN_PLACEHOLDER, topic_arn)
        .replace(QUEUE_ARN_PLACEHOLDER, queue_arn)
        .replace(QUEUE_PATH_PLACEHOLDER, url_path(queue_url))
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "arn:aws:sns:us-east-1:266383121696:my-topic";
    const QUEUE: &str = "arn:aws:sqs:us-east-1:266383121696:my-queue";
    const URL: &str = "https://queue.amazonaws.com/266383121696/my-queue";

    #[test]
    fn test_policy_is_single_line() {
        let policy = render_policy(TOPIC, QUEUE, URL);
        assert!(!policy.contains('\n'));
        assert!(!policy.contains('\r'));
    }

    #[test]
    fn test_policy_substitutes_all_placeholders() {
        let policy = render_policy(TOPIC, QUEUE, URL);
        assert!(!policy.contains('$'));
        assert!(policy.contains(&format!("\"aws:SourceArn\": \"{TOPIC}\"")));
        assert!(policy.contains(&format!("\"Resource\": \"{QUEUE}\"")));
        assert!(policy.contains("\"Id\": \"/266383121696/my-queue/SQSDefaultPolicy\""));
    }

    #[test]
    fn test_policy_is_valid_json() {
        let policy = render_policy(TOPIC, QUEUE, URL);
        let parsed: serde_json::Value = serde_json::from_str(&policy).unwrap();
        assert_eq!(parsed["Statement"][0]["Action"], "SQS:SendMessage");
    }

    #[test]
    fn test_custom_template() {
        let rendered =
            render_policy_template("$SNS_ARN\n$SQS_ARN\r\n$SQS_URL", TOPIC, QUEUE, URL);
        assert_eq!(
            rendered,
            format!("{TOPIC} {QUEUE}  /266383121696/my-queue")
        );
    }
}

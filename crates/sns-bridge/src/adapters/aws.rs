//! # AWS SDK Adapters
//!
//! [`SnsNotificationService`] and [`SqsQueueService`] implement the outbound
//! ports over the official SDK clients. Client configuration inherits from a
//! shared `SdkConfig` (region, HTTP client, retries); channel credentials,
//! when present, override the SDK's default credential chain.

use crate::domain::config::Credentials;
use crate::domain::entities::ReceivedMessage;
use crate::domain::errors::RemoteError;
use crate::ports::outbound::{NotificationService, QueueService};
use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use std::fmt::Display;

const CREDENTIALS_PROVIDER: &str = "sns-bridge-channel";

fn remote(operation: &'static str, error: impl Display) -> RemoteError {
    RemoteError::service(operation, error.to_string())
}

fn channel_credentials(credentials: &Credentials) -> Option<aws_sdk_sns::config::Credentials> {
    if credentials.access_key.is_empty() {
        return None;
    }
    Some(aws_sdk_sns::config::Credentials::new(
        credentials.access_key.clone(),
        credentials.secret_key.clone(),
        None,
        None,
        CREDENTIALS_PROVIDER,
    ))
}

// =============================================================================
// Notification service
// =============================================================================

/// Notification service backed by `aws-sdk-sns`.
#[derive(Debug, Clone)]
pub struct SnsNotificationService {
    client: aws_sdk_sns::Client,
}

impl SnsNotificationService {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig, credentials: &Credentials) -> Self {
        let mut builder = aws_sdk_sns::config::Builder::from(sdk_config);
        if let Some(credentials) = channel_credentials(credentials) {
            builder = builder.credentials_provider(credentials);
        }
        Self {
            client: aws_sdk_sns::Client::from_conf(builder.build()),
        }
    }

    /// Wrap a pre-built client.
    #[must_use]
    pub fn from_client(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationService for SnsNotificationService {
    async fn create_topic(&self, name: &str) -> Result<String, RemoteError> {
        const OP: &str = "CreateTopic";
        let out = self
            .client
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sns::error::DisplayErrorContext(e)))?;
        out.topic_arn()
            .map(str::to_string)
            .ok_or(RemoteError::MissingField {
                operation: OP,
                field: "TopicArn",
            })
    }

    async fn delete_topic(&self, topic_arn: &str) -> Result<(), RemoteError> {
        self.client
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| remote("DeleteTopic", aws_sdk_sns::error::DisplayErrorContext(e)))
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, RemoteError> {
        const OP: &str = "Subscribe";
        let out = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol)
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sns::error::DisplayErrorContext(e)))?;
        out.subscription_arn()
            .map(str::to_string)
            .ok_or(RemoteError::MissingField {
                operation: OP,
                field: "SubscriptionArn",
            })
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), RemoteError> {
        self.client
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| remote("Unsubscribe", aws_sdk_sns::error::DisplayErrorContext(e)))
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<String, RemoteError> {
        const OP: &str = "Publish";
        let out = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .set_subject(subject.map(str::to_string))
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sns::error::DisplayErrorContext(e)))?;
        out.message_id()
            .map(str::to_string)
            .ok_or(RemoteError::MissingField {
                operation: OP,
                field: "MessageId",
            })
    }
}

// =============================================================================
// Queue service
// =============================================================================

/// Queue service backed by `aws-sdk-sqs`.
#[derive(Debug, Clone)]
pub struct SqsQueueService {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueService {
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig, credentials: &Credentials) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(sdk_config);
        if let Some(credentials) = channel_credentials(credentials) {
            builder = builder.credentials_provider(credentials);
        }
        Self {
            client: aws_sdk_sqs::Client::from_conf(builder.build()),
        }
    }

    /// Wrap a pre-built client.
    #[must_use]
    pub fn from_client(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn create_queue(&self, name: &str) -> Result<String, RemoteError> {
        const OP: &str = "CreateQueue";
        let out = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sqs::error::DisplayErrorContext(e)))?;
        out.queue_url()
            .map(str::to_string)
            .ok_or(RemoteError::MissingField {
                operation: OP,
                field: "QueueUrl",
            })
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), RemoteError> {
        self.client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| remote("DeleteQueue", aws_sdk_sqs::error::DisplayErrorContext(e)))
    }

    async fn queue_arn(&self, queue_url: &str) -> Result<String, RemoteError> {
        const OP: &str = "GetQueueAttributes";
        let out = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sqs::error::DisplayErrorContext(e)))?;
        out.attributes()
            .and_then(|attributes| attributes.get(&QueueAttributeName::QueueArn))
            .cloned()
            .ok_or(RemoteError::MissingField {
                operation: OP,
                field: "QueueArn",
            })
    }

    async fn set_policy(&self, queue_url: &str, policy: &str) -> Result<(), RemoteError> {
        self.client
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(QueueAttributeName::Policy, policy)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                remote(
                    "SetQueueAttributes",
                    aws_sdk_sqs::error::DisplayErrorContext(e),
                )
            })
    }

    async fn receive_message(
        &self,
        queue_url: &str,
    ) -> Result<Option<ReceivedMessage>, RemoteError> {
        const OP: &str = "ReceiveMessage";
        let out = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .send()
            .await
            .map_err(|e| remote(OP, aws_sdk_sqs::error::DisplayErrorContext(e)))?;

        let Some(message) = out.messages().first() else {
            return Ok(None);
        };
        let receipt_handle = message.receipt_handle().ok_or(RemoteError::MissingField {
            operation: OP,
            field: "ReceiptHandle",
        })?;
        Ok(Some(ReceivedMessage {
            body: message.body().unwrap_or_default().to_string(),
            receipt_handle: receipt_handle.to_string(),
        }))
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), RemoteError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| remote("DeleteMessage", aws_sdk_sqs::error::DisplayErrorContext(e)))
    }
}

//! # Resource Provisioner
//!
//! Turns topic and queue references into addressable resources.
//!
//! - A literal topic ARN is used as-is; a name is created (idempotent remote
//!   call) and its ARN returned
//! - A literal queue ARN yields a derived URL with no remote call; a name is
//!   created, its ARN read back, and the delivery policy attached
//!
//! Provisioning is not atomic. A failure part-way (e.g. while setting the
//! policy) leaves whatever was already created; retrying is safe because
//! every create is idempotent.

use crate::domain::errors::ProvisioningError;
use crate::domain::identity::{queue_url_from_arn, QueueRef, ResolvedQueue, TopicRef};
use crate::domain::policy::render_policy;
use crate::ports::outbound::{NotificationService, QueueService};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves and creates topics and queues.
#[derive(Clone)]
pub struct ResourceProvisioner {
    notifications: Arc<dyn NotificationService>,
    queues: Arc<dyn QueueService>,
}

impl ResourceProvisioner {
    pub fn new(notifications: Arc<dyn NotificationService>, queues: Arc<dyn QueueService>) -> Self {
        Self {
            notifications,
            queues,
        }
    }

    /// Topic ARN for a reference, creating the topic if named.
    ///
    /// # Errors
    ///
    /// `ProvisioningError::CreateTopic` if the create call fails.
    pub async fn resolve_topic(&self, topic: &TopicRef) -> Result<String, ProvisioningError> {
        match topic {
            TopicRef::Arn(arn) => Ok(arn.clone()),
            TopicRef::Name(name) => {
                let arn = self.notifications.create_topic(name).await.map_err(|source| {
                    ProvisioningError::CreateTopic {
                        name: name.clone(),
                        source,
                    }
                })?;
                info!(topic = %name, topic_arn = %arn, "Topic resolved");
                Ok(arn)
            }
        }
    }

    /// Queue ARN and URL for a reference.
    ///
    /// A named queue is created and given a policy allowing `topic_arn` to
    /// send into it.
    ///
    /// # Errors
    ///
    /// `ProvisioningError` if a literal ARN is malformed or any remote step
    /// fails.
    pub async fn resolve_queue(
        &self,
        queue: &QueueRef,
        topic_arn: &str,
    ) -> Result<ResolvedQueue, ProvisioningError> {
        match queue {
            QueueRef::Arn(arn) => {
                let url = queue_url_from_arn(arn)?;
                debug!(queue_arn = %arn, queue_url = %url, "Queue URL derived from ARN");
                Ok(ResolvedQueue {
                    arn: arn.clone(),
                    url,
                })
            }
            QueueRef::Name(name) => self.create_queue(name, topic_arn).await,
        }
    }

    async fn create_queue(
        &self,
        name: &str,
        topic_arn: &str,
    ) -> Result<ResolvedQueue, ProvisioningError> {
        let url = self
            .queues
            .create_queue(name)
            .await
            .map_err(|source| ProvisioningError::CreateQueue {
                name: name.to_string(),
                source,
            })?;

        let arn = self
            .queues
            .queue_arn(&url)
            .await
            .map_err(|source| ProvisioningError::QueueArn {
                queue_url: url.clone(),
                source,
            })?;

        let policy = render_policy(topic_arn, &arn, &url);
        self.queues
            .set_policy(&url, &policy)
            .await
            .map_err(|source| ProvisioningError::SetPolicy {
                queue_url: url.clone(),
                source,
            })?;

        info!(queue = %name, queue_arn = %arn, queue_url = %url, "Queue resolved");
        Ok(ResolvedQueue { arn, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{operations, InMemoryCloud};
    use crate::domain::errors::{IdentityError, RemoteError};

    fn provisioner(cloud: &Arc<InMemoryCloud>) -> ResourceProvisioner {
        ResourceProvisioner::new(cloud.clone(), cloud.clone())
    }

    #[tokio::test]
    async fn test_literal_topic_arn_makes_no_call() {
        let cloud = Arc::new(InMemoryCloud::new());
        let arn = "arn:aws:sns:us-east-1:266383121696:my-topic";
        let resolved = provisioner(&cloud)
            .resolve_topic(&TopicRef::Arn(arn.to_string()))
            .await
            .unwrap();
        assert_eq!(resolved, arn);
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_named_topic_is_created() {
        let cloud = Arc::new(InMemoryCloud::new());
        let arn = provisioner(&cloud)
            .resolve_topic(&TopicRef::Name("orders".to_string()))
            .await
            .unwrap();
        assert_eq!(arn, InMemoryCloud::topic_arn("orders"));
        assert!(cloud.topic_exists(&arn));
    }

    #[tokio::test]
    async fn test_literal_queue_arn_derives_url() {
        let cloud = Arc::new(InMemoryCloud::new());
        let resolved = provisioner(&cloud)
            .resolve_queue(
                &QueueRef::Arn("arn:aws:sqs:us-east-1:266383121696:my-queue".to_string()),
                "arn:aws:sns:us-east-1:266383121696:my-topic",
            )
            .await
            .unwrap();
        assert_eq!(
            resolved.url,
            "https://queue.amazonaws.com/266383121696/my-queue"
        );
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_queue_arn_fails() {
        let cloud = Arc::new(InMemoryCloud::new());
        let result = provisioner(&cloud)
            .resolve_queue(&QueueRef::Arn("garbage".to_string()), "t")
            .await;
        assert_eq!(
            result,
            Err(ProvisioningError::Identity(IdentityError::MalformedArn(
                "garbage".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_named_queue_gets_policy() {
        let cloud = Arc::new(InMemoryCloud::new());
        let topic_arn = InMemoryCloud::topic_arn("orders");
        let resolved = provisioner(&cloud)
            .resolve_queue(&QueueRef::Name("orders-q".to_string()), &topic_arn)
            .await
            .unwrap();

        assert_eq!(resolved.arn, InMemoryCloud::queue_arn_for("orders-q"));
        assert_eq!(resolved.url, InMemoryCloud::queue_url("orders-q"));
        assert_eq!(
            cloud.calls(),
            vec![
                operations::CREATE_QUEUE,
                operations::GET_QUEUE_ATTRIBUTES,
                operations::SET_QUEUE_ATTRIBUTES,
            ]
        );

        let policy = cloud.queue_policy(&resolved.url).unwrap();
        assert!(!policy.contains('\n'));
        assert!(policy.contains(&topic_arn));
        assert!(policy.contains(&resolved.arn));
        assert!(policy.contains("/000000000000/orders-q/SQSDefaultPolicy"));
    }

    #[tokio::test]
    async fn test_policy_failure_leaves_queue_without_rollback() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.fail_operation(operations::SET_QUEUE_ATTRIBUTES, "access denied");

        let result = provisioner(&cloud)
            .resolve_queue(&QueueRef::Name("q".to_string()), "t")
            .await;
        assert!(matches!(
            result,
            Err(ProvisioningError::SetPolicy {
                source: RemoteError::Service { .. },
                ..
            })
        ));
        let url = InMemoryCloud::queue_url("q");
        assert!(cloud.queue_exists(&url));
        assert!(cloud.queue_policy(&url).is_none());
    }

    #[tokio::test]
    async fn test_create_topic_failure() {
        let cloud = Arc::new(InMemoryCloud::new());
        cloud.fail_operation(operations::CREATE_TOPIC, "throttled");
        let result = provisioner(&cloud)
            .resolve_topic(&TopicRef::Name("t".to_string()))
            .await;
        assert!(matches!(result, Err(ProvisioningError::CreateTopic { .. })));
    }
}

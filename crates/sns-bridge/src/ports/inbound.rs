//! # Inbound Ports (Driving Ports / API)
//!
//! The lifecycle API a routing layer uses to run a consumer.

use crate::domain::errors::LifecycleError;
use async_trait::async_trait;

/// Start/stop control over a running channel.
///
/// Implementations must be thread-safe (`Send + Sync`); calls may come from
/// any task.
#[async_trait]
pub trait ConsumerLifecycle: Send + Sync {
    /// Provision resources, subscribe, and begin polling.
    ///
    /// # Errors
    ///
    /// `LifecycleError` if the consumer is not idle, or if provisioning or
    /// subscribing fails. A failed start leaves the consumer idle.
    async fn start(&self) -> Result<(), LifecycleError>;

    /// Stop polling and tear down.
    ///
    /// Never fails: teardown problems are logged. A second call is a no-op.
    async fn stop(&self);
}

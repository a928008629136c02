//! # Consumer Lifecycle
//!
//! ```text
//! Idle → Provisioning → Subscribed → Polling → Unsubscribing → Stopped
//! ```
//!
//! `start()` provisions the topic and queue, subscribes the queue, and
//! spawns the poll loop. `stop()` cancels the schedule (an in-flight tick
//! runs to completion), unsubscribes unless the topic is about to be
//! deleted, then deletes the topic and/or queue as configured. Teardown is
//! best-effort and never fails. `Stopped` is terminal.

use crate::domain::errors::{LifecycleError, PollError};
use crate::domain::idempotency::IdempotencyCache;
use crate::ports::inbound::ConsumerLifecycle;
use crate::ports::outbound::{Downstream, NoOpObserver, PipelineObserver, QUEUE_PROTOCOL};
use crate::service::endpoint::SnsEndpoint;
use crate::service::poll::PollContext;
use crate::service::verifier::SignatureVerifier;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest poll period; a zero delay would spin.
const MIN_POLL_DELAY: Duration = Duration::from_millis(1);

/// Consumer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Provisioning,
    Subscribed,
    Polling,
    Unsubscribing,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::Provisioning => "Provisioning",
            LifecycleState::Subscribed => "Subscribed",
            LifecycleState::Polling => "Polling",
            LifecycleState::Unsubscribing => "Unsubscribing",
            LifecycleState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Handle on the spawned poll loop.
struct Poller {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct ConsumerInner {
    state: LifecycleState,
    subscription_arn: Option<String>,
    poller: Option<Poller>,
}

/// Subscribes a queue to a topic and drains it into a downstream.
pub struct SnsConsumer {
    endpoint: Arc<SnsEndpoint>,
    downstream: Arc<dyn Downstream>,
    observer: Arc<dyn PipelineObserver>,
    inner: Mutex<ConsumerInner>,
}

impl SnsConsumer {
    pub fn new(endpoint: Arc<SnsEndpoint>, downstream: Arc<dyn Downstream>) -> Self {
        Self {
            endpoint,
            downstream,
            observer: Arc::new(NoOpObserver),
            inner: Mutex::new(ConsumerInner {
                state: LifecycleState::Idle,
                subscription_arn: None,
                poller: None,
            }),
        }
    }

    /// Report every tick to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn endpoint(&self) -> &Arc<SnsEndpoint> {
        &self.endpoint
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    /// Subscription ARN while subscribed.
    pub async fn subscription_arn(&self) -> Option<String> {
        self.inner.lock().await.subscription_arn.clone()
    }

    /// Provision, subscribe, and spawn the poll loop.
    ///
    /// # Errors
    ///
    /// `LifecycleError::InvalidState` unless idle; provisioning or subscribe
    /// failures otherwise. On failure the consumer returns to `Idle` and
    /// nothing created so far is rolled back.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock().await;
        if inner.state != LifecycleState::Idle {
            return Err(LifecycleError::InvalidState(inner.state.to_string()));
        }

        inner.state = LifecycleState::Provisioning;
        let (queue_url, subscription_arn) = match self.subscribe().await {
            Ok(subscribed) => subscribed,
            Err(e) => {
                inner.state = LifecycleState::Idle;
                warn!(consumer = %self, error = %e, "Consumer failed to start");
                return Err(e);
            }
        };
        inner.subscription_arn = Some(subscription_arn);
        inner.state = LifecycleState::Subscribed;

        inner.poller = Some(self.spawn_poller(queue_url));
        inner.state = LifecycleState::Polling;
        info!(consumer = %self, "Consumer started");
        Ok(())
    }

    /// Stop polling and tear down. A second call is a no-op.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if matches!(
            inner.state,
            LifecycleState::Stopped | LifecycleState::Unsubscribing
        ) {
            debug!(consumer = %self, "Consumer already stopped");
            return;
        }
        inner.state = LifecycleState::Unsubscribing;

        if let Some(poller) = inner.poller.take() {
            // Err only if the loop is already gone.
            let _ = poller.shutdown.send(true);
            if let Err(e) = poller.handle.await {
                warn!(consumer = %self, error = %e, "Poll loop ended abnormally");
            }
        }

        let config = self.endpoint.config();
        if let Some(subscription_arn) = inner.subscription_arn.take() {
            if config.delete_topic_on_stop {
                debug!(
                    subscription_arn = %subscription_arn,
                    "Topic will be deleted; skipping unsubscribe"
                );
            } else {
                match self
                    .endpoint
                    .notifications()
                    .unsubscribe(&subscription_arn)
                    .await
                {
                    Ok(()) => info!(subscription_arn = %subscription_arn, "Unsubscribed"),
                    Err(e) => warn!(
                        subscription_arn = %subscription_arn,
                        error = %e,
                        "Failed to unsubscribe"
                    ),
                }
            }
        }

        self.endpoint.teardown().await;
        inner.state = LifecycleState::Stopped;
        info!(consumer = %self, "Consumer stopped");
    }

    async fn subscribe(&self) -> Result<(String, String), LifecycleError> {
        let topic_arn = self.endpoint.resolve_topic().await?;
        let queue = self.endpoint.resolve_queue().await?;
        let subscription_arn = self
            .endpoint
            .notifications()
            .subscribe(&topic_arn, QUEUE_PROTOCOL, &queue.arn)
            .await
            .map_err(LifecycleError::Subscribe)?;
        info!(
            topic_arn = %topic_arn,
            queue_arn = %queue.arn,
            subscription_arn = %subscription_arn,
            "Queue subscribed to topic"
        );
        Ok((queue.url, subscription_arn))
    }

    fn spawn_poller(&self, queue_url: String) -> Poller {
        let config = self.endpoint.config();
        let mut context = PollContext::new(
            self.endpoint.queues().clone(),
            queue_url,
            self.downstream.clone(),
        );
        if config.verify_signature {
            context = context.with_verifier(SignatureVerifier::new(self.endpoint.key_source()));
        }
        if config.idempotent {
            context = context.with_idempotency(IdempotencyCache::new());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_poll_loop(
            context,
            config.poll_delay.max(MIN_POLL_DELAY),
            self.observer.clone(),
            shutdown_rx,
        ));
        Poller { shutdown, handle }
    }
}

/// Tick until shutdown. Each tick runs to completion before the next.
async fn run_poll_loop(
    mut context: PollContext,
    delay: Duration,
    observer: Arc<dyn PipelineObserver>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        queue_url = %context.queue_url(),
        delay_ms = delay_millis(delay),
        "Poll loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => match context.poll_once().await {
                Ok(outcome) => observer.on_poll(&outcome),
                Err(e) => {
                    report_poll_error(&e);
                    observer.on_poll_error(&e);
                }
            },
        }
    }

    debug!(queue_url = %context.queue_url(), "Poll loop stopped");
}

/// Delay in whole milliseconds, saturating at `u64::MAX`.
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn report_poll_error(error: &PollError) {
    match error {
        PollError::Receive(e) => warn!(error = %e, "Poll tick failed"),
        PollError::Delivery {
            message_id,
            acknowledged,
            source,
        } => warn!(
            message_id = %message_id,
            acknowledged = acknowledged,
            error = %source,
            "Downstream failed to process notification"
        ),
    }
}

#[async_trait]
impl ConsumerLifecycle for SnsConsumer {
    async fn start(&self) -> Result<(), LifecycleError> {
        SnsConsumer::start(self).await
    }

    async fn stop(&self) {
        SnsConsumer::stop(self).await;
    }
}

impl Drop for SnsConsumer {
    fn drop(&mut self) {
        if let Some(poller) = self.inner.get_mut().poller.take() {
            let _ = poller.shutdown.send(true);
        }
    }
}

impl fmt::Display for SnsConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Consumer[{}]", self.endpoint.redacted_uri())
    }
}

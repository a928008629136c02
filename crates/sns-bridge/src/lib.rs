//! # SNS Bridge - Topic to Queue Notification Bridge
//!
//! Subscribes a queue to a pub/sub topic, drains the queue, checks each
//! notification's signature, filters duplicates, and hands verified payloads
//! to a downstream collaborator.
//!
//! ## Architecture
//!
//! Hexagonal, like every crate in the workspace:
//! - **Domain Layer** (`domain/`): identities, configuration, envelope,
//!   duplicate filter, queue policy. No I/O.
//! - **Ports Layer** (`ports/`): remote services, signing key, downstream,
//!   observer, consumer lifecycle
//! - **Service Layer** (`service/`): provisioning, verification, the poll
//!   pipeline, consumer and producer
//! - **Adapters** (`adapters/`): in-memory cloud, certificate fetch, AWS SDK
//!
//! ## Flow
//!
//! ```text
//!  start()                          every poll tick
//!  ───────                          ───────────────
//!  resolve/create topic             receive ≤1 message
//!  resolve/create queue + policy    decode envelope
//!  subscribe queue → topic          verify signature (optional)
//!  spawn poll loop                  dedupe by message id (optional)
//!                                   deliver downstream
//!  stop()                           delete from queue (always)
//!  ──────
//!  cancel loop, unsubscribe (unless topic deleted), delete topic/queue
//! ```
//!
//! ## Known limitations
//!
//! - Duplicate filtering is bounded (100 ids) and forgets on restart
//! - Messages that fail verification are deleted; there is no dead-letter path

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::certificate::{HttpCertificateSource, StaticKeySource, SIGNING_CERT_URL};
pub use adapters::downstream::{ChannelDownstream, SubjectFilter};
pub use adapters::memory::{sign_envelope, InMemoryCloud};
pub use domain::channel::{redact_credentials, ChannelUri};
pub use domain::config::{Credentials, EndpointConfig};
pub use domain::entities::{
    DeliveredMessage, Disposition, HeaderField, NotificationHeaders, PollOutcome, ReceivedMessage,
};
pub use domain::envelope::NotificationEnvelope;
pub use domain::errors::{
    ChannelUriError, DeliveryError, LifecycleError, PollError, ProvisioningError, PublishError,
    RemoteError, VerificationError,
};
pub use domain::idempotency::IdempotencyCache;
pub use domain::identity::{queue_url_from_arn, QueueRef, ResolvedQueue, TopicRef};
pub use ports::inbound::ConsumerLifecycle;
pub use ports::outbound::{
    Downstream, NoOpObserver, NotificationService, PipelineObserver, QueueService,
    SigningKeySource,
};
pub use service::consumer::{LifecycleState, SnsConsumer};
pub use service::endpoint::SnsEndpoint;
pub use service::producer::SnsProducer;
pub use service::verifier::SignatureVerifier;

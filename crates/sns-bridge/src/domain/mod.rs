//! # Domain Layer
//!
//! Pure bridge logic with no I/O: resource identities, channel configuration,
//! the notification envelope, the duplicate filter and the queue policy.
//! This is the inner layer of the hexagonal architecture.

pub mod channel;
pub mod config;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod idempotency;
pub mod identity;
pub mod policy;

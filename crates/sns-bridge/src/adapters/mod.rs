//! # Adapters
//!
//! Implementations of the outbound ports:
//! - `memory`: in-process notification and queue services
//! - `certificate`: signing key sources
//! - `downstream`: channel and subject-filter downstreams
//! - `aws`: SDK-backed services (feature `aws`)

#[cfg(feature = "aws")]
pub mod aws;
pub mod certificate;
pub mod downstream;
pub mod memory;

//! # Service Layer
//!
//! Wires domain logic to the ports: provisioning, signature verification,
//! the per-tick delivery pipeline, and the consumer/producer built from an
//! endpoint.

pub mod consumer;
pub mod endpoint;
pub mod poll;
pub mod producer;
pub mod provisioner;
pub mod verifier;

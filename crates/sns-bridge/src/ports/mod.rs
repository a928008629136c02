//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: lifecycle API the routing layer drives
//! - **Outbound (Driven)**: remote services, key source, downstream, observer

pub mod inbound;
pub mod outbound;

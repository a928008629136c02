//! # Bridge Runtime
//!
//! Process wiring for the SNS bridge binary.
//!
//! - `config` - command line and environment configuration
//! - `adapters/` - observer and downstream implementations that connect the
//!   core pipeline to telemetry and logs

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;

pub use adapters::downstream::LoggingDownstream;
pub use adapters::metrics::PrometheusObserver;
pub use config::RuntimeArgs;

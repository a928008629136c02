//! # Adapter Implementations
//!
//! Implementations of the bridge's outbound ports that live at the process
//! edge:
//! 1. `PrometheusObserver` maps poll outcomes onto the bridge counters
//! 2. `LoggingDownstream` writes each delivered notification to the log

pub mod downstream;
pub mod metrics;

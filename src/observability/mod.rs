//! # Observability
//!
//! Prometheus metrics collection for the controller.

pub mod metrics;

// Re-export for convenience
pub use metrics::*;

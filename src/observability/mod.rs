//! Observability module providing logging and metrics.
//!
//! This module initializes and configures:
//! - Structured logging with configurable formats (pretty, compact, JSON)
//! - Prometheus metrics for inbound decisions, outbound clients and the cache

pub mod metrics;
mod tracing_init;

pub use tracing_init::*;

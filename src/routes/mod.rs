//! HTTP routes.
//!
//! - [`data`]: the OPA data API route answering authorization decisions
//! - [`health`]: liveness, health and metrics on the internal listener

pub mod data;
pub mod health;

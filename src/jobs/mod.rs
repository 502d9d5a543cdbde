//! Background jobs.
//!
//! - **Cache server refresh**: re-resolves the Redis cache server
//!   addresses so that scaled or rescheduled cache pods are picked up.
//!
//! Jobs run in a loop at a configured interval. A failed pass is logged and
//! retried at the next interval.

#[cfg(feature = "redis")]
mod cache_refresh;

#[cfg(feature = "redis")]
pub use cache_refresh::start_cache_refresh_worker;

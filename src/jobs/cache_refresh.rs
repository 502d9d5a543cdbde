//! Cache server refresh worker.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::cache::RedisCache;

/// Periodically re-resolve the Redis cache servers.
///
/// The server list is resolved once when the cache is built; this worker
/// only handles the subsequent refreshes. It runs until the task is
/// cancelled.
pub async fn start_cache_refresh_worker(cache: Arc<RedisCache>, interval: Duration) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Starting cache server refresh worker"
    );

    loop {
        tokio::time::sleep(interval).await;

        let start = Instant::now();
        match cache.refresh().await {
            Ok(servers) => {
                tracing::debug!(
                    servers,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Cache server refresh complete"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Cache server refresh failed, keeping previous servers"
                );
            }
        }
    }
}

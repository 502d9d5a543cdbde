use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;

/// Byte-oriented key/value store for upstream responses.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get raw bytes from cache
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set raw bytes in cache with TTL
    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> CacheResult<()>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

mod error;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod traits;

use std::sync::Arc;

pub use error::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::RedisCache;
pub use traits::Cache;

use crate::config::CacheConfig;

/// A constructed cache along with the handle the refresh job needs.
pub struct CacheHandles {
    pub cache: Arc<dyn Cache>,
    #[cfg(feature = "redis")]
    pub redis: Option<Arc<RedisCache>>,
}

/// Build the configured cache, or `None` when caching is disabled.
pub async fn from_config(config: &CacheConfig) -> CacheResult<Option<CacheHandles>> {
    match config {
        CacheConfig::None => Ok(None),
        CacheConfig::Memory(_) => Ok(Some(CacheHandles {
            cache: Arc::new(MemoryCache::new()),
            #[cfg(feature = "redis")]
            redis: None,
        })),
        #[cfg(feature = "redis")]
        CacheConfig::Redis(redis_config) => {
            let redis = Arc::new(RedisCache::from_config(redis_config).await?);
            Ok(Some(CacheHandles {
                cache: redis.clone(),
                redis: Some(redis),
            }))
        }
        #[cfg(not(feature = "redis"))]
        CacheConfig::Redis(_) => Err(CacheError::Internal(
            "redis cache requires the 'redis' feature".into(),
        )),
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No cache servers available")]
    NoServers,

    #[error("Timed out connecting to cache server {0}")]
    ConnectTimeout(String),

    #[error("Cache command {0} timed out")]
    CommandTimeout(&'static str),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[cfg(feature = "redis")]
    #[error("Failed to resolve cache server {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: hickory_resolver::ResolveError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

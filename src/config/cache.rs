use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Cache configuration for access review responses.
///
/// When a cache is configured, successful AMS responses are stored under a
/// key bound to the bearer token and the request, and served until they
/// expire. Expiry is the only eviction mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CacheConfig {
    /// No caching. Every decision reaches AMS.
    #[default]
    None,

    /// In-process cache. Each replica keeps its own entries.
    Memory(MemoryCacheConfig),

    /// One or more Redis servers, shared between replicas.
    Redis(RedisCacheConfig),
}

impl CacheConfig {
    pub fn is_none(&self) -> bool {
        matches!(self, CacheConfig::None)
    }

    /// Time after which cached entries expire.
    pub fn expire(&self) -> Duration {
        match self {
            CacheConfig::None => Duration::from_secs(default_expire()),
            CacheConfig::Memory(c) => Duration::from_secs(c.expire_secs),
            CacheConfig::Redis(c) => Duration::from_secs(c.expire_secs),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CacheConfig::None => Ok(()),
            CacheConfig::Memory(c) => c.validate(),
            CacheConfig::Redis(c) => c.validate(),
        }
    }
}

/// In-memory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryCacheConfig {
    /// Time after which entries expire, in seconds.
    #[serde(default = "default_expire")]
    pub expire_secs: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            expire_secs: default_expire(),
        }
    }
}

impl MemoryCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.expire_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.expire_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Redis cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisCacheConfig {
    /// Redis server addresses as `host:port`. Host names are resolved
    /// through DNS and every resolved address becomes a cache server.
    pub servers: Vec<String>,

    /// Time after which keys expire, in seconds.
    #[serde(default = "default_expire")]
    pub expire_secs: u64,

    /// Interval at which server addresses are re-resolved, in seconds.
    /// Use 0 to resolve once at startup and keep that set.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Key prefix for all cache keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Timeout in seconds for connecting to a server and, separately,
    /// for each command sent to it.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl RedisCacheConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        #[cfg(not(feature = "redis"))]
        return Err(ConfigError::Validation(
            "cache type 'redis' requires the 'redis' feature".into(),
        ));

        #[cfg(feature = "redis")]
        {
            if self.servers.is_empty() {
                return Err(ConfigError::Validation(
                    "cache.servers must list at least one Redis address".into(),
                ));
            }
            for server in &self.servers {
                split_host_port(server).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "invalid cache server address '{server}', expected host:port"
                    ))
                })?;
            }
            if self.expire_secs == 0 {
                return Err(ConfigError::Validation(
                    "cache.expire_secs must be greater than 0".into(),
                ));
            }
            Ok(())
        }
    }
}

/// Split `host:port` (or `[v6]:port`) into its parts.
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

fn default_expire() -> u64 {
    3600 // 1 hour
}

fn default_interval() -> u64 {
    10
}

fn default_key_prefix() -> String {
    "opa-ams:".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

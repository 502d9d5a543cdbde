use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use hickory_resolver::{
    Resolver, TokioResolver, name_server::TokioConnectionProvider, system_conf::read_system_conf,
};
use parking_lot::RwLock;
use redis::{RedisResult, aio::MultiplexedConnection};
use sha2::{Digest, Sha256};

use super::{
    error::{CacheError, CacheResult},
    traits::Cache,
};
use crate::config::{RedisCacheConfig, split_host_port};

/// One resolved Redis server.
struct RedisServer {
    addr: SocketAddr,
    client: redis::Client,
}

/// Redis cache spread over a set of independent servers.
///
/// Each configured `host:port` is resolved through DNS and every resolved
/// address becomes a server. Keys are routed to one server by a stable hash
/// modulo the current server list, so a headless service with several
/// Redis pods shares the key space without clustering.
///
/// The server list is replaced as a whole by [`RedisCache::refresh`].
/// Readers take a snapshot `Arc` and never see a partially updated list.
pub struct RedisCache {
    targets: Vec<(String, u16)>,
    servers: RwLock<Arc<Vec<RedisServer>>>,
    resolver: TokioResolver,
    key_prefix: String,
    /// Bounds connecting and, separately, each command.
    timeout: Duration,
}

impl RedisCache {
    pub async fn from_config(config: &RedisCacheConfig) -> CacheResult<Self> {
        let targets = config
            .servers
            .iter()
            .map(|server| {
                split_host_port(server)
                    .map(|(host, port)| (host.to_string(), port))
                    .ok_or_else(|| {
                        CacheError::Internal(format!("invalid cache server address '{server}'"))
                    })
            })
            .collect::<CacheResult<Vec<_>>>()?;

        let cache = Self {
            targets,
            servers: RwLock::new(Arc::new(Vec::new())),
            resolver: system_resolver()?,
            key_prefix: config.key_prefix.clone(),
            timeout: Duration::from_secs(config.connect_timeout_secs),
        };

        // The initial resolution must succeed; later failures keep the last good list
        cache.refresh().await?;

        Ok(cache)
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Re-resolve the configured addresses and swap in the new server list.
    ///
    /// Returns the number of servers now in use. On error the previous list
    /// stays in place.
    pub async fn refresh(&self) -> CacheResult<usize> {
        let mut addrs = Vec::new();
        for (host, port) in &self.targets {
            if let Ok(ip) = host.parse::<IpAddr>() {
                addrs.push(SocketAddr::new(ip, *port));
                continue;
            }

            let lookup = self
                .resolver
                .lookup_ip(host.as_str())
                .await
                .map_err(|source| CacheError::Resolve {
                    host: host.clone(),
                    source,
                })?;
            addrs.extend(lookup.iter().map(|ip| SocketAddr::new(ip, *port)));
        }

        addrs.sort();
        addrs.dedup();

        if addrs.is_empty() {
            return Err(CacheError::NoServers);
        }

        let current = self.servers.read().clone();
        if current.iter().map(|s| s.addr).eq(addrs.iter().copied()) {
            return Ok(current.len());
        }

        let servers = addrs
            .into_iter()
            .map(|addr| {
                let client = redis::Client::open(format!("redis://{addr}"))?;
                Ok(RedisServer { addr, client })
            })
            .collect::<CacheResult<Vec<_>>>()?;

        let count = servers.len();
        tracing::info!(
            servers = ?servers.iter().map(|s| s.addr.to_string()).collect::<Vec<_>>(),
            "Updated cache server list"
        );
        *self.servers.write() = Arc::new(servers);

        Ok(count)
    }

    /// Open a connection to the server owning `key`.
    async fn get_connection(&self, key: &str) -> CacheResult<MultiplexedConnection> {
        let servers = self.servers.read().clone();
        if servers.is_empty() {
            return Err(CacheError::NoServers);
        }

        let server = &servers[shard(key, servers.len())];
        tokio::time::timeout(
            self.timeout,
            server.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::ConnectTimeout(server.addr.to_string()))?
        .map_err(CacheError::from)
    }

    /// Run one command under the deadline. A server that accepts the
    /// connection and then stalls would otherwise hold the decision.
    async fn bounded<T>(
        &self,
        command: &'static str,
        query: impl Future<Output = RedisResult<T>>,
    ) -> CacheResult<T> {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| CacheError::CommandTimeout(command))?
            .map_err(CacheError::from)
    }
}

/// Stable index of the server owning `key`.
fn shard(key: &str, servers: usize) -> usize {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % servers as u64) as usize
}

fn system_resolver() -> CacheResult<TokioResolver> {
    // Try to use system configuration, fall back to default if not available
    match read_system_conf() {
        Ok((config, opts)) => Ok(Resolver::builder_with_config(
            config,
            TokioConnectionProvider::default(),
        )
        .with_options(opts)
        .build()),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to read system DNS config, using default"
            );
            Resolver::builder_tokio()
                .map(|builder| builder.build())
                .map_err(|e| CacheError::Internal(format!("failed to build DNS resolver: {e}")))
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let full_key = self.prefixed_key(key);
        let mut conn = self.get_connection(&full_key).await?;

        let data: Option<Vec<u8>> = self
            .bounded(
                "GET",
                redis::cmd("GET").arg(&full_key).query_async(&mut conn),
            )
            .await?;

        Ok(data)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let full_key = self.prefixed_key(key);
        let mut conn = self.get_connection(&full_key).await?;

        if ttl.as_secs() > 0 {
            self.bounded::<()>(
                "SETEX",
                redis::cmd("SETEX")
                    .arg(&full_key)
                    .arg(ttl.as_secs())
                    .arg(value)
                    .query_async(&mut conn),
            )
            .await?;
        } else {
            self.bounded::<()>(
                "PSETEX",
                redis::cmd("PSETEX")
                    .arg(&full_key)
                    .arg(ttl.as_millis().max(1) as u64)
                    .arg(value)
                    .query_async(&mut conn),
            )
            .await?;
        }

        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let servers = self.servers.read().clone();
        if servers.is_empty() {
            return Err(CacheError::NoServers);
        }

        for server in servers.iter() {
            let mut conn = tokio::time::timeout(
                self.timeout,
                server.client.get_multiplexed_async_connection(),
            )
            .await
            .map_err(|_| CacheError::ConnectTimeout(server.addr.to_string()))??;
            self.bounded::<String>("PING", redis::cmd("PING").query_async(&mut conn))
                .await?;
        }

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

use std::{net::IpAddr, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind both listeners to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port for the public decision endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for the internal health and metrics endpoints.
    /// Set to 0 to disable the internal server.
    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    /// Request body size limit in bytes for decision queries.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// How long in-flight requests may run after a shutdown signal
    /// before the listeners are dropped.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            internal_port: default_internal_port(),
            body_limit_bytes: default_body_limit(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn internal_enabled(&self) -> bool {
        self.internal_port != 0
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.body_limit_bytes must be greater than 0".into(),
            ));
        }
        if self.internal_enabled() && self.internal_port == self.port {
            return Err(ConfigError::Validation(format!(
                "server.internal_port must differ from server.port ({})",
                self.port
            )));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_internal_port() -> u16 {
    8081
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_shutdown_grace() -> u64 {
    30
}

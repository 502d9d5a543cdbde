//! Configuration module for the OPA/AMS bridge.
//!
//! The bridge is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [ams]
//! url = "https://api.openshift.com"
//! resource_type_prefix = "observatorium"
//!
//! [ams.mappings]
//! team-a = ["org-1", "org-2"]
//!
//! [oidc]
//! issuer_url = "https://sso.example.com/auth/realms/main"
//! client_id = "opa-ams"
//! client_secret = "${OIDC_CLIENT_SECRET}"
//!
//! [opa]
//! package = "observatorium"
//! rule = "allow"
//! ```

mod ams;
mod cache;
mod observability;
mod oidc;
mod opa;
mod server;

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

pub use ams::*;
pub use cache::*;
pub use observability::*;
pub use oidc::*;
pub use opa::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Public and internal HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream AMS endpoint and tenant mappings.
    pub ams: AmsConfig,

    /// Client-credentials settings for the identity provider.
    pub oidc: OidcConfig,

    /// OPA package/rule naming for the decision route.
    #[serde(default)]
    pub opa: OpaConfig,

    /// Short-term cache for access review responses.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: BridgeConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.ams.validate()?;
        self.oidc.validate()?;
        self.opa.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Unable to read mappings file {1}: {0}")]
    MappingsIo(std::io::Error, PathBuf),

    #[error("Unable to parse contents of {1}: {0}")]
    MappingsParse(serde_json::Error, PathBuf),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR_RE.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

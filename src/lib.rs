//! OPA external-data bridge to the AMS access review API.
//!
//! OPA posts `{"input": {permission, resource, subject, tenant}}` to the
//! data route; the bridge maps the tenant to its AMS organizations, asks
//! AMS about each in turn, and answers `{"result": <bool>}`.

pub mod ams;
pub mod auth;
pub mod authz;
pub mod cache;
pub mod config;
pub mod jobs;
pub mod middleware;
pub mod observability;
pub mod routes;

#[cfg(test)]
mod tests;

use std::sync::Arc;
#[cfg(feature = "redis")]
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::{
    ams::{AmsClient, AmsTransport, ReviewClient},
    auth::{AuthError, ClientCredentialsTokenSource, TokenSource},
    authz::{Authorizer, TenantMapping},
    cache::{Cache, CacheError},
    config::{BridgeConfig, ConfigError},
};

/// Shared state of the decision and health routes.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<Authorizer>,
    pub tenants: Arc<TenantMapping>,
    pub resource_type_prefix: Arc<str>,
    pub cache: Option<Arc<dyn Cache>>,
    /// Instance name recorded on every request span.
    pub instance_name: Option<Arc<str>>,
}

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Failed to initialize cache: {0}")]
    Cache(#[from] CacheError),
}

/// A wired bridge: request state plus whatever background work it needs.
pub struct Bridge {
    pub state: AppState,
    #[cfg(feature = "redis")]
    redis_refresh: Option<(Arc<cache::RedisCache>, Duration)>,
}

impl Bridge {
    /// Build the bridge from configuration.
    ///
    /// Runs OIDC discovery and resolves the cache servers, so an
    /// unreachable identity provider or cache fails startup.
    pub async fn from_config(config: &BridgeConfig) -> Result<Self, StartupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("opa-ams/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StartupError::HttpClient)?;

        let tokens: Arc<dyn TokenSource> = Arc::new(
            ClientCredentialsTokenSource::discover(&config.oidc, http_client.clone())
                .await?
                .with_timeout(config.ams.request_timeout()),
        );

        Self::with_token_source(config, http_client, tokens).await
    }

    /// Build the bridge around an existing token source.
    pub async fn with_token_source(
        config: &BridgeConfig,
        http_client: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, StartupError> {
        let tenants = config.ams.tenant_mapping()?;

        if config.ams.request_timeout().is_none() {
            tracing::warn!(
                "ams.request_timeout_secs is not set; access review calls have no deadline"
            );
        }

        let mut transport =
            AmsTransport::new(http_client, config.ams.access_review_url()?, tokens)
                .with_timeout(config.ams.request_timeout());

        let handles = cache::from_config(&config.cache).await?;
        let cache = handles.as_ref().map(|h| h.cache.clone());
        if let Some(cache) = &cache {
            tracing::info!(
                backend = cache.backend(),
                expire_secs = config.cache.expire().as_secs(),
                "Access review cache enabled"
            );
            transport = transport.with_cache(cache.clone(), config.cache.expire());
        }

        #[cfg(feature = "redis")]
        let redis_refresh = match (&config.cache, handles.and_then(|h| h.redis)) {
            (crate::config::CacheConfig::Redis(redis_config), Some(redis)) => redis_config
                .refresh_interval()
                .map(|interval| (redis, interval)),
            _ => None,
        };

        tracing::info!(
            url = %transport.url(),
            tenants = tenants.len(),
            "AMS client configured"
        );

        let client: Arc<dyn ReviewClient> = Arc::new(AmsClient::new(transport));

        Ok(Self {
            state: AppState {
                authorizer: Arc::new(Authorizer::new(client)),
                tenants: Arc::new(tenants),
                resource_type_prefix: config.ams.resource_type_prefix.as_str().into(),
                cache,
                instance_name: config
                    .observability
                    .logging
                    .name
                    .as_deref()
                    .map(Arc::from),
            },
            #[cfg(feature = "redis")]
            redis_refresh,
        })
    }

    /// Spawn background jobs. The returned handles are aborted at shutdown.
    pub fn spawn_jobs(&self) -> Vec<tokio::task::JoinHandle<()>> {
        #[allow(unused_mut)]
        let mut handles = Vec::new();

        #[cfg(feature = "redis")]
        if let Some((redis, interval)) = &self.redis_refresh {
            handles.push(tokio::spawn(jobs::start_cache_refresh_worker(
                redis.clone(),
                *interval,
            )));
        }

        handles
    }
}

/// The public router: the OPA data route.
pub fn build_app(config: &BridgeConfig, state: AppState) -> Router {
    Router::new()
        .route(&config.opa.data_path(), any(routes::data::decide))
        .layer(axum::middleware::from_fn(
            middleware::http_metrics_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.instance_name.clone(),
            middleware::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .with_state(state)
}

/// The internal router: health and metrics.
pub fn build_internal_app(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(routes::health::liveness))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .with_state(state)
}

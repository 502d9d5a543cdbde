//! OAuth2 client-credentials token source.
//!
//! Tokens are cached as a pre-formatted `Arc<str>` header value. Every
//! access review call needs one, so the read path is a lock read and a
//! reference count increment.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{AuthError, DiscoveryDocument, fetch_discovery};
use crate::{config::OidcConfig, observability::metrics};

/// Refresh this long before the token actually expires.
const TOKEN_REFRESH_BUFFER_SECS: u64 = 10;

/// Supplies the `Authorization` header value for outbound calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A valid `"Bearer <token>"` header value.
    async fn bearer_header(&self) -> Result<Arc<str>, AuthError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    /// Pre-formatted header value: "Bearer {token}"
    bearer_header: Arc<str>,
    /// `None` when the identity provider did not say when it expires.
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token source backed by the client-credentials grant.
pub struct ClientCredentialsTokenSource {
    http_client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    audience: Option<String>,
    timeout: Option<Duration>,
    cached_token: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for ClientCredentialsTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsTokenSource")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl ClientCredentialsTokenSource {
    pub fn new(
        config: &OidcConfig,
        discovery: &DiscoveryDocument,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            token_endpoint: discovery.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            audience: config.audience.clone(),
            timeout: None,
            cached_token: RwLock::new(None),
        }
    }

    /// Bound each token request. A refresh holds the token lock, so an
    /// unbounded request would stall every caller behind it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run discovery for the configured issuer and build a token source
    /// for its token endpoint. No token is requested until first use.
    pub async fn discover(
        config: &OidcConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let discovery = fetch_discovery(config, &http_client).await?;
        tracing::info!(
            issuer = %discovery.issuer,
            token_endpoint = %discovery.token_endpoint,
            "Discovered OIDC token endpoint"
        );
        Ok(Self::new(config, &discovery, http_client))
    }

    async fn request_token(&self) -> Result<CachedToken, AuthError> {
        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(audience) = &self.audience {
            form.push(("audience", audience.as_str()));
        }

        let mut request = self
            .http_client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&form);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let start = Instant::now();
        let response = request.send().await;
        metrics::record_client_request(
            metrics::CLIENT_OAUTH,
            "POST",
            response.as_ref().ok().map(|r| r.status().as_u16()),
            start.elapsed(),
        );
        let response = response.map_err(AuthError::TokenRequest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(AuthError::InvalidTokenResponse(
                "missing access_token".to_string(),
            ));
        }
        if let Some(token_type) = &token.token_type
            && !token_type.eq_ignore_ascii_case("bearer")
        {
            return Err(AuthError::InvalidTokenResponse(format!(
                "unsupported token_type '{token_type}'"
            )));
        }

        let expires_at = token.expires_in.map(|secs| {
            Instant::now()
                + Duration::from_secs(secs)
                    .saturating_sub(Duration::from_secs(TOKEN_REFRESH_BUFFER_SECS))
        });

        tracing::debug!(
            expires_in = ?token.expires_in,
            "Acquired new client-credentials token"
        );

        Ok(CachedToken {
            bearer_header: format!("Bearer {}", token.access_token).into(),
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn bearer_header(&self) -> Result<Arc<str>, AuthError> {
        // Fast path: check if we have a valid cached token
        {
            let cache = self.cached_token.read().await;
            if let Some(ref cached) = *cache
                && !cached.is_expired()
            {
                return Ok(cached.bearer_header.clone());
            }
        }

        let mut cache = self.cached_token.write().await;

        // Double-check after acquiring write lock (another task may have refreshed)
        if let Some(ref cached) = *cache
            && !cached.is_expired()
        {
            return Ok(cached.bearer_header.clone());
        }

        let token = self.request_token().await?;
        let bearer_header = token.bearer_header.clone();
        *cache = Some(token);

        Ok(bearer_header)
    }
}

//! OIDC discovery.
//!
//! Only the issuer and token endpoint are used; everything else in the
//! document is ignored.

use std::time::Instant;

use super::AuthError;
use crate::{config::OidcConfig, observability::metrics};

/// Minimal OIDC discovery document.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub token_endpoint: String,
}

/// Fetch the discovery document for the configured issuer.
///
/// The document is fetched from `discovery_url` when set, else from the
/// issuer itself, and its `issuer` must name the configured issuer.
pub async fn fetch_discovery(
    config: &OidcConfig,
    http_client: &reqwest::Client,
) -> Result<DiscoveryDocument, AuthError> {
    let base = config.discovery_base_url();
    let url = if base.ends_with("/.well-known/openid-configuration") {
        base.to_string()
    } else {
        format!(
            "{}/.well-known/openid-configuration",
            base.trim_end_matches('/')
        )
    };

    tracing::debug!(url = %url, "Fetching OIDC discovery");

    let start = Instant::now();
    let response = http_client.get(&url).send().await;
    metrics::record_client_request(
        metrics::CLIENT_OAUTH,
        "GET",
        response.as_ref().ok().map(|r| r.status().as_u16()),
        start.elapsed(),
    );
    let response = response.map_err(|e| AuthError::Discovery(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    let doc: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("failed to parse document: {e}")))?;

    if doc.issuer.trim_end_matches('/') != config.issuer_url.trim_end_matches('/') {
        return Err(AuthError::IssuerMismatch {
            expected: config.issuer_url.clone(),
            actual: doc.issuer,
        });
    }

    if doc.token_endpoint.is_empty() {
        return Err(AuthError::Discovery(
            "document has no token_endpoint".to_string(),
        ));
    }

    Ok(doc)
}

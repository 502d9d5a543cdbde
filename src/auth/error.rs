use thiserror::Error;

/// Errors from the identity provider: discovery at startup, token requests
/// afterwards.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to fetch OIDC discovery: {0}")]
    Discovery(String),

    #[error("OIDC issuer mismatch: expected {expected}, discovery returned {actual}")]
    IssuerMismatch { expected: String, actual: String },

    #[error("Token request failed: {0}")]
    TokenRequest(#[source] reqwest::Error),

    #[error("Token endpoint returned {status}: {body}")]
    TokenStatus { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),
}

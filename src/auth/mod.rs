//! Outbound credentials for calls to AMS.
//!
//! The bridge authenticates to AMS with an OAuth2 client-credentials token
//! obtained from the identity provider named by the OIDC issuer.

mod client_credentials;
mod discovery;
mod error;

pub use client_credentials::{ClientCredentialsTokenSource, TokenSource};
pub use discovery::{DiscoveryDocument, fetch_discovery};
pub use error::AuthError;

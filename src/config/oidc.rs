use serde::{Deserialize, Serialize};

use super::ConfigError;

/// OAuth2 client-credentials configuration for the identity provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
    /// The OIDC issuer URL. Discovery is performed against
    /// `<issuer_url>/.well-known/openid-configuration`.
    pub issuer_url: String,

    /// OAuth2 client ID.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: String,

    /// Audience for whom the access token is intended. Sent as the
    /// `audience` parameter of the token request when set.
    #[serde(default)]
    pub audience: Option<String>,

    /// Base URL to fetch the discovery document from, if it differs from
    /// the issuer (e.g. an in-cluster service address). The discovered
    /// issuer is still checked against `issuer_url`.
    #[serde(default)]
    pub discovery_url: Option<String>,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"****")
            .field("audience", &self.audience)
            .field("discovery_url", &self.discovery_url)
            .finish()
    }
}

impl OidcConfig {
    /// Base URL used for the discovery request.
    pub fn discovery_base_url(&self) -> &str {
        self.discovery_url.as_deref().unwrap_or(&self.issuer_url)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer_url.is_empty() {
            return Err(ConfigError::Validation(
                "oidc.issuer_url cannot be empty".into(),
            ));
        }
        url::Url::parse(self.discovery_base_url())
            .map_err(|e| ConfigError::Validation(format!("invalid OIDC discovery URL: {e}")))?;
        if self.client_id.is_empty() {
            return Err(ConfigError::Validation("oidc.client_id cannot be empty".into()));
        }
        if self.audience.as_deref() == Some("") {
            return Err(ConfigError::Validation(
                "oidc.audience cannot be empty when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OidcConfig {
        OidcConfig {
            issuer_url: "https://sso.example.com/realms/main".into(),
            client_id: "opa-ams".into(),
            client_secret: "hunter2".into(),
            audience: None,
            discovery_url: None,
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("opa-ams"));
    }

    #[test]
    fn test_discovery_url_override() {
        let mut cfg = config();
        assert_eq!(cfg.discovery_base_url(), "https://sso.example.com/realms/main");
        cfg.discovery_url = Some("http://keycloak.sso.svc:8080/realms/main".into());
        assert_eq!(
            cfg.discovery_base_url(),
            "http://keycloak.sso.svc:8080/realms/main"
        );
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());

        let mut cfg = config();
        cfg.issuer_url = "relative/path".into();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.client_id = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.audience = Some(String::new());
        assert!(cfg.validate().is_err());
    }
}

use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;
use crate::{ams::ACCESS_REVIEW_ENDPOINT, authz::TenantMapping};

/// Upstream AMS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmsConfig {
    /// Base URL of the AMS API. The access review path is appended to it.
    pub url: String,

    /// Prefix added to the resource name in access review requests.
    /// Both halves are title-cased, e.g. `observatorium` + `logs`
    /// becomes `ObservatoriumLogs`.
    #[serde(default)]
    pub resource_type_prefix: String,

    /// Inline tenant to organization ID mappings. List order is the
    /// order in which organizations are consulted.
    #[serde(default)]
    pub mappings: HashMap<String, Vec<String>>,

    /// Path to a JSON file containing a flat map from tenant to a list of
    /// organization IDs. Entries override inline mappings for the same tenant.
    #[serde(default)]
    pub mappings_path: Option<PathBuf>,

    /// Deadline for each access review call in seconds. When unset, no
    /// explicit deadline is applied and a slow upstream holds the request
    /// for as long as the connection stays open.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl AmsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.access_review_url()?;

        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "ams.request_timeout_secs must be greater than 0 when set".into(),
            ));
        }

        validate_mappings(&self.mappings, "ams.mappings")
    }

    /// The full access review URL: the configured base joined with
    /// [`ACCESS_REVIEW_ENDPOINT`].
    pub fn access_review_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ConfigError::Validation(format!("invalid AMS URL: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "invalid AMS URL: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            ACCESS_REVIEW_ENDPOINT.trim_start_matches('/')
        );
        url.set_path(&path);
        Ok(url)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Build the tenant mapping from the inline table and, if configured,
    /// the JSON mappings file. File entries win for tenants defined in both.
    pub fn tenant_mapping(&self) -> Result<TenantMapping, ConfigError> {
        let mut mapping = TenantMapping::from(self.mappings.clone());

        if let Some(path) = &self.mappings_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::MappingsIo(e, path.clone()))?;
            let from_file: HashMap<String, Vec<String>> = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::MappingsParse(e, path.clone()))?;

            validate_mappings(&from_file, &path.display().to_string())?;

            tracing::debug!(
                path = %path.display(),
                tenants = from_file.len(),
                "Loaded tenant mappings file"
            );
            mapping.merge(from_file);
        }

        Ok(mapping)
    }
}

/// Reject empty tenant names and empty organization IDs. `source` names
/// where the mappings came from.
fn validate_mappings(
    mappings: &HashMap<String, Vec<String>>,
    source: &str,
) -> Result<(), ConfigError> {
    for (tenant, orgs) in mappings {
        if tenant.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{source} contains an empty tenant name"
            )));
        }
        if orgs.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(format!(
                "{source}: tenant {tenant} has an empty organization ID"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config(url: &str) -> AmsConfig {
        AmsConfig {
            url: url.to_string(),
            resource_type_prefix: String::new(),
            mappings: HashMap::new(),
            mappings_path: None,
            request_timeout_secs: None,
        }
    }

    #[test]
    fn test_access_review_url_joins_path() {
        assert_eq!(
            config("https://ams.example.com").access_review_url().unwrap().as_str(),
            "https://ams.example.com/api/authorizations/v1/access_review"
        );
        assert_eq!(
            config("http://localhost:8000/prefix/")
                .access_review_url()
                .unwrap()
                .as_str(),
            "http://localhost:8000/prefix/api/authorizations/v1/access_review"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(config("not a url").validate().is_err());
        assert!(config("ftp://ams.example.com").validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut cfg = config("https://ams.example.com");
        cfg.request_timeout_secs = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_mappings_file_overrides_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"team-a": ["org-9"], "team-c": ["org-3", "org-4"]}}"#).unwrap();

        let mut cfg = config("https://ams.example.com");
        cfg.mappings
            .insert("team-a".into(), vec!["org-1".into(), "org-2".into()]);
        cfg.mappings.insert("team-b".into(), vec!["org-5".into()]);
        cfg.mappings_path = Some(file.path().to_path_buf());

        let mapping = cfg.tenant_mapping().unwrap();
        assert_eq!(mapping.get("team-a").unwrap().as_slice(), ["org-9"]);
        assert_eq!(mapping.get("team-b").unwrap().as_slice(), ["org-5"]);
        assert_eq!(mapping.get("team-c").unwrap().as_slice(), ["org-3", "org-4"]);
    }

    #[test]
    fn test_malformed_mappings_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"team-a": "org-1"}}"#).unwrap();

        let mut cfg = config("https://ams.example.com");
        cfg.mappings_path = Some(file.path().to_path_buf());

        assert!(matches!(
            cfg.tenant_mapping(),
            Err(ConfigError::MappingsParse(..))
        ));
    }

    #[test]
    fn test_mappings_file_entries_are_validated() {
        for contents in [r#"{"": ["org-1"]}"#, r#"{"team-a": ["org-1", ""]}"#] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, "{contents}").unwrap();

            let mut cfg = config("https://ams.example.com");
            cfg.mappings_path = Some(file.path().to_path_buf());

            assert!(
                matches!(cfg.tenant_mapping(), Err(ConfigError::Validation(_))),
                "accepted {contents}"
            );
        }
    }

    #[test]
    fn test_inline_empty_organization_rejected() {
        let mut cfg = config("https://ams.example.com");
        cfg.mappings.insert("team-a".into(), vec![String::new()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_mappings_file_errors() {
        let mut cfg = config("https://ams.example.com");
        cfg.mappings_path = Some(PathBuf::from("/nonexistent/opa-ams/mappings.json"));

        assert!(matches!(
            cfg.tenant_mapping(),
            Err(ConfigError::MappingsIo(..))
        ));
    }
}

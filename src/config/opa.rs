use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Prefix of the OPA data API.
pub const DATA_ENDPOINT: &str = "/v1/data";

static VALID_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z]\w*$").expect("rule pattern is valid"));
static VALID_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[_A-Za-z]\w*(\.[_A-Za-z]\w*)*$").expect("package pattern is valid")
});

/// Names of the OPA package and rule this bridge answers for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpaConfig {
    /// Dotted OPA package name, e.g. `observatorium.authz`.
    #[serde(default)]
    pub package: String,

    /// OPA rule name.
    #[serde(default = "default_rule")]
    pub rule: String,
}

impl Default for OpaConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            rule: default_rule(),
        }
    }
}

fn default_rule() -> String {
    "allow".to_string()
}

impl OpaConfig {
    /// Route path for decision queries: `/v1/data/<package path>/<rule>`.
    pub fn data_path(&self) -> String {
        let package = self.package.replace('.', "/");
        [DATA_ENDPOINT.trim_end_matches('/'), package.as_str(), self.rule.as_str()]
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !self.package.is_empty() && !VALID_PACKAGE.is_match(&self.package) {
            return Err(ConfigError::Validation(format!(
                "invalid OPA package name: {}",
                self.package
            )));
        }
        if !self.rule.is_empty() && !VALID_RULE.is_match(&self.rule) {
            return Err(ConfigError::Validation(format!(
                "invalid OPA rule name: {}",
                self.rule
            )));
        }
        Ok(())
    }
}

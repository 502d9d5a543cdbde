use serde::{Deserialize, Serialize};

/// Upstream action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Get,
    Create,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Create => "create",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single organization-scoped access review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessReview {
    pub action: Action,
    pub account_username: String,
    pub organization_id: String,
    pub resource_type: String,
}

/// The part of the AMS verdict the bridge uses.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessReviewResponse {
    pub allowed: bool,
}

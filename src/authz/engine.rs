//! Sequential organization fallback.

use std::sync::Arc;

use super::{AuthorizeError, OrganizationFailure, OrganizationIds};
use crate::ams::{AccessReview, Action, ReviewClient};

/// Decides access by asking AMS about each candidate organization.
pub struct Authorizer<C: ?Sized = dyn ReviewClient> {
    client: Arc<C>,
}

impl<C: ReviewClient + ?Sized> Authorizer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Review `organizations` one at a time, in order, and stop at the
    /// first that allows.
    ///
    /// Returns `Ok(false)` when every organization answered and none
    /// allowed (including an empty list). Returns an error only when no
    /// organization allowed and at least one review failed; the error lists
    /// every failure.
    pub async fn authorize(
        &self,
        action: Action,
        subject: &str,
        organizations: &OrganizationIds,
        resource_type: &str,
    ) -> Result<bool, AuthorizeError> {
        let mut failures = Vec::new();

        for organization_id in organizations {
            let review = AccessReview {
                action,
                account_username: subject.to_string(),
                organization_id: organization_id.clone(),
                resource_type: resource_type.to_string(),
            };

            match self.client.review(&review).await {
                Ok(true) => {
                    tracing::debug!(
                        organization_id = %organization_id,
                        "Access allowed by organization"
                    );
                    return Ok(true);
                }
                Ok(false) => {
                    tracing::debug!(
                        organization_id = %organization_id,
                        "Access denied by organization"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        organization_id = %organization_id,
                        error = %error,
                        "Access review failed"
                    );
                    failures.push(OrganizationFailure {
                        organization_id: organization_id.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(false)
        } else {
            Err(AuthorizeError::new(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use http::StatusCode;
    use parking_lot::Mutex;

    use super::*;
    use crate::ams::ReviewError;

    #[derive(Clone, Copy)]
    enum Outcome {
        Allow,
        Deny,
        Status(u16),
        Malformed,
    }

    /// Review client answering from a fixed table and recording every call.
    struct ScriptedClient {
        outcomes: HashMap<&'static str, Outcome>,
        calls: Mutex<Vec<AccessReview>>,
    }

    impl ScriptedClient {
        fn new(outcomes: &[(&'static str, Outcome)]) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn called_orgs(&self) -> Vec<String> {
            self.calls
                .lock()
                .iter()
                .map(|r| r.organization_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ReviewClient for ScriptedClient {
        async fn review(&self, review: &AccessReview) -> Result<bool, ReviewError> {
            self.calls.lock().push(review.clone());
            match self.outcomes[review.organization_id.as_str()] {
                Outcome::Allow => Ok(true),
                Outcome::Deny => Ok(false),
                Outcome::Status(code) => Err(ReviewError::Status(
                    StatusCode::from_u16(code).unwrap(),
                )),
                Outcome::Malformed => Err(ReviewError::Decode(
                    serde_json::from_str::<bool>("nope").unwrap_err(),
                )),
            }
        }
    }

    fn orgs(ids: &[&str]) -> OrganizationIds {
        ids.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[tokio::test]
    async fn test_first_grant_short_circuits() {
        let client = ScriptedClient::new(&[
            ("org-1", Outcome::Deny),
            ("org-2", Outcome::Allow),
            ("org-3", Outcome::Allow),
        ]);
        let authorizer = Authorizer::new(client.clone());

        let allowed = authorizer
            .authorize(Action::Get, "alice", &orgs(&["org-1", "org-2", "org-3"]), "Logs")
            .await
            .unwrap();

        assert!(allowed);
        assert_eq!(client.called_orgs(), ["org-1", "org-2"]);
    }

    #[tokio::test]
    async fn test_grant_after_failure_is_allowed() {
        let client = ScriptedClient::new(&[
            ("org-1", Outcome::Status(503)),
            ("org-2", Outcome::Allow),
        ]);
        let authorizer = Authorizer::new(client.clone());

        let allowed = authorizer
            .authorize(Action::Create, "alice", &orgs(&["org-1", "org-2"]), "Logs")
            .await
            .unwrap();

        assert!(allowed);
        assert_eq!(client.called_orgs(), ["org-1", "org-2"]);
    }

    #[tokio::test]
    async fn test_all_denied_is_not_an_error() {
        let client = ScriptedClient::new(&[("org-1", Outcome::Deny), ("org-2", Outcome::Deny)]);
        let authorizer = Authorizer::new(client.clone());

        let allowed = authorizer
            .authorize(Action::Get, "alice", &orgs(&["org-1", "org-2"]), "Logs")
            .await
            .unwrap();

        assert!(!allowed);
        assert_eq!(client.called_orgs().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_organizations() {
        let client = ScriptedClient::new(&[]);
        let authorizer = Authorizer::new(client.clone());

        let allowed = authorizer
            .authorize(Action::Get, "alice", &orgs(&[]), "Logs")
            .await
            .unwrap();

        assert!(!allowed);
        assert!(client.called_orgs().is_empty());
    }

    #[tokio::test]
    async fn test_all_failed_aggregates_every_error() {
        let client = ScriptedClient::new(&[
            ("org-1", Outcome::Status(502)),
            ("org-2", Outcome::Deny),
            ("org-3", Outcome::Malformed),
        ]);
        let authorizer = Authorizer::new(client.clone());

        let err = authorizer
            .authorize(Action::Get, "alice", &orgs(&["org-1", "org-2", "org-3"]), "Logs")
            .await
            .unwrap_err();

        let failed: Vec<_> = err
            .failures()
            .iter()
            .map(|f| f.organization_id.as_str())
            .collect();
        assert_eq!(failed, ["org-1", "org-3"]);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().starts_with("2 errors: "));
    }

    #[tokio::test]
    async fn test_review_fields() {
        let client = ScriptedClient::new(&[("org-7", Outcome::Deny)]);
        let authorizer = Authorizer::new(client.clone());

        authorizer
            .authorize(Action::Create, "bob", &orgs(&["org-7"]), "AcmeCluster")
            .await
            .unwrap();

        let calls = client.calls.lock();
        assert_eq!(
            calls[0],
            AccessReview {
                action: Action::Create,
                account_username: "bob".into(),
                organization_id: "org-7".into(),
                resource_type: "AcmeCluster".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_dyn_client() {
        let client: Arc<dyn ReviewClient> = ScriptedClient::new(&[("org-1", Outcome::Allow)]);
        let authorizer: Authorizer = Authorizer::new(client);

        assert!(
            authorizer
                .authorize(Action::Get, "alice", &orgs(&["org-1"]), "Logs")
                .await
                .unwrap()
        );
    }
}

//! Aggregated authorization errors.

use http::StatusCode;

use crate::ams::ReviewError;

/// One organization whose access review failed.
#[derive(Debug)]
pub struct OrganizationFailure {
    pub organization_id: String,
    pub error: ReviewError,
}

/// Every failed access review of a decision that no organization allowed,
/// in the order the organizations were consulted.
///
/// Denials are not failures and never appear here.
#[derive(Debug)]
pub struct AuthorizeError {
    failures: Vec<OrganizationFailure>,
}

impl AuthorizeError {
    pub(super) fn new(failures: Vec<OrganizationFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[OrganizationFailure] {
        &self.failures
    }

    /// Status to answer with: the last upstream status among the failures,
    /// or 500 if none of them got a response.
    pub fn status_code(&self) -> StatusCode {
        self.failures
            .iter()
            .rev()
            .find_map(|f| f.error.upstream_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for AuthorizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.failures.as_slice() {
            [] => f.write_str("no organization could be reviewed"),
            [only] => write!(f, "{}", only.error),
            failures => {
                write!(f, "{} errors: ", failures.len())?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}", failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AuthorizeError {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn failure(org: &str, error: ReviewError) -> OrganizationFailure {
        OrganizationFailure {
            organization_id: org.to_string(),
            error,
        }
    }

    #[test]
    fn test_single_failure_message() {
        let err = AuthorizeError::new(vec![failure(
            "org-1",
            ReviewError::Status(StatusCode::SERVICE_UNAVAILABLE),
        )]);
        assert_eq!(err.to_string(), "got non-200 status from upstream");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_multiple_failures_message() {
        let err = AuthorizeError::new(vec![
            failure("org-1", ReviewError::Status(StatusCode::BAD_GATEWAY)),
            failure("org-2", ReviewError::Timeout(Duration::from_secs(2))),
        ]);
        assert_eq!(
            err.to_string(),
            "2 errors: got non-200 status from upstream; request to upstream timed out after 2s"
        );
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_status_code_prefers_last_upstream_status() {
        let err = AuthorizeError::new(vec![
            failure("org-1", ReviewError::Status(StatusCode::BAD_GATEWAY)),
            failure("org-2", ReviewError::Status(StatusCode::TOO_MANY_REQUESTS)),
            failure("org-3", ReviewError::Timeout(Duration::from_secs(1))),
        ]);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AuthorizeError::new(vec![failure(
            "org-1",
            ReviewError::Timeout(Duration::from_secs(1)),
        )]);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use async_trait::async_trait;

use super::{AccessReview, AccessReviewResponse, AmsTransport, ReviewError};

/// Issues one organization-scoped access review.
#[async_trait]
pub trait ReviewClient: Send + Sync {
    /// Whether AMS allows the review.
    async fn review(&self, review: &AccessReview) -> Result<bool, ReviewError>;
}

/// [`ReviewClient`] backed by the AMS access review API.
pub struct AmsClient {
    transport: AmsTransport,
}

impl AmsClient {
    pub fn new(transport: AmsTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ReviewClient for AmsClient {
    async fn review(&self, review: &AccessReview) -> Result<bool, ReviewError> {
        let body = serde_json::to_vec(review).map_err(ReviewError::Encode)?;
        let response = self.transport.post_json(body).await?;

        if !response.status.is_success() {
            tracing::debug!(
                status = response.status.as_u16(),
                organization_id = %review.organization_id,
                body = %String::from_utf8_lossy(&response.body),
                "Access review rejected by upstream"
            );
            return Err(ReviewError::Status(response.status));
        }

        let verdict: AccessReviewResponse =
            serde_json::from_slice(&response.body).map_err(ReviewError::Decode)?;
        Ok(verdict.allowed)
    }
}

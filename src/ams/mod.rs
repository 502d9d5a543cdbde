//! Access review calls to the account management service (AMS).

mod client;
mod error;
mod transport;
mod types;

pub use client::{AmsClient, ReviewClient};
pub use error::ReviewError;
pub use transport::{AmsTransport, UpstreamResponse};
pub use types::{AccessReview, AccessReviewResponse, Action};

/// Path of the access review API, relative to the configured AMS base URL.
pub const ACCESS_REVIEW_ENDPOINT: &str = "/api/authorizations/v1/access_review";

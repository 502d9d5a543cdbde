//! Authorization decisions over a tenant's organizations.
//!
//! A tenant maps to an ordered list of AMS organizations. A decision asks
//! each organization in turn and is allowed as soon as one of them allows.

mod engine;
mod error;
mod tenants;

pub use engine::Authorizer;
pub use error::{AuthorizeError, OrganizationFailure};
pub use tenants::{OrganizationIds, TenantMapping};

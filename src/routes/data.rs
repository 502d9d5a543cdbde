//! OPA data API route.
//!
//! OPA queries the bridge as an external data source with
//! `{"input": {permission, resource, subject, tenant}}` and expects
//! `{"result": <bool>}` back.

use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{AppState, ams::Action, authz::AuthorizeError};

/// Permission vocabulary of the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn parse(permission: &str) -> Option<Self> {
        match permission {
            "read" => Some(Permission::Read),
            "write" => Some(Permission::Write),
            _ => None,
        }
    }

    /// The AMS action verb for this permission.
    pub fn action(self) -> Action {
        match self {
            Permission::Read => Action::Get,
            Permission::Write => Action::Create,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    #[serde(default)]
    input: DecisionInput,
}

/// The query OPA sends for a decision.
///
/// Absent fields decode as empty strings and are rejected by the permission
/// and tenant checks rather than by the decoder.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecisionInput {
    pub permission: String,
    pub resource: String,
    pub subject: String,
    pub tenant: String,
}

/// The verdict returned to OPA.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub result: bool,
}

/// Errors answering a decision query. Rendered as plain text.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("request must be a POST")]
    MethodNotAllowed,

    #[error("failed to read body")]
    ReadBody(#[source] BytesRejection),

    #[error("failed to unmarshal JSON")]
    Unmarshal(#[source] serde_json::Error),

    #[error("unknown permission")]
    UnknownPermission(String),

    #[error("unknown tenant")]
    UnknownTenant(String),

    #[error(transparent)]
    Authorize(#[from] AuthorizeError),
}

impl DecisionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DecisionError::MethodNotAllowed
            | DecisionError::UnknownPermission(_)
            | DecisionError::UnknownTenant(_) => StatusCode::BAD_REQUEST,
            DecisionError::ReadBody(_) | DecisionError::Unmarshal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DecisionError::Authorize(e) => e.status_code(),
        }
    }
}

impl IntoResponse for DecisionError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Answer a decision query.
///
/// Registered for every method so that non-POST requests get the same
/// plain-text 400 as other malformed queries.
#[tracing::instrument(name = "opa.decision", skip_all)]
pub async fn decide(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<DecisionResponse>, DecisionError> {
    let result = evaluate(&state, method, body).await;
    match &result {
        Err(e @ DecisionError::Authorize(_)) => tracing::warn!(error = %e, "Authorization failed"),
        Err(e) => tracing::debug!(error = ?e, "Rejected decision query"),
        Ok(_) => {}
    }
    result.map(|result| Json(DecisionResponse { result }))
}

async fn evaluate(
    state: &AppState,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Result<bool, DecisionError> {
    if method != Method::POST {
        return Err(DecisionError::MethodNotAllowed);
    }

    let body = body.map_err(DecisionError::ReadBody)?;
    let request: DecisionRequest =
        serde_json::from_slice(&body).map_err(DecisionError::Unmarshal)?;
    let input = request.input;

    let permission = Permission::parse(&input.permission)
        .ok_or_else(|| DecisionError::UnknownPermission(input.permission.clone()))?;

    // An empty list could never allow, so it is rejected like an unknown tenant
    let organizations = state
        .tenants
        .get(&input.tenant)
        .filter(|orgs| !orgs.is_empty())
        .ok_or_else(|| DecisionError::UnknownTenant(input.tenant.clone()))?;

    let resource_type = resource_type(&state.resource_type_prefix, &input.resource);

    tracing::debug!(
        subject = %input.subject,
        tenant = %input.tenant,
        action = %permission.action(),
        resource_type = %resource_type,
        organizations = organizations.len(),
        "Evaluating decision"
    );

    Ok(state
        .authorizer
        .authorize(
            permission.action(),
            &input.subject,
            organizations,
            &resource_type,
        )
        .await?)
}

/// Upstream resource type: prefix and resource are each lower-cased and
/// title-cased, then concatenated.
pub fn resource_type(prefix: &str, resource: &str) -> String {
    let mut out = title_case(&prefix.to_lowercase());
    out.push_str(&title_case(&resource.to_lowercase()));
    out
}

/// Title-case the first letter of every word.
///
/// Words are separated by any character that is not a letter, a digit or
/// an underscore, so `"my-cluster"` becomes `"My-Cluster"` while
/// `"my_cluster"` becomes `"My_cluster"`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = ' ';
    for c in s.chars() {
        if is_word_separator(prev) {
            out.push(to_title(c));
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

/// One-to-one title-case mapping.
///
/// Digraphs and Greek letters with iota subscript have a title case distinct
/// from their upper case. Characters whose upper case expands to several
/// characters (`ß`, `ﬀ`) have no single-character mapping and are kept.
fn to_title(c: char) -> char {
    let mapped = match c as u32 {
        0x01C4..=0x01C6 => Some(0x01C5), // Ǆ ǅ ǆ
        0x01C7..=0x01C9 => Some(0x01C8), // Ǉ ǈ ǉ
        0x01CA..=0x01CC => Some(0x01CB), // Ǌ ǋ ǌ
        0x01F1..=0x01F3 => Some(0x01F2), // Ǳ ǲ ǳ
        cp @ (0x1F80..=0x1F87 | 0x1F90..=0x1F97 | 0x1FA0..=0x1FA7) => Some(cp + 8),
        0x1FB3 => Some(0x1FBC),
        0x1FC3 => Some(0x1FCC),
        0x1FF3 => Some(0x1FFC),
        _ => None,
    };
    if let Some(title) = mapped.and_then(char::from_u32) {
        return title;
    }

    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

fn is_word_separator(c: char) -> bool {
    if c.is_ascii() {
        return !(c.is_ascii_alphanumeric() || c == '_');
    }
    if c.is_alphanumeric() {
        return false;
    }
    c.is_whitespace()
}

//! Access error types.

use thiserror::Error;

/// Errors raised while talking to the facility API or validating input.
///
/// None of these cross [`RoleResolver::resolve`](crate::resolver::RoleResolver::resolve);
/// the resolver logs them and folds them into a
/// [`Resolution`](crate::resolver::Resolution) status.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no authenticated session")]
    NoSession,

    #[error("facility id is required")]
    MissingFacility,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// The user-role endpoint answers for the token holder, not an
    /// arbitrary user.
    #[error("user-role endpoint cannot answer for {requested} (token principal: {principal})")]
    PrincipalMismatch { requested: String, principal: String },

    #[error("malformed response payload: {0}")]
    Malformed(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid api base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown permission: {0}")]
    UnknownPermission(String),
}

impl From<serde_json::Error> for AccessError {
    fn from(e: serde_json::Error) -> Self {
        AccessError::Malformed(e.to_string())
    }
}

/// Result type alias using AccessError.
pub type AccessResult<T> = Result<T, AccessError>;

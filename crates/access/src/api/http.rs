//! reqwest-backed [`FacilityApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::FacilityApi;
use crate::error::{AccessError, AccessResult};
use crate::models::{Facility, MembersResponse, UserRoleResponse};

/// JSON client for the facility REST API.
#[derive(Clone)]
pub struct HttpFacilityApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    /// User the bearer token authenticates.
    principal: Option<String>,
}

impl HttpFacilityApi {
    /// Create a client rooted at `base_url`.
    ///
    /// `timeout` bounds every request; a bearer `token` is attached when set.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> AccessResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AccessError::InvalidBaseUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
            principal: None,
        })
    }

    /// Declare which user the token belongs to.
    ///
    /// The user-role endpoint is only consulted for this user; without a
    /// principal it is never consulted and resolution uses the member list.
    pub fn with_principal(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        self.principal = (!user_id.is_empty()).then_some(user_id);
        self
    }

    /// Build `{base}/facilities/{id}/...` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("facilities").extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> AccessResult<T> {
        debug!(url = %url, "facility api request");

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "facility api returned error status");
            return Err(AccessError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl FacilityApi for HttpFacilityApi {
    async fn facility(&self, facility_id: &str) -> AccessResult<Facility> {
        let facility: Facility = self.get_json(self.endpoint(&[facility_id])).await?;
        facility.validate()
    }

    async fn user_role(&self, facility_id: &str, user_id: &str) -> AccessResult<UserRoleResponse> {
        if self.principal.as_deref() != Some(user_id) {
            return Err(AccessError::PrincipalMismatch {
                requested: user_id.to_string(),
                principal: self.principal.clone().unwrap_or_else(|| "-".to_string()),
            });
        }

        self.get_json(self.endpoint(&[facility_id, "user-role"]))
            .await
    }

    async fn members(&self, facility_id: &str) -> AccessResult<MembersResponse> {
        self.get_json(self.endpoint(&[facility_id, "members"])).await
    }
}

impl std::fmt::Debug for HttpFacilityApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilityApi")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("principal", &self.principal)
            .finish()
    }
}

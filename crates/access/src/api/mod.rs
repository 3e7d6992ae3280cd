//! Facility API boundary.
//!
//! The resolver only talks to the REST API through [`FacilityApi`], so tests
//! can substitute an in-memory implementation.

mod http;

use async_trait::async_trait;

use crate::error::AccessResult;
use crate::models::{Facility, MembersResponse, UserRoleResponse};

pub use http::HttpFacilityApi;

/// Read-only facility endpoints used for role resolution.
#[async_trait]
pub trait FacilityApi: Send + Sync {
    /// `GET /facilities/{id}`.
    async fn facility(&self, facility_id: &str) -> AccessResult<Facility>;

    /// `GET /facilities/{id}/user-role` for `user_id`.
    ///
    /// The HTTP API answers for the principal behind the bearer token, so an
    /// implementation must fail for any other `user_id` rather than return
    /// the token holder's role.
    async fn user_role(&self, facility_id: &str, user_id: &str) -> AccessResult<UserRoleResponse>;

    /// `GET /facilities/{id}/members`.
    async fn members(&self, facility_id: &str) -> AccessResult<MembersResponse>;
}

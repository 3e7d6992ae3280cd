//! Facility API payloads.
//!
//! These are the only shapes accepted from the REST boundary. Required
//! fields are not defaulted: a payload missing them, or carrying a role
//! outside the known set, fails to deserialize and is reported as
//! [`AccessError::Malformed`](crate::error::AccessError::Malformed).

use serde::{Deserialize, Serialize};

use super::Role;
use crate::error::{AccessError, AccessResult};

/// Facility record from `GET /facilities/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Facility {
    /// Whether `user_id` is the facility owner.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        !self.owner_id.is_empty() && self.owner_id == user_id
    }

    /// Reject records that parsed but carry no usable identity.
    pub fn validate(self) -> AccessResult<Self> {
        if self.id.is_empty() {
            return Err(AccessError::Malformed("facility id is empty".to_string()));
        }
        Ok(self)
    }
}

/// Response of `GET /facilities/{id}/user-role` for the calling principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleResponse {
    pub role: Role,
    #[serde(default)]
    pub is_owner: bool,
}

impl UserRoleResponse {
    /// The role this response grants; `is_owner` wins over `role`.
    pub fn effective_role(&self) -> Role {
        if self.is_owner { Role::Owner } else { self.role }
    }
}

/// One entry of a facility member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of `GET /facilities/{id}/members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<Member>,
}

impl MembersResponse {
    /// Linear scan for a member by user id.
    pub fn find(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == user_id)
    }
}

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]
//! Shared test fixtures.
//!
//! [`StubApi`] is an in-memory [`FacilityApi`] with per-endpoint call
//! counters and failure injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use taskhub_access::models::{Facility, Member, MembersResponse, UserRoleResponse};
use taskhub_access::{
    AccessError, AccessResult, FacilityApi, ResolverConfig, Role, RoleResolver, TtlCache,
};

/// In-memory facility API.
#[derive(Default)]
pub struct StubApi {
    state: Mutex<StubState>,
    pub facility_calls: AtomicUsize,
    pub role_calls: AtomicUsize,
    pub members_calls: AtomicUsize,
}

#[derive(Default)]
struct StubState {
    /// None simulates an unreachable facility.
    facility: Option<Facility>,
    /// None simulates an unavailable user-role endpoint.
    roles: Option<HashMap<String, UserRoleResponse>>,
    /// None simulates an unavailable member list.
    members: Option<Vec<Member>>,
    members_delay: Option<Duration>,
}

impl StubApi {
    /// Facility `facility_id` owned by `owner_id`; role endpoint down; empty
    /// member list.
    pub fn facility(facility_id: &str, owner_id: &str) -> Self {
        let api = Self::default();
        api.state.lock().facility = Some(Facility {
            id: facility_id.to_string(),
            owner_id: owner_id.to_string(),
            name: None,
        });
        api.state.lock().members = Some(Vec::new());
        api
    }

    /// A facility that cannot be fetched.
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn with_member(self, user_id: &str, role: Role) -> Self {
        self.state
            .lock()
            .members
            .get_or_insert_with(Vec::new)
            .push(member(user_id, role));
        self
    }

    pub fn with_role_endpoint(self, user_id: &str, role: Role, is_owner: bool) -> Self {
        self.state
            .lock()
            .roles
            .get_or_insert_with(HashMap::new)
            .insert(user_id.to_string(), UserRoleResponse { role, is_owner });
        self
    }

    pub fn without_members(self) -> Self {
        self.state.lock().members = None;
        self
    }

    pub fn with_members_delay(self, delay: Duration) -> Self {
        self.state.lock().members_delay = Some(delay);
        self
    }

    /// Replace a member's role, as a role change on the server would.
    pub fn set_member_role(&self, user_id: &str, role: Role) {
        let mut state = self.state.lock();
        let members = state.members.get_or_insert_with(Vec::new);
        members.retain(|m| m.id != user_id);
        members.push(member(user_id, role));
    }

    pub fn facility_calls(&self) -> usize {
        self.facility_calls.load(Ordering::SeqCst)
    }

    pub fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    pub fn members_calls(&self) -> usize {
        self.members_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.facility_calls() + self.role_calls() + self.members_calls()
    }
}

#[async_trait]
impl FacilityApi for StubApi {
    async fn facility(&self, facility_id: &str) -> AccessResult<Facility> {
        self.facility_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .facility
            .clone()
            .filter(|f| f.id == facility_id)
            .ok_or_else(|| unavailable(&format!("/facilities/{facility_id}")))
    }

    async fn user_role(&self, facility_id: &str, user_id: &str) -> AccessResult<UserRoleResponse> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let Some(roles) = &state.roles else {
            return Err(unavailable(&format!("/facilities/{facility_id}/user-role")));
        };
        roles
            .get(user_id)
            .copied()
            .ok_or_else(|| unavailable(&format!("/facilities/{facility_id}/user-role")))
    }

    async fn members(&self, facility_id: &str) -> AccessResult<MembersResponse> {
        self.members_calls.fetch_add(1, Ordering::SeqCst);
        let (members, delay) = {
            let state = self.state.lock();
            (state.members.clone(), state.members_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        members
            .map(|members| MembersResponse { members })
            .ok_or_else(|| unavailable(&format!("/facilities/{facility_id}/members")))
    }
}

pub fn member(user_id: &str, role: Role) -> Member {
    Member {
        id: user_id.to_string(),
        role,
        name: None,
        email: None,
    }
}

fn unavailable(url: &str) -> AccessError {
    AccessError::Status {
        status: 503,
        url: url.to_string(),
    }
}

/// Resolver over `api` with an isolated cache and default tuning.
pub fn resolver(api: &Arc<StubApi>) -> RoleResolver {
    RoleResolver::new(
        Arc::clone(api) as Arc<dyn FacilityApi>,
        TtlCache::default(),
        ResolverConfig::default(),
    )
}

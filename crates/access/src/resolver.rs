//! Facility role resolution.
//!
//! [`RoleResolver::resolve`] determines a user's role in a facility with a
//! fixed fallback chain, first success wins:
//!
//! 1. cached role for `(facility, user)`
//! 2. facility record: the owner is always `owner`
//! 3. the dedicated user-role endpoint
//! 4. a scan of the facility member list (absent members are `guest`)
//!
//! Failures never escape. If the facility itself cannot be fetched, or the
//! member list is unavailable, the user falls back to `guest` with
//! [`RoleStatus::Error`]. Fallback results are not cached. The owner never
//! reaches the fallback once the facility record is in hand: step 2 has
//! already answered for them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::FacilityApi;
use crate::cache::{TtlCache, cache_key};
use crate::error::{AccessError, AccessResult};
use crate::models::{MembersResponse, Role};
use crate::permissions::PermissionGate;

/// Cache namespace for resolved roles.
pub const ROLE_NAMESPACE: &str = "role";

/// Cache namespace for facility member lists.
pub const MEMBERS_NAMESPACE: &str = "members";

/// Cache key of the role entry for `(facility, user)`.
pub fn role_key(facility_id: &str, user_id: &str) -> String {
    cache_key(ROLE_NAMESPACE, &[facility_id, user_id])
}

/// Cache key of a facility's member list.
pub fn members_key(facility_id: &str) -> String {
    cache_key(MEMBERS_NAMESPACE, &[facility_id])
}

/// Resolution progress as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    Loading,
    Ready,
    Error,
}

/// Which step of the chain produced a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Cache,
    Ownership,
    RoleEndpoint,
    MemberList,
    /// Member list answered but did not contain the user.
    Default,
    /// Error path: lowest privilege assumed.
    Fallback,
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub role: Option<Role>,
    pub status: RoleStatus,
    pub source: Option<RoleSource>,
    pub error: Option<String>,
    /// When the role was determined; for cache hits, the original time.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Resolution {
    /// Nothing resolved yet.
    pub fn loading() -> Self {
        Self {
            role: None,
            status: RoleStatus::Loading,
            source: None,
            error: None,
            resolved_at: None,
        }
    }

    fn ready(role: Role, source: RoleSource, resolved_at: DateTime<Utc>) -> Self {
        Self {
            role: Some(role),
            status: RoleStatus::Ready,
            source: Some(source),
            error: None,
            resolved_at: Some(resolved_at),
        }
    }

    fn failed(role: Option<Role>, source: Option<RoleSource>, error: String) -> Self {
        Self {
            role,
            status: RoleStatus::Error,
            source,
            resolved_at: role.map(|_| Utc::now()),
            error: Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == RoleStatus::Ready
    }

    pub fn gate(&self) -> PermissionGate {
        PermissionGate::from_resolution(self)
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// TTL of resolved roles.
    pub role_ttl: Duration,
    /// TTL of cached member lists.
    pub members_ttl: Duration,
    /// Deadline for the member-list request.
    pub members_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            role_ttl: Duration::from_secs(30),
            members_ttl: Duration::from_secs(60),
            members_timeout: Duration::from_secs(10),
        }
    }
}

/// Cached role snapshot.
#[derive(Debug, Clone, Copy)]
struct RoleCacheEntry {
    role: Role,
    resolved_at: DateTime<Utc>,
}

/// Role resolver shared by every consumer.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct RoleResolver {
    inner: Arc<RoleResolverInner>,
}

struct RoleResolverInner {
    api: Arc<dyn FacilityApi>,
    cache: TtlCache,
    config: ResolverConfig,
}

impl RoleResolver {
    /// Create a resolver over `api`, caching into `cache`.
    pub fn new(api: Arc<dyn FacilityApi>, cache: TtlCache, config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(RoleResolverInner { api, cache, config }),
        }
    }

    /// The cache this resolver reads and writes.
    pub fn cache(&self) -> &TtlCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// Resolve the role of `user_id` in `facility_id`.
    ///
    /// Never fails: errors are logged and reported through the returned
    /// status. A missing user (no session) or facility id yields no role.
    pub async fn resolve(&self, facility_id: &str, user_id: Option<&str>) -> Resolution {
        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            warn!(facility_id = %facility_id, "role requested without a session");
            return Resolution::failed(None, None, AccessError::NoSession.to_string());
        };

        if facility_id.is_empty() {
            error!(user_id = %user_id, "role requested without a facility id");
            return Resolution::failed(None, None, AccessError::MissingFacility.to_string());
        }

        let key = role_key(facility_id, user_id);
        if let Some(entry) = self.inner.cache.get::<RoleCacheEntry>(&key) {
            debug!(facility_id = %facility_id, user_id = %user_id, role = %entry.role, "role cache hit");
            return Resolution::ready(entry.role, RoleSource::Cache, entry.resolved_at);
        }

        let facility = match self.inner.api.facility(facility_id).await {
            Ok(f) => f,
            Err(e) => {
                error!(facility_id = %facility_id, error = %e, "failed to fetch facility");
                return self.fallback(facility_id, user_id, format!("facility unreachable: {e}"));
            }
        };

        // Ownership beats every other source.
        if facility.is_owned_by(user_id) {
            return self.store(key, facility_id, user_id, Role::Owner, RoleSource::Ownership);
        }

        match self.inner.api.user_role(facility_id, user_id).await {
            Ok(resp) => {
                return self.store(
                    key,
                    facility_id,
                    user_id,
                    resp.effective_role(),
                    RoleSource::RoleEndpoint,
                );
            }
            Err(e) => {
                warn!(
                    facility_id = %facility_id,
                    error = %e,
                    "user-role endpoint unavailable, scanning member list"
                );
            }
        }

        match self.facility_members(facility_id).await {
            Ok(list) => match list.find(user_id) {
                Some(member) => {
                    self.store(key, facility_id, user_id, member.role, RoleSource::MemberList)
                }
                None => self.store(key, facility_id, user_id, Role::Guest, RoleSource::Default),
            },
            Err(e) => {
                error!(facility_id = %facility_id, error = %e, "failed to load member list");
                self.fallback(facility_id, user_id, format!("member list unavailable: {e}"))
            }
        }
    }

    /// Member list of a facility, cached under [`members_key`].
    ///
    /// The request is abandoned after `members_timeout`.
    pub async fn facility_members(&self, facility_id: &str) -> AccessResult<Arc<MembersResponse>> {
        let key = members_key(facility_id);
        if let Some(list) = self.inner.cache.get::<Arc<MembersResponse>>(&key) {
            return Ok(list);
        }

        let timeout = self.inner.config.members_timeout;
        let list = match tokio::time::timeout(timeout, self.inner.api.members(facility_id)).await {
            Ok(result) => Arc::new(result?),
            Err(_) => return Err(AccessError::Timeout(timeout)),
        };

        self.inner
            .cache
            .set(key, Arc::clone(&list), self.inner.config.members_ttl);
        Ok(list)
    }

    /// Drop the cached role for `(facility, user)` and the facility's member
    /// list. Call after any change to role assignments.
    pub fn invalidate(&self, facility_id: &str, user_id: &str) {
        self.inner.cache.delete(&role_key(facility_id, user_id));
        self.inner.cache.delete(&members_key(facility_id));
        debug!(facility_id = %facility_id, user_id = %user_id, "role cache invalidated");
    }

    /// Drop every cached role and the member list of a facility.
    pub fn invalidate_facility(&self, facility_id: &str) {
        let prefix = format!("{}:", cache_key(ROLE_NAMESPACE, &[facility_id]));
        let removed = self.inner.cache.delete_prefix(&prefix);
        self.inner.cache.delete(&members_key(facility_id));
        debug!(facility_id = %facility_id, removed, "facility role cache invalidated");
    }

    fn store(
        &self,
        key: String,
        facility_id: &str,
        user_id: &str,
        role: Role,
        source: RoleSource,
    ) -> Resolution {
        let entry = RoleCacheEntry {
            role,
            resolved_at: Utc::now(),
        };
        self.inner.cache.set(key, entry, self.inner.config.role_ttl);

        info!(
            facility_id = %facility_id,
            user_id = %user_id,
            role = %role,
            source = ?source,
            "role resolved"
        );
        Resolution::ready(role, source, entry.resolved_at)
    }

    /// Last resort: `guest` with an error status, never cached.
    fn fallback(&self, facility_id: &str, user_id: &str, message: String) -> Resolution {
        warn!(
            facility_id = %facility_id,
            user_id = %user_id,
            "falling back to guest"
        );
        Resolution::failed(Some(Role::Guest), Some(RoleSource::Fallback), message)
    }
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("cache", &self.inner.cache)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// A single consumer's view of one `(facility, user)` role.
///
/// Only one resolution runs per handle at a time; a refresh requested while
/// another is pending is dropped. Separate handles do not coordinate.
pub struct RoleHandle {
    resolver: RoleResolver,
    facility_id: String,
    user_id: Option<String>,
    in_flight: AtomicBool,
    state: RwLock<Resolution>,
}

impl RoleHandle {
    /// Create a handle. A facility id is mandatory.
    pub fn new(
        resolver: RoleResolver,
        facility_id: impl Into<String>,
        user_id: Option<String>,
    ) -> AccessResult<Self> {
        let facility_id = facility_id.into();
        if facility_id.is_empty() {
            return Err(AccessError::MissingFacility);
        }

        Ok(Self {
            resolver,
            facility_id,
            user_id,
            in_flight: AtomicBool::new(false),
            state: RwLock::new(Resolution::loading()),
        })
    }

    pub fn facility_id(&self) -> &str {
        &self.facility_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Resolve and record the result.
    ///
    /// Returns `None` without doing anything if a resolution is already
    /// running on this handle.
    pub async fn refresh(&self) -> Option<Resolution> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(facility_id = %self.facility_id, "resolution already in flight, dropping refresh");
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let resolution = self
            .resolver
            .resolve(&self.facility_id, self.user_id.as_deref())
            .await;
        *self.state.write() = resolution.clone();
        Some(resolution)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Latest recorded resolution.
    pub fn snapshot(&self) -> Resolution {
        self.state.read().clone()
    }

    /// Render gate for the latest resolution.
    pub fn gate(&self) -> PermissionGate {
        self.state.read().gate()
    }

    /// Invalidate cached state for this pair and go back to loading.
    pub fn invalidate(&self) {
        if let Some(user_id) = &self.user_id {
            self.resolver.invalidate(&self.facility_id, user_id);
        }
        *self.state.write() = Resolution::loading();
    }
}

/// Clears the in-flight flag, including when the refresh future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

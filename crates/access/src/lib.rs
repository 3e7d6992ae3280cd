//! Taskhub access library
//!
//! Resolves a user's role within a facility, maps roles to permissions
//! through a static matrix, and caches both behind an in-memory TTL cache.
//! The `taskhub-access` binary exposes the same operations from the shell.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod permissions;
pub mod resolver;

pub use api::{FacilityApi, HttpFacilityApi};
pub use cache::{CacheStats, SweeperHandle, TtlCache};
pub use config::Config;
pub use error::{AccessError, AccessResult};
pub use models::Role;
pub use permissions::{Permission, PermissionGate, has_permission, has_role};
pub use resolver::{Resolution, ResolverConfig, RoleHandle, RoleResolver, RoleSource, RoleStatus};

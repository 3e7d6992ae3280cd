//! Static role→permission matrix and role checks.
//!
//! The matrix is hand-authored. Membership is always looked up in the
//! table for the exact role; it is never derived from [`Role::level`].

use crate::error::AccessError;
use crate::models::Role;
use crate::resolver::{Resolution, RoleStatus};

/// A capability tag gating one UI action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    FacilityEdit,
    FacilityDelete,
    FacilityLeave,
    UsersViewAll,
    UsersInvite,
    UsersRemove,
    UsersChangeRole,
    ProjectsViewAll,
    ProjectsCreate,
    ProjectsEdit,
    ProjectsDelete,
    TasksViewAll,
    TasksCreate,
    TasksEdit,
    TasksAssign,
    TasksDelete,
    CommentsAdd,
    CommentsDeleteAny,
    NotificationsManage,
    ReportsView,
}

impl Permission {
    /// The closed set of permissions.
    pub const ALL: [Permission; 20] = [
        Permission::FacilityEdit,
        Permission::FacilityDelete,
        Permission::FacilityLeave,
        Permission::UsersViewAll,
        Permission::UsersInvite,
        Permission::UsersRemove,
        Permission::UsersChangeRole,
        Permission::ProjectsViewAll,
        Permission::ProjectsCreate,
        Permission::ProjectsEdit,
        Permission::ProjectsDelete,
        Permission::TasksViewAll,
        Permission::TasksCreate,
        Permission::TasksEdit,
        Permission::TasksAssign,
        Permission::TasksDelete,
        Permission::CommentsAdd,
        Permission::CommentsDeleteAny,
        Permission::NotificationsManage,
        Permission::ReportsView,
    ];

    /// Return the `area.action` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FacilityEdit => "facility.edit",
            Self::FacilityDelete => "facility.delete",
            Self::FacilityLeave => "facility.leave",
            Self::UsersViewAll => "users.view_all",
            Self::UsersInvite => "users.invite",
            Self::UsersRemove => "users.remove",
            Self::UsersChangeRole => "users.change_role",
            Self::ProjectsViewAll => "projects.view_all",
            Self::ProjectsCreate => "projects.create",
            Self::ProjectsEdit => "projects.edit",
            Self::ProjectsDelete => "projects.delete",
            Self::TasksViewAll => "tasks.view_all",
            Self::TasksCreate => "tasks.create",
            Self::TasksEdit => "tasks.edit",
            Self::TasksAssign => "tasks.assign",
            Self::TasksDelete => "tasks.delete",
            Self::CommentsAdd => "comments.add",
            Self::CommentsDeleteAny => "comments.delete_any",
            Self::NotificationsManage => "notifications.manage",
            Self::ReportsView => "reports.view",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AccessError::UnknownPermission(s.to_string()))
    }
}

use Permission::*;

const GUEST: &[Permission] = &[UsersViewAll, TasksViewAll, CommentsAdd, NotificationsManage];

const MEMBER: &[Permission] = &[
    FacilityLeave,
    UsersViewAll,
    ProjectsViewAll,
    TasksViewAll,
    TasksCreate,
    TasksEdit,
    CommentsAdd,
    NotificationsManage,
];

const MANAGER: &[Permission] = &[
    FacilityLeave,
    UsersViewAll,
    UsersInvite,
    ProjectsViewAll,
    ProjectsCreate,
    ProjectsEdit,
    TasksViewAll,
    TasksCreate,
    TasksEdit,
    TasksAssign,
    TasksDelete,
    CommentsAdd,
    CommentsDeleteAny,
    NotificationsManage,
    ReportsView,
];

// Owners cannot leave; ownership has to be transferred first.
const OWNER: &[Permission] = &[
    FacilityEdit,
    FacilityDelete,
    UsersViewAll,
    UsersInvite,
    UsersRemove,
    UsersChangeRole,
    ProjectsViewAll,
    ProjectsCreate,
    ProjectsEdit,
    ProjectsDelete,
    TasksViewAll,
    TasksCreate,
    TasksEdit,
    TasksAssign,
    TasksDelete,
    CommentsAdd,
    CommentsDeleteAny,
    NotificationsManage,
    ReportsView,
];

/// The exact permission row for a role.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Guest => GUEST,
        Role::Member => MEMBER,
        Role::Manager => MANAGER,
        Role::Owner => OWNER,
    }
}

/// Set-membership test against the matrix.
pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// String entry point: anything that does not parse is denied.
pub fn has_permission_str(role: &str, permission: &str) -> bool {
    match (role.parse::<Role>(), permission.parse::<Permission>()) {
        (Ok(role), Ok(permission)) => has_permission(role, permission),
        _ => false,
    }
}

/// Ordinal check (`level(role) >= level(required)`), or equality if `exact`.
pub fn has_role(role: Role, required: Role, exact: bool) -> bool {
    if exact {
        role == required
    } else {
        role.level() >= required.level()
    }
}

/// Render gate over a [`Resolution`].
///
/// While the role is still loading every check passes, so gated elements
/// do not flicker out and back in. These gates only decide what to render;
/// the API enforces authorization on its own.
#[derive(Debug, Clone, Copy)]
pub struct PermissionGate {
    role: Option<Role>,
    status: RoleStatus,
}

impl PermissionGate {
    pub fn new(role: Option<Role>, status: RoleStatus) -> Self {
        Self { role, status }
    }

    pub fn from_resolution(resolution: &Resolution) -> Self {
        Self::new(resolution.role, resolution.status)
    }

    pub fn is_loading(&self) -> bool {
        self.status == RoleStatus::Loading
    }

    /// Whether the gated element for `permission` should render.
    pub fn can(&self, permission: Permission) -> bool {
        if self.is_loading() {
            return true;
        }
        self.role.is_some_and(|r| has_permission(r, permission))
    }

    /// Whether the resolved role meets `required`.
    pub fn has_role(&self, required: Role, exact: bool) -> bool {
        if self.is_loading() {
            return true;
        }
        self.role.is_some_and(|r| has_role(r, required, exact))
    }
}

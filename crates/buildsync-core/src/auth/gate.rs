//! Read-only identity snapshot exposed to every screen.

use super::model::{Role, Session};

/// The resolved `{ user, role }` pair.
///
/// `role == None` with a user present is a valid state: the role row is
/// missing or could not be fetched, and privileged UI stays off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub user: Option<Session>,
    pub role: Option<Role>,
}

impl IdentityState {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> RoleGate {
        RoleGate {
            signed_in: self.user.is_some(),
            role: self.role,
        }
    }
}

/// Capability checks derived from the current role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleGate {
    signed_in: bool,
    role: Option<Role>,
}

impl RoleGate {
    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn can_create_projects(&self) -> bool {
        matches!(self.role, Some(Role::Admin | Role::ProjectManager))
    }

    pub fn can_invite_members(&self) -> bool {
        matches!(self.role, Some(Role::Admin | Role::ProjectManager))
    }

    pub fn can_remove_members(&self) -> bool {
        matches!(self.role, Some(Role::Admin))
    }
}

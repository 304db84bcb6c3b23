//! Role definitions.
//!
//! Two independent role axes exist:
//! - The **account role** on a [`Principal`](shepherd_types::Principal), compared
//!   against a single administrator sentinel.
//! - The **ministry role** a person holds inside one ministry (`people_ministries.role_id`),
//!   where only leader and collaborator grant access beyond the caller's own record.

use serde::{Deserialize, Serialize};
use shepherd_types::RoleId;

use crate::decision::{Decision, Denial};

/// Ministry-scoped privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinistryRole {
    /// Runs the ministry. Required to assign people into child ministries.
    Leader,
    /// Helps run the ministry. Grants read access, never assignment rights.
    Collaborator,
}

impl std::fmt::Display for MinistryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MinistryRole::Leader => write!(f, "leader"),
            MinistryRole::Collaborator => write!(f, "collaborator"),
        }
    }
}

/// The configured role identifiers.
///
/// None of these are hard-coded in logic; they come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRoles {
    /// Account role that bypasses row scoping.
    pub admin: RoleId,
    /// Ministry role id of a leader.
    pub leader: RoleId,
    /// Ministry role id of a collaborator.
    pub collaborator: RoleId,
}

impl AccessRoles {
    pub fn new(admin: RoleId, leader: RoleId, collaborator: RoleId) -> Self {
        Self {
            admin,
            leader,
            collaborator,
        }
    }

    /// Strict equality against the administrator sentinel.
    pub fn is_admin(&self, role: RoleId) -> bool {
        role == self.admin
    }

    /// [`is_admin`](Self::is_admin) expressed as a [`Decision`].
    pub fn check_admin(&self, role: RoleId) -> Decision {
        if self.is_admin(role) {
            Decision::Allowed
        } else {
            Decision::Denied(Denial::NotAdministrator)
        }
    }

    /// Ministry role ids that grant read access to a ministry's people.
    pub fn allowed(&self) -> [RoleId; 2] {
        [self.leader, self.collaborator]
    }

    /// Raw ids of [`allowed`](Self::allowed), ready to bind as an `int[]` parameter.
    pub fn allowed_raw(&self) -> Vec<i32> {
        self.allowed().iter().map(|r| r.get()).collect()
    }

    pub fn role_id(&self, role: MinistryRole) -> RoleId {
        match role {
            MinistryRole::Leader => self.leader,
            MinistryRole::Collaborator => self.collaborator,
        }
    }

    /// Maps a ministry role id back to its privilege level.
    pub fn ministry_role(&self, role: RoleId) -> Option<MinistryRole> {
        if role == self.leader {
            Some(MinistryRole::Leader)
        } else if role == self.collaborator {
            Some(MinistryRole::Collaborator)
        } else {
            None
        }
    }
}

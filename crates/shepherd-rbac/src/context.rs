//! Per-caller context.
//!
//! A [`CallerContext`] travels through the call chain with every request and
//! owns the caller's resolved person id. There is no process-wide slot: two
//! concurrent callers always hold two independent caches.

use std::sync::{PoisonError, RwLock};

use shepherd_types::{PersonId, Principal, RoleId, UserId};
use tracing::debug;

/// The caller of one or more gateway requests.
#[derive(Debug)]
pub struct CallerContext {
    principal: Principal,
    identity: RwLock<Option<PersonId>>,
}

impl CallerContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            identity: RwLock::new(None),
        }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn role(&self) -> RoleId {
        self.principal.role
    }

    /// The cached person id, if one has been resolved for this caller.
    pub fn cached_person(&self) -> Option<PersonId> {
        *self.identity.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the resolved person id for later requests from this caller.
    pub fn remember_person(&self, person: PersonId) {
        let mut slot = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(person);
        debug!(user_id = %self.principal.user_id, person_id = %person, "Cached caller identity");
    }

    /// Drops the cached person id.
    ///
    /// Account administration calls this when the user-to-person link changes.
    pub fn invalidate_identity(&self) {
        let mut slot = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!(user_id = %self.principal.user_id, "Invalidated caller identity");
        }
    }
}

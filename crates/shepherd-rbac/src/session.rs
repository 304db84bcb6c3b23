//! Active conversation sessions.
//!
//! Each session owns a [`CallerContext`], so the resolved identity cache is
//! scoped to the session that produced it. A username holds at most one
//! session at a time: registering again replaces the previous one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use shepherd_types::{Principal, SessionId, UserId};
use tracing::{debug, info};

use crate::context::CallerContext;

/// One authenticated conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub caller: Arc<CallerContext>,
}

impl Session {
    pub fn principal(&self) -> Principal {
        self.caller.principal()
    }
}

/// Registry of active sessions keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, evicting any earlier session of the same username.
    ///
    /// Returns the new session.
    pub fn register(&self, id: SessionId, username: impl Into<String>, principal: Principal) -> Session {
        let username = username.into();
        let session = Session {
            id: id.clone(),
            username: username.clone(),
            created_at: Utc::now(),
            caller: Arc::new(CallerContext::new(principal)),
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let previous: Vec<SessionId> = sessions
            .values()
            .filter(|s| s.username == username)
            .map(|s| s.id.clone())
            .collect();
        for old in &previous {
            sessions.remove(old);
            debug!(session = %old, username = %username, "Replaced previous session");
        }
        sessions.insert(id, session.clone());

        info!(
            session = %session.id,
            username = %session.username,
            user_id = %principal.user_id,
            "Session registered"
        );
        session
    }

    /// Removes a session. Returns true if it existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            info!(session = %id, "Session removed");
        }
        removed
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.read().get(id).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<Session> {
        self.read().values().find(|s| s.username == username).cloned()
    }

    pub fn find_by_user_id(&self, user_id: UserId) -> Option<Session> {
        self.read()
            .values()
            .find(|s| s.caller.user_id() == user_id)
            .cloned()
    }

    /// Drops the cached identity of every session belonging to `user_id`.
    pub fn invalidate_identity(&self, user_id: UserId) {
        for session in self.read().values().filter(|s| s.caller.user_id() == user_id) {
            session.caller.invalidate_identity();
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shepherd_types::{PersonId, RoleId};

    fn principal(user: i32) -> Principal {
        Principal::new(UserId::new(user), RoleId::new(2))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        registry.register(SessionId::from("s1"), "ana", principal(1));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&SessionId::from("s1")).unwrap().username, "ana");
        assert_eq!(registry.find_by_username("ana").unwrap().id, SessionId::from("s1"));
        assert_eq!(
            registry.find_by_user_id(UserId::new(1)).unwrap().principal(),
            principal(1)
        );
        assert!(registry.find_by_username("luis").is_none());
    }

    #[test]
    fn test_register_replaces_same_username() {
        let registry = SessionRegistry::new();
        registry.register(SessionId::from("s1"), "ana", principal(1));
        registry.register(SessionId::from("s2"), "ana", principal(1));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&SessionId::from("s1")).is_none());
        assert!(registry.get(&SessionId::from("s2")).is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = SessionRegistry::new();
        registry.register(SessionId::from("s1"), "ana", principal(1));
        registry.register(SessionId::from("s2"), "luis", principal(2));

        assert!(registry.remove(&SessionId::from("s1")));
        assert!(!registry.remove(&SessionId::from("s1")));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_identity_cache_is_per_session() {
        let registry = SessionRegistry::new();
        let ana = registry.register(SessionId::from("s1"), "ana", principal(1));
        let luis = registry.register(SessionId::from("s2"), "luis", principal(2));

        ana.caller.remember_person(PersonId::new(10));
        assert_eq!(luis.caller.cached_person(), None);

        registry.invalidate_identity(UserId::new(1));
        assert_eq!(ana.caller.cached_person(), None);
    }
}

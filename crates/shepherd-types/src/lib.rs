//! # shepherd-types: Core types for `Shepherd`
//!
//! This crate contains shared types used across the `Shepherd` gateway:
//! - Entity IDs ([`UserId`], [`PersonId`], [`MinistryId`], [`ActivityId`], [`RoleId`])
//! - Caller identity ([`Principal`])
//! - Chat session keys ([`SessionId`])
//!
//! All database identifiers are `i32` because the backing schema uses
//! PostgreSQL `integer` keys; binding a wider type would fail at the driver.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs - All Copy (cheap 4-byte values)
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            pub fn new(id: i32) -> Self {
                Self(id)
            }

            /// Returns the raw database key.
            pub fn get(self) -> i32 {
                self.0
            }

            /// Returns true for keys a serial column can actually produce.
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an authenticated account (`users.id`).
    UserId
);

entity_id!(
    /// Identifier of a person record (`people.id`).
    ///
    /// An account is linked to at most one person; that link is what the
    /// gateway calls the caller's resolved identity.
    PersonId
);

entity_id!(
    /// Identifier of a ministry (organizational unit).
    MinistryId
);

entity_id!(
    /// Identifier of a ministry activity (a dated meeting or event).
    ActivityId
);

entity_id!(
    /// Identifier of a role.
    ///
    /// The same type is used for account roles (compared against the
    /// administrator sentinel) and for ministry roles (leader, collaborator).
    RoleId
);

// ============================================================================
// Caller identity
// ============================================================================

/// The authenticated caller on whose behalf a statement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: RoleId,
}

impl Principal {
    pub fn new(user_id: UserId, role: RoleId) -> Self {
        Self { user_id, role }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {} (role {})", self.user_id, self.role)
    }
}

/// Opaque key of a conversation session (one per chat thread).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, true; "positive key")]
    #[test_case(0, false; "zero")]
    #[test_case(-7, false; "negative")]
    fn test_id_validity(raw: i32, expected: bool) {
        assert_eq!(PersonId::new(raw).is_valid(), expected);
        assert_eq!(MinistryId::new(raw).is_valid(), expected);
    }

    #[test]
    fn test_id_round_trips_through_i32() {
        let id = UserId::from(42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let principal = Principal::new(UserId::new(5), RoleId::new(1));
        let json = serde_json::to_string(&principal).unwrap();
        assert_eq!(json, r#"{"user_id":5,"role":1}"#);
    }

    #[test]
    fn test_session_id_display() {
        let session = SessionId::from("thread-abc");
        assert_eq!(session.as_str(), "thread-abc");
        assert_eq!(session.to_string(), "thread-abc");
    }
}

//! Authorization outcomes.
//!
//! Guards never signal denial by failing. They return a [`Decision`] and the
//! call site chooses what to do with a [`Denial`], usually [`Decision::require`].

use shepherd_types::{ActivityId, MinistryId, PersonId, UserId};
use thiserror::Error;

/// Why an authorization check said no.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("only administrators may perform this operation")]
    NotAdministrator,

    #[error("user {user} has no linked person record")]
    NoLinkedPerson { user: UserId },

    #[error("person {person} is outside every ministry the caller leads or collaborates in")]
    MemberOutOfScope { person: PersonId },

    #[error("caller holds no leader or collaborator role in ministry {ministry}")]
    MinistryOutOfScope { ministry: MinistryId },

    #[error("caller is not a leader of the parent ministry of {ministry}")]
    NotParentLeader { ministry: MinistryId },

    #[error("person {person} does not match the name '{claimed}'; re-check the member's id")]
    IdentityMismatch { person: PersonId, claimed: String },

    #[error("ministry {ministry} does not match the name '{claimed}'; re-check the ministry's id")]
    MinistryMismatch { ministry: MinistryId, claimed: String },

    #[error("activity {activity} does not belong to ministry {ministry} on {date}")]
    ActivityMismatch {
        activity: ActivityId,
        ministry: MinistryId,
        date: String,
    },
}

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    /// Allowed when `condition` holds, otherwise denied with `denial()`.
    pub fn allow_if(condition: bool, denial: impl FnOnce() -> Denial) -> Self {
        if condition {
            Decision::Allowed
        } else {
            Decision::Denied(denial())
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Converts the decision into a `Result`, mapping a denial through `into`.
    ///
    /// # Errors
    ///
    /// Returns the converted [`Denial`] when the decision is [`Decision::Denied`].
    pub fn require<E: From<Denial>>(self) -> Result<(), E> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(denial) => Err(E::from(denial)),
        }
    }

    /// Returns the first denial, or `Allowed` when every decision allows.
    pub fn all(decisions: impl IntoIterator<Item = Decision>) -> Decision {
        decisions
            .into_iter()
            .find(|d| !d.is_allowed())
            .unwrap_or(Decision::Allowed)
    }
}

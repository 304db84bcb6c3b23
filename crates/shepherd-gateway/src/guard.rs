//! Identity and authorization guards.
//!
//! Every mutation runs the guards it needs, in order, and only then issues its
//! statement. Guards never write. Each returns:
//! - `Ok(Decision::Allowed)` when the check passed
//! - `Ok(Decision::Denied(_))` with the reason when it did not
//! - `Err(_)` when the input was malformed or the database failed
//!
//! Guards that read `users` go through the private path with fixed SQL; the
//! rest use the guarded path.

use shepherd_rbac::{ActivityDate, CallerContext, Decision, Denial, NameClaim};
use shepherd_types::{ActivityId, MinistryId, PersonId};
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::pool::{ConnectionPool, SqlParam};
use crate::value::ResultSet;

const IDENTITY_MATCHES_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM people \
        WHERE id = $1::int AND normalized_full_name = LOWER(unaccent($2::text))\
    ) AS matched";

const MINISTRY_MATCHES_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM ministries \
        WHERE id = $1::int AND normalized_name = LOWER(unaccent($2::text))\
    ) AS matched";

const ACTIVITY_MATCHES_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM activities a \
        JOIN ministries m ON m.id = a.ministry_id \
        WHERE a.id = $1::int AND m.id = $2::int AND a.date = $3::date\
    ) AS matched";

const CAN_ACCESS_MEMBER_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM people \
        WHERE people.id = $2::int AND people.user_id = $1::int\
    ) OR EXISTS (\
        SELECT 1 FROM people_ministries target \
        JOIN users u ON u.id = $1::int \
        WHERE target.person_id = $2::int \
        AND target.ministry_id IN (\
            SELECT held.ministry_id FROM people_ministries held \
            WHERE held.person_id = u.person_id AND held.role_id = ANY($3::int[])\
        )\
    ) AS allowed";

const CAN_ACCESS_MINISTRY_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM people_ministries held \
        JOIN users u ON u.person_id = held.person_id \
        WHERE u.id = $1::int AND held.ministry_id = $2::int AND held.role_id = ANY($3::int[])\
    ) AS allowed";

const LEADS_PARENT_MINISTRY_SQL: &str = "\
    SELECT EXISTS (\
        SELECT 1 FROM people_ministries held \
        WHERE held.person_id = $1::int \
        AND held.role_id = $3::int \
        AND held.ministry_id = COALESCE(\
            (SELECT parent_ministry_id FROM ministries WHERE id = $2::int), $2::int)\
    ) AS allowed";

/// Pre-mutation checks bound to one gateway.
pub struct Authorizer<'g, P> {
    gateway: &'g Gateway<P>,
}

impl<'g, P: ConnectionPool> Authorizer<'g, P> {
    pub fn new(gateway: &'g Gateway<P>) -> Self {
        Self { gateway }
    }

    /// The person at `person` has a normalized name equal to `claimed_name`.
    pub async fn identity_matches(&self, person: PersonId, claimed_name: &str) -> GatewayResult<Decision> {
        require_id(person.is_valid(), "member id")?;
        let claim = NameClaim::parse(claimed_name)?;

        let matched = self
            .gateway
            .run_guarded(
                IDENTITY_MATCHES_SQL,
                &[SqlParam::Int(person.get()), SqlParam::Text(claim.as_str().to_string())],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&matched, "identity check")?, || {
            Denial::IdentityMismatch {
                person,
                claimed: claim.to_string(),
            }
        });
        log_decision("identity_matches", &decision);
        Ok(decision)
    }

    /// The ministry at `ministry` has a normalized name equal to `claimed_name`.
    pub async fn ministry_matches(&self, ministry: MinistryId, claimed_name: &str) -> GatewayResult<Decision> {
        require_id(ministry.is_valid(), "ministry id")?;
        let claim = NameClaim::parse(claimed_name)?;

        let matched = self
            .gateway
            .run_guarded(
                MINISTRY_MATCHES_SQL,
                &[SqlParam::Int(ministry.get()), SqlParam::Text(claim.as_str().to_string())],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&matched, "ministry check")?, || {
            Denial::MinistryMismatch {
                ministry,
                claimed: claim.to_string(),
            }
        });
        log_decision("ministry_matches", &decision);
        Ok(decision)
    }

    /// The activity belongs to `ministry` and took place on `date` (`YYYY-MM-DD`).
    pub async fn activity_matches(
        &self,
        activity: ActivityId,
        ministry: MinistryId,
        date: &str,
    ) -> GatewayResult<Decision> {
        require_id(activity.is_valid(), "activity id")?;
        require_id(ministry.is_valid(), "ministry id")?;
        let date = ActivityDate::parse(date)?;

        let matched = self
            .gateway
            .run_guarded(
                ACTIVITY_MATCHES_SQL,
                &[
                    SqlParam::Int(activity.get()),
                    SqlParam::Int(ministry.get()),
                    SqlParam::Date(date.date()),
                ],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&matched, "activity check")?, || {
            Denial::ActivityMismatch {
                activity,
                ministry,
                date: date.to_string(),
            }
        });
        log_decision("activity_matches", &decision);
        Ok(decision)
    }

    /// The caller may act on `target`: administrators always; otherwise when
    /// `target` is the caller's own record or belongs to a ministry where the
    /// caller is leader or collaborator.
    pub async fn can_access_member(&self, caller: &CallerContext, target: PersonId) -> GatewayResult<Decision> {
        if self.is_admin(caller).is_allowed() {
            return Ok(Decision::Allowed);
        }
        require_id(target.is_valid(), "member id")?;

        let allowed = self
            .gateway
            .run_private(
                CAN_ACCESS_MEMBER_SQL,
                &[
                    SqlParam::Int(caller.user_id().get()),
                    SqlParam::Int(target.get()),
                    SqlParam::IntArray(self.gateway.roles().allowed_raw()),
                ],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&allowed, "member access check")?, || {
            Denial::MemberOutOfScope { person: target }
        });
        log_decision("can_access_member", &decision);
        Ok(decision)
    }

    /// The caller may manage activities of `ministry`: administrators always;
    /// otherwise when the caller is leader or collaborator of it directly.
    pub async fn can_access_ministry_activity(
        &self,
        caller: &CallerContext,
        ministry: MinistryId,
    ) -> GatewayResult<Decision> {
        if self.is_admin(caller).is_allowed() {
            return Ok(Decision::Allowed);
        }
        require_id(ministry.is_valid(), "ministry id")?;

        let allowed = self
            .gateway
            .run_private(
                CAN_ACCESS_MINISTRY_SQL,
                &[
                    SqlParam::Int(caller.user_id().get()),
                    SqlParam::Int(ministry.get()),
                    SqlParam::IntArray(self.gateway.roles().allowed_raw()),
                ],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&allowed, "ministry access check")?, || {
            Denial::MinistryOutOfScope { ministry }
        });
        log_decision("can_access_ministry_activity", &decision);
        Ok(decision)
    }

    /// Strict equality of the caller's role against the administrator role.
    pub fn is_admin(&self, caller: &CallerContext) -> Decision {
        self.gateway.roles().check_admin(caller.role())
    }

    /// The caller is a leader (not a collaborator) of the parent of
    /// `ministry`, or of `ministry` itself when it is top-level.
    ///
    /// No administrator bypass. A caller without a linked person is denied.
    pub async fn is_leader_of_parent_ministry(
        &self,
        caller: &CallerContext,
        ministry: MinistryId,
    ) -> GatewayResult<Decision> {
        require_id(ministry.is_valid(), "ministry id")?;

        let person = match self.gateway.resolve_person(caller).await {
            Ok(person) => person,
            Err(GatewayError::Authorization(denial)) => {
                log_decision("is_leader_of_parent_ministry", &Decision::Denied(denial.clone()));
                return Ok(Decision::Denied(denial));
            }
            Err(e) => return Err(e),
        };

        let allowed = self
            .gateway
            .run_guarded(
                LEADS_PARENT_MINISTRY_SQL,
                &[
                    SqlParam::Int(person.get()),
                    SqlParam::Int(ministry.get()),
                    SqlParam::Int(self.gateway.roles().leader.get()),
                ],
            )
            .await?;
        let decision = Decision::allow_if(scalar(&allowed, "parent leadership check")?, || {
            Denial::NotParentLeader { ministry }
        });
        log_decision("is_leader_of_parent_ministry", &decision);
        Ok(decision)
    }
}

fn require_id(valid: bool, what: &str) -> GatewayResult<()> {
    if valid {
        Ok(())
    } else {
        Err(GatewayError::Validation(format!("a positive {what} is required")))
    }
}

fn scalar(rows: &ResultSet, operation: &'static str) -> GatewayResult<bool> {
    rows.scalar_bool().map_err(|e| GatewayError::database(operation, e))
}

fn log_decision(guard: &'static str, decision: &Decision) {
    match decision {
        Decision::Allowed => info!(guard, "Authorization granted"),
        Decision::Denied(denial) => warn!(guard, reason = %denial, "Authorization denied"),
    }
}

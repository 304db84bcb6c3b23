//! Guarded mutations.
//!
//! Each operation awaits every guard it depends on, in order, before issuing
//! its statement. The first denial aborts the operation with
//! [`GatewayError::Authorization`] and nothing is written.
//!
//! A successful mutation is then recorded in the audit trail. An audit failure
//! is logged and reported through [`MutationOutcome::audited`]; it never turns
//! a committed mutation into an error.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use shepherd_rbac::{CallerContext, MinistryRole};
use shepherd_types::{ActivityId, MinistryId, PersonId};
use tracing::{info, instrument, warn};

use crate::error::{DatabaseError, GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::pool::{ConnectionPool, SqlParam};
use crate::value::{ResultSet, Value};

/// Largest attendance batch accepted in one call.
pub const MAX_ATTENDANCE_BATCH: usize = 1000;

const EXISTING_MEMBERSHIP_SQL: &str = "\
    SELECT pm.role_id FROM people_ministries pm \
    WHERE pm.person_id = $1::int AND pm.ministry_id = $2::int";

const INSERT_MEMBERSHIP_SQL: &str = "\
    WITH inserted AS (\
        INSERT INTO people_ministries (person_id, ministry_id, role_id) \
        VALUES ($1::int, $2::int, $3::int) \
        RETURNING person_id, ministry_id, role_id\
    ) \
    SELECT p.full_name AS member_name, m.name AS ministry_name \
    FROM inserted i \
    JOIN people p ON p.id = i.person_id \
    JOIN ministries m ON m.id = i.ministry_id";

const EXISTING_FAMILY_SQL: &str = "\
    SELECT f.relationship_id FROM families f \
    WHERE (f.person1_id = $1::int AND f.person2_id = $2::int) \
    OR (f.person1_id = $2::int AND f.person2_id = $1::int) \
    LIMIT 1";

const RELATIONSHIP_SQL: &str = "\
    SELECT r.id AS relationship_id, inv.id AS inverse_relationship_id \
    FROM aux_relationships r \
    JOIN aux_relationships inv ON inv.id = r.inverse_relationship_id \
    WHERE LOWER(r.name) = LOWER($1)";

const INSERT_FAMILY_SQL: &str = "\
    WITH inserted AS (\
        INSERT INTO families (person1_id, person2_id, relationship_id) \
        VALUES ($1::int, $2::int, $3::int), ($2::int, $1::int, $4::int) \
        RETURNING person1_id, person2_id, relationship_id\
    ) \
    SELECT i.person1_id, p1.full_name AS first_name, p2.full_name AS second_name, r.name AS relationship \
    FROM inserted i \
    JOIN people p1 ON p1.id = i.person1_id \
    JOIN people p2 ON p2.id = i.person2_id \
    JOIN aux_relationships r ON r.id = i.relationship_id \
    ORDER BY i.person1_id = $1::int DESC";

const INSERT_ATTENDANCE_SQL: &str = "\
    WITH inserted AS (\
        INSERT INTO attendances (activity_id, person_id) \
        SELECT $1::int, unnest($2::int[]) \
        ON CONFLICT (activity_id, person_id) DO NOTHING \
        RETURNING activity_id, person_id\
    ) \
    SELECT i.person_id, m.name AS ministry_name \
    FROM inserted i \
    JOIN activities a ON a.id = i.activity_id \
    JOIN ministries m ON m.id = a.ministry_id";

const DELETE_MINISTRY_SQL: &str = "DELETE FROM ministries WHERE id = $1::int RETURNING id, name";

/// Column of a person record that [`Gateway::update_member_field`] may change.
///
/// Identifiers, ownership and the auxiliary-table references are not listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberField {
    FirstMiddleName,
    LastName,
    BirthDate,
    Gender,
    Dni,
    Phone,
    Email,
    Address,
    Baptized,
    Responsible1Name,
    Responsible1Phone,
    Responsible2Name,
    Responsible2Phone,
    Notes,
}

impl MemberField {
    pub const ALL: [MemberField; 14] = [
        MemberField::FirstMiddleName,
        MemberField::LastName,
        MemberField::BirthDate,
        MemberField::Gender,
        MemberField::Dni,
        MemberField::Phone,
        MemberField::Email,
        MemberField::Address,
        MemberField::Baptized,
        MemberField::Responsible1Name,
        MemberField::Responsible1Phone,
        MemberField::Responsible2Name,
        MemberField::Responsible2Phone,
        MemberField::Notes,
    ];

    /// Column name in `people`.
    pub fn column(self) -> &'static str {
        match self {
            MemberField::FirstMiddleName => "first_middle_name",
            MemberField::LastName => "last_name",
            MemberField::BirthDate => "birth_date",
            MemberField::Gender => "gender",
            MemberField::Dni => "dni",
            MemberField::Phone => "phone",
            MemberField::Email => "email",
            MemberField::Address => "address",
            MemberField::Baptized => "baptized",
            MemberField::Responsible1Name => "responsible1_name",
            MemberField::Responsible1Phone => "responsible1_phone",
            MemberField::Responsible2Name => "responsible2_name",
            MemberField::Responsible2Phone => "responsible2_phone",
            MemberField::Notes => "notes",
        }
    }

    /// Converts `raw` into the bound parameter for this column.
    fn parse_value(self, raw: &str, today: NaiveDate) -> GatewayResult<SqlParam> {
        let raw = raw.trim();
        match self {
            MemberField::BirthDate => {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    GatewayError::Validation(format!("birth date '{raw}' is not a YYYY-MM-DD date"))
                })?;
                if date >= today {
                    return Err(GatewayError::Validation(
                        "birth date must be in the past".to_string(),
                    ));
                }
                Ok(SqlParam::Date(date))
            }
            MemberField::Baptized => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(SqlParam::Bool(true)),
                "false" | "no" => Ok(SqlParam::Bool(false)),
                _ => Err(GatewayError::Validation(format!(
                    "baptized must be true or false, got '{raw}'"
                ))),
            },
            MemberField::FirstMiddleName | MemberField::LastName if raw.is_empty() => Err(
                GatewayError::Validation(format!("{self} cannot be empty")),
            ),
            _ => Ok(SqlParam::from(raw)),
        }
    }
}

impl fmt::Display for MemberField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MemberField {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MemberField::ALL
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GatewayError::Validation(format!("field '{wanted}' cannot be updated")))
    }
}

/// Changes one column of a person record.
#[derive(Debug, Clone)]
pub struct MemberUpdate {
    pub member: PersonId,
    pub member_name: String,
    pub field: MemberField,
    pub value: String,
}

/// Result of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// One-line description of what changed.
    pub summary: String,
    /// Rows inserted, updated or deleted.
    pub affected: usize,
    /// The audit entry was written.
    pub audited: bool,
}

/// Adds a person to a ministry.
#[derive(Debug, Clone)]
pub struct MinistryLink {
    pub member: PersonId,
    pub member_name: String,
    pub ministry: MinistryId,
    pub ministry_name: String,
    pub role: MinistryRole,
}

/// Relates two people in both directions.
#[derive(Debug, Clone)]
pub struct FamilyLink {
    pub first: PersonId,
    pub first_name: String,
    pub second: PersonId,
    pub second_name: String,
    /// Relationship of `first` to `second`, by name (`aux_relationships.name`).
    pub relationship: String,
}

/// Marks people as present at an activity.
#[derive(Debug, Clone)]
pub struct Attendance {
    pub activity: ActivityId,
    pub ministry: MinistryId,
    /// `YYYY-MM-DD`
    pub date: String,
    pub members: Vec<PersonId>,
}

impl<P: ConnectionPool> Gateway<P> {
    /// Requires: the caller leads the parent ministry, and both names match their ids.
    #[instrument(skip_all, fields(user_id = %caller.user_id(), ministry_id = %link.ministry, person_id = %link.member))]
    pub async fn link_member_to_ministry(
        &self,
        caller: &CallerContext,
        link: &MinistryLink,
    ) -> GatewayResult<MutationOutcome> {
        let guards = self.authorizer();
        guards
            .is_leader_of_parent_ministry(caller, link.ministry)
            .await?
            .require::<GatewayError>()?;
        guards
            .identity_matches(link.member, &link.member_name)
            .await?
            .require::<GatewayError>()?;
        guards
            .ministry_matches(link.ministry, &link.ministry_name)
            .await?
            .require::<GatewayError>()?;

        let existing = self
            .run_guarded(
                EXISTING_MEMBERSHIP_SQL,
                &[SqlParam::Int(link.member.get()), SqlParam::Int(link.ministry.get())],
            )
            .await?;
        if !existing.is_empty() {
            let held = int_at(&existing, 0, "role_id")
                .ok()
                .and_then(|raw| self.roles().ministry_role(raw.into()))
                .map_or_else(|| "another role".to_string(), |role| role.to_string());
            return Err(GatewayError::Conflict(format!(
                "member is already linked to this ministry as {held}"
            )));
        }

        let inserted = self
            .run_guarded(
                INSERT_MEMBERSHIP_SQL,
                &[
                    SqlParam::Int(link.member.get()),
                    SqlParam::Int(link.ministry.get()),
                    SqlParam::Int(self.roles().role_id(link.role).get()),
                ],
            )
            .await?;
        let member_name = text_at(&inserted, 0, "member_name")?;
        let ministry_name = text_at(&inserted, 0, "ministry_name")?;

        let summary = format!("linked {member_name} to ministry {ministry_name} as {}", link.role);
        info!(%summary, "Ministry membership created");
        let audited = self.audit(caller, "link", "ministry membership", &summary).await;
        Ok(MutationOutcome {
            summary,
            affected: inserted.len(),
            audited,
        })
    }

    /// Requires: both names match their ids and the two people differ.
    ///
    /// Both directions are written by one statement, so either both rows exist
    /// afterwards or neither does.
    #[instrument(skip_all, fields(user_id = %caller.user_id(), first = %link.first, second = %link.second))]
    pub async fn link_family_members(
        &self,
        caller: &CallerContext,
        link: &FamilyLink,
    ) -> GatewayResult<MutationOutcome> {
        if link.first == link.second {
            return Err(GatewayError::Validation(
                "a person cannot be related to themselves".to_string(),
            ));
        }
        if link.relationship.trim().is_empty() {
            return Err(GatewayError::Validation("a relationship name is required".to_string()));
        }

        let guards = self.authorizer();
        guards
            .identity_matches(link.first, &link.first_name)
            .await?
            .require::<GatewayError>()?;
        guards
            .identity_matches(link.second, &link.second_name)
            .await?
            .require::<GatewayError>()?;

        let pair = [SqlParam::Int(link.first.get()), SqlParam::Int(link.second.get())];
        if !self.run_guarded(EXISTING_FAMILY_SQL, &pair).await?.is_empty() {
            return Err(GatewayError::Conflict(format!(
                "a relationship between {} and {} already exists",
                link.first_name, link.second_name
            )));
        }

        let relationship = self
            .run_guarded(RELATIONSHIP_SQL, &[SqlParam::from(link.relationship.trim())])
            .await?;
        if relationship.is_empty() {
            return Err(GatewayError::NotFound(format!(
                "relationship type '{}'",
                link.relationship.trim()
            )));
        }
        let forward = int_at(&relationship, 0, "relationship_id")?;
        let inverse = int_at(&relationship, 0, "inverse_relationship_id")?;

        let [first, second] = pair;
        let inserted = self
            .run_guarded(
                INSERT_FAMILY_SQL,
                &[first, second, SqlParam::Int(forward), SqlParam::Int(inverse)],
            )
            .await?;
        let summary = format!(
            "linked {} as {} of {}",
            text_at(&inserted, 0, "first_name")?,
            text_at(&inserted, 0, "relationship")?,
            text_at(&inserted, 0, "second_name")?,
        );
        info!(%summary, "Family relationship created");
        let audited = self.audit(caller, "link", "family", &summary).await;
        Ok(MutationOutcome {
            summary,
            affected: inserted.len(),
            audited,
        })
    }

    /// Requires: the activity belongs to the ministry on that date, and the
    /// caller may manage that ministry's activities.
    ///
    /// People already registered are skipped.
    #[instrument(skip_all, fields(user_id = %caller.user_id(), activity_id = %attendance.activity, members = attendance.members.len()))]
    pub async fn register_attendance(
        &self,
        caller: &CallerContext,
        attendance: &Attendance,
    ) -> GatewayResult<MutationOutcome> {
        if attendance.members.is_empty() || attendance.members.len() > MAX_ATTENDANCE_BATCH {
            return Err(GatewayError::Validation(format!(
                "between 1 and {MAX_ATTENDANCE_BATCH} member ids are required, got {}",
                attendance.members.len()
            )));
        }
        if let Some(bad) = attendance.members.iter().find(|m| !m.is_valid()) {
            return Err(GatewayError::Validation(format!("invalid member id {bad}")));
        }

        let guards = self.authorizer();
        guards
            .activity_matches(attendance.activity, attendance.ministry, &attendance.date)
            .await?
            .require::<GatewayError>()?;
        guards
            .can_access_ministry_activity(caller, attendance.ministry)
            .await?
            .require::<GatewayError>()?;

        let members: Vec<i32> = attendance.members.iter().map(|m| m.get()).collect();
        let inserted = self
            .run_guarded(
                INSERT_ATTENDANCE_SQL,
                &[SqlParam::Int(attendance.activity.get()), SqlParam::IntArray(members)],
            )
            .await?;
        if inserted.is_empty() {
            return Err(GatewayError::Conflict(
                "every listed member is already registered for this activity".to_string(),
            ));
        }

        let ministry_name = text_at(&inserted, 0, "ministry_name")?;
        let summary = format!(
            "registered attendance of {} member(s) for ministry {ministry_name} on {}",
            inserted.len(),
            attendance.date.trim()
        );
        info!(%summary, "Attendance registered");
        let audited = self.audit(caller, "register attendance", "activities", &summary).await;
        Ok(MutationOutcome {
            summary,
            affected: inserted.len(),
            audited,
        })
    }

    /// Requires: the name matches the id, and the caller may access that person.
    ///
    /// The column comes from [`MemberField`]; the value is always bound.
    #[instrument(skip_all, fields(user_id = %caller.user_id(), person_id = %update.member, field = %update.field))]
    pub async fn update_member_field(
        &self,
        caller: &CallerContext,
        update: &MemberUpdate,
    ) -> GatewayResult<MutationOutcome> {
        let value = update.field.parse_value(&update.value, Utc::now().date_naive())?;

        let guards = self.authorizer();
        guards
            .identity_matches(update.member, &update.member_name)
            .await?
            .require::<GatewayError>()?;
        guards
            .can_access_member(caller, update.member)
            .await?
            .require::<GatewayError>()?;

        let sql = format!(
            "UPDATE people SET {} = $1 WHERE id = $2::int RETURNING id, full_name",
            update.field.column()
        );
        let updated = self
            .run_guarded(&sql, &[value, SqlParam::Int(update.member.get())])
            .await?;
        if updated.is_empty() {
            return Err(GatewayError::NotFound(format!("member {}", update.member)));
        }

        let summary = format!(
            "updated {} of {} (id {}) to '{}'",
            update.field,
            text_at(&updated, 0, "full_name")?,
            update.member,
            update.value.trim()
        );
        info!(%summary, "Member updated");
        let audited = self.audit(caller, "update", "people", &summary).await;
        Ok(MutationOutcome {
            summary,
            affected: updated.len(),
            audited,
        })
    }

    /// Requires: the caller is an administrator and the name matches the id.
    #[instrument(skip_all, fields(user_id = %caller.user_id(), ministry_id = %ministry))]
    pub async fn remove_ministry(
        &self,
        caller: &CallerContext,
        ministry: MinistryId,
        ministry_name: &str,
    ) -> GatewayResult<MutationOutcome> {
        let guards = self.authorizer();
        guards.is_admin(caller).require::<GatewayError>()?;
        guards
            .ministry_matches(ministry, ministry_name)
            .await?
            .require::<GatewayError>()?;

        let deleted = self
            .run_guarded(DELETE_MINISTRY_SQL, &[SqlParam::Int(ministry.get())])
            .await?;
        if deleted.is_empty() {
            return Err(GatewayError::NotFound(format!("ministry {ministry}")));
        }

        let summary = format!("removed ministry {} (id {ministry})", ministry_name.trim());
        info!(%summary, "Ministry removed");
        let audited = self.audit(caller, "remove", "ministries", &summary).await;
        Ok(MutationOutcome {
            summary,
            affected: deleted.len(),
            audited,
        })
    }

    async fn audit(&self, caller: &CallerContext, action: &str, category: &str, detail: &str) -> bool {
        match self
            .audit_log()
            .record(caller.user_id(), action, category, detail)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, action, "Audit entry not recorded");
                false
            }
        }
    }
}

fn int_at(rows: &ResultSet, row: usize, column: &'static str) -> GatewayResult<i32> {
    match rows.get(row, column) {
        Some(Value::Int(raw)) => i32::try_from(*raw).map_err(|_| unexpected(column)),
        _ => Err(unexpected(column)),
    }
}

fn text_at(rows: &ResultSet, row: usize, column: &'static str) -> GatewayResult<String> {
    rows.get(row, column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| unexpected(column))
}

fn unexpected(column: &str) -> GatewayError {
    GatewayError::database(
        "mutation",
        DatabaseError::UnexpectedResult(format!("missing column '{column}'")),
    )
}

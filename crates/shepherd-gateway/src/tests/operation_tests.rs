//! Guarded mutations: guards precede writes, and audit failures do not undo them.

use chrono::NaiveDate;
use shepherd_rbac::{Denial, MinistryRole};
use shepherd_types::{ActivityId, MinistryId, PersonId};

use super::{ScriptedPool, admin, gateway, member, no, person, yes};
use crate::error::{DatabaseError, GatewayError};
use crate::operations::{
    Attendance, FamilyLink, MAX_ATTENDANCE_BATCH, MemberField, MemberUpdate, MinistryLink,
};
use crate::pool::SqlParam;
use crate::value::{ResultSet, Value};

fn text_row(columns: &[&str], values: &[&str]) -> ResultSet {
    ResultSet::new(
        columns.iter().map(|c| (*c).to_string()).collect(),
        vec![values.iter().map(|v| Value::Text((*v).to_string())).collect()],
    )
}

fn link() -> MinistryLink {
    MinistryLink {
        member: PersonId::new(12),
        member_name: "Ana Gómez".to_string(),
        ministry: MinistryId::new(8),
        ministry_name: "Jovenes".to_string(),
        role: MinistryRole::Collaborator,
    }
}

/// Position of the first executed statement containing `pattern`.
fn position(pool: &ScriptedPool, pattern: &str) -> usize {
    pool.executed()
        .iter()
        .position(|sql| sql.contains(pattern))
        .unwrap()
}

#[tokio::test]
async fn test_link_member_runs_guards_then_writes_then_audits() {
    let pool = ScriptedPool::new()
        .on("FROM users", person(42))
        .on("parent_ministry_id", yes())
        .on("normalized_full_name", yes())
        .on("normalized_name", yes())
        .on(
            "INSERT INTO people_ministries",
            text_row(&["member_name", "ministry_name"], &["Ana Gómez", "Jovenes"]),
        );
    let gw = gateway(pool.clone());

    let outcome = gw.link_member_to_ministry(&member(), &link()).await.unwrap();

    assert_eq!(outcome.summary, "linked Ana Gómez to ministry Jovenes as collaborator");
    assert_eq!(outcome.affected, 1);
    assert!(outcome.audited);

    let parent = position(&pool, "parent_ministry_id");
    let identity = position(&pool, "normalized_full_name");
    let ministry = position(&pool, "normalized_name");
    let insert = position(&pool, "INSERT INTO people_ministries");
    let audit = position(&pool, "INSERT INTO audit_log");
    assert!(parent < identity && identity < ministry && ministry < insert && insert < audit);

    assert_eq!(
        pool.params_of("INSERT INTO people_ministries"),
        Some(vec![SqlParam::Int(12), SqlParam::Int(8), SqlParam::Int(11)])
    );
    assert_eq!(pool.live(), 0);
}

#[tokio::test]
async fn test_link_member_denied_never_writes() {
    let pool = ScriptedPool::new()
        .on("FROM users", person(42))
        .on("parent_ministry_id", yes())
        .on("normalized_full_name", no());
    let gw = gateway(pool.clone());

    let err = gw.link_member_to_ministry(&member(), &link()).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Authorization(Denial::IdentityMismatch { .. })
    ));
    assert!(!pool.ran("normalized_name"));
    assert!(!pool.ran("INSERT"));
    assert_eq!(pool.live(), 0);
}

#[tokio::test]
async fn test_link_member_collaborator_cannot_assign() {
    let pool = ScriptedPool::new()
        .on("FROM users", person(42))
        .on("parent_ministry_id", no());
    let gw = gateway(pool.clone());

    let err = gw.link_member_to_ministry(&member(), &link()).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Authorization(Denial::NotParentLeader { .. })
    ));
    assert!(!pool.ran("normalized_full_name"));
    assert!(!pool.ran("INSERT"));
}

#[tokio::test]
async fn test_link_member_existing_link_is_a_conflict() {
    let pool = ScriptedPool::new()
        .on("FROM users", person(42))
        .on("parent_ministry_id", yes())
        .on("normalized_full_name", yes())
        .on("normalized_name", yes())
        .on("SELECT pm.role_id", ResultSet::scalar("role_id", Value::Int(10)));
    let gw = gateway(pool.clone());

    let err = gw.link_member_to_ministry(&member(), &link()).await.unwrap_err();

    match err {
        GatewayError::Conflict(message) => assert!(message.ends_with("as leader")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!pool.ran("INSERT"));
}

fn family() -> FamilyLink {
    FamilyLink {
        first: PersonId::new(12),
        first_name: "Ana Gómez".to_string(),
        second: PersonId::new(13),
        second_name: "Luis Gómez".to_string(),
        relationship: "Madre".to_string(),
    }
}

#[tokio::test]
async fn test_family_link_writes_both_directions_in_one_statement() {
    let relationship = ResultSet::new(
        vec!["relationship_id".to_string(), "inverse_relationship_id".to_string()],
        vec![vec![Value::Int(3), Value::Int(4)]],
    );
    let pool = ScriptedPool::new()
        .on("normalized_full_name", yes())
        .on("FROM aux_relationships r", relationship)
        .on(
            "INSERT INTO families",
            text_row(
                &["first_name", "relationship", "second_name"],
                &["Ana Gómez", "Madre", "Luis Gómez"],
            ),
        );
    let gw = gateway(pool.clone());

    let outcome = gw.link_family_members(&member(), &family()).await.unwrap();

    assert_eq!(outcome.summary, "linked Ana Gómez as Madre of Luis Gómez");
    assert_eq!(
        pool.params_of("INSERT INTO families"),
        Some(vec![
            SqlParam::Int(12),
            SqlParam::Int(13),
            SqlParam::Int(3),
            SqlParam::Int(4),
        ])
    );
    let inserts = pool
        .executed()
        .iter()
        .filter(|sql| sql.contains("INSERT INTO families"))
        .count();
    assert_eq!(inserts, 1);
}

#[tokio::test]
async fn test_family_link_to_self_is_rejected() {
    let pool = ScriptedPool::new();
    let gw = gateway(pool.clone());
    let mut link = family();
    link.second = link.first;

    let err = gw.link_family_members(&member(), &link).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(pool.acquired(), 0);
}

#[tokio::test]
async fn test_family_link_checks_both_identities() {
    let pool = ScriptedPool::new().on("normalized_full_name", no());
    let gw = gateway(pool.clone());

    let err = gw.link_family_members(&member(), &family()).await.unwrap_err();
    assert!(err.is_denial());
    assert_eq!(pool.executed().len(), 1);
}

#[tokio::test]
async fn test_family_link_unknown_relationship() {
    let pool = ScriptedPool::new().on("normalized_full_name", yes());
    let gw = gateway(pool.clone());

    let err = gw.link_family_members(&member(), &family()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(!pool.ran("INSERT"));
}

fn attendance(members: Vec<PersonId>) -> Attendance {
    Attendance {
        activity: ActivityId::new(9),
        ministry: MinistryId::new(4),
        date: "2024-03-10".to_string(),
        members,
    }
}

#[tokio::test]
async fn test_attendance_is_a_single_batched_insert() {
    let inserted = ResultSet::new(
        vec!["person_id".to_string(), "ministry_name".to_string()],
        vec![
            vec![Value::Int(12), Value::Text("Jovenes".to_string())],
            vec![Value::Int(13), Value::Text("Jovenes".to_string())],
        ],
    );
    let pool = ScriptedPool::new()
        .on("FROM activities", yes())
        .on("JOIN users u ON u.person_id", yes())
        .on("INSERT INTO attendances", inserted);
    let gw = gateway(pool.clone());

    let outcome = gw
        .register_attendance(
            &member(),
            &attendance(vec![PersonId::new(12), PersonId::new(13), PersonId::new(14)]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert_eq!(
        outcome.summary,
        "registered attendance of 2 member(s) for ministry Jovenes on 2024-03-10"
    );
    assert_eq!(
        pool.params_of("INSERT INTO attendances"),
        Some(vec![SqlParam::Int(9), SqlParam::IntArray(vec![12, 13, 14])])
    );
    assert!(position(&pool, "FROM activities") < position(&pool, "JOIN users u ON u.person_id"));
}

#[tokio::test]
async fn test_attendance_batch_bounds() {
    let pool = ScriptedPool::new();
    let gw = gateway(pool.clone());

    let err = gw
        .register_attendance(&member(), &attendance(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    let too_many = (1..=i32::try_from(MAX_ATTENDANCE_BATCH).unwrap() + 1)
        .map(PersonId::new)
        .collect();
    let err = gw
        .register_attendance(&member(), &attendance(too_many))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(pool.acquired(), 0);
}

#[tokio::test]
async fn test_attendance_denied_outside_ministry() {
    let pool = ScriptedPool::new()
        .on("FROM activities", yes())
        .on("JOIN users u ON u.person_id", no());
    let gw = gateway(pool.clone());

    let err = gw
        .register_attendance(&member(), &attendance(vec![PersonId::new(12)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Authorization(Denial::MinistryOutOfScope { .. })
    ));
    assert!(!pool.ran("INSERT"));
}

#[tokio::test]
async fn test_remove_ministry_requires_admin() {
    let pool = ScriptedPool::new();
    let gw = gateway(pool.clone());

    let err = gw
        .remove_ministry(&member(), MinistryId::new(4), "Jovenes")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Authorization(Denial::NotAdministrator)));
    assert_eq!(pool.acquired(), 0);
}

#[tokio::test]
async fn test_remove_ministry_keeps_success_when_audit_fails() {
    let pool = ScriptedPool::new()
        .on("normalized_name", yes())
        .on(
            "DELETE FROM ministries",
            ResultSet::new(
                vec!["id".to_string(), "name".to_string()],
                vec![vec![Value::Int(4), Value::Text("Jovenes".to_string())]],
            ),
        )
        .fail_on("audit_log", DatabaseError::Pool("connection refused".to_string()));
    let gw = gateway(pool.clone());

    let outcome = gw
        .remove_ministry(&admin(), MinistryId::new(4), "Jovenes")
        .await
        .unwrap();

    assert_eq!(outcome.summary, "removed ministry Jovenes (id 4)");
    assert!(!outcome.audited);
    assert_eq!(pool.live(), 0);
}

#[tokio::test]
async fn test_remove_missing_ministry() {
    let pool = ScriptedPool::new().on("normalized_name", yes());
    let gw = gateway(pool.clone());

    let err = gw
        .remove_ministry(&admin(), MinistryId::new(4), "Jovenes")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(!pool.ran("audit_log"));
}

fn phone_update() -> MemberUpdate {
    MemberUpdate {
        member: PersonId::new(12),
        member_name: "Ana Gómez".to_string(),
        field: MemberField::Phone,
        value: "3516667718".to_string(),
    }
}

fn updated_row() -> ResultSet {
    ResultSet::new(
        vec!["id".to_string(), "full_name".to_string()],
        vec![vec![Value::Int(12), Value::Text("Ana Gómez".to_string())]],
    )
}

#[tokio::test]
async fn test_update_member_checks_identity_then_access_then_writes() {
    let pool = ScriptedPool::new()
        .on("normalized_full_name", yes())
        .on("people_ministries target", yes())
        .on("UPDATE people", updated_row());
    let gw = gateway(pool.clone());

    let outcome = gw.update_member_field(&member(), &phone_update()).await.unwrap();

    assert_eq!(outcome.summary, "updated phone of Ana Gómez (id 12) to '3516667718'");
    assert_eq!(outcome.affected, 1);
    assert!(outcome.audited);

    let identity = position(&pool, "normalized_full_name");
    let access = position(&pool, "people_ministries target");
    let update = position(&pool, "UPDATE people");
    let audit = position(&pool, "INSERT INTO audit_log");
    assert!(identity < access && access < update && update < audit);

    let executed = pool.executed();
    assert!(executed[update].starts_with("UPDATE people SET phone = $1 WHERE id = $2::int"));
    assert_eq!(
        pool.params_of("UPDATE people"),
        Some(vec![SqlParam::Text("3516667718".to_string()), SqlParam::Int(12)])
    );
    assert_eq!(pool.live(), 0);
}

#[tokio::test]
async fn test_update_member_out_of_scope_never_writes() {
    let pool = ScriptedPool::new()
        .on("normalized_full_name", yes())
        .on("people_ministries target", no());
    let gw = gateway(pool.clone());

    let err = gw.update_member_field(&member(), &phone_update()).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Authorization(Denial::MemberOutOfScope { .. })
    ));
    assert!(!pool.ran("UPDATE"));
    assert!(!pool.ran("audit_log"));
    assert_eq!(pool.live(), 0);
}

#[tokio::test]
async fn test_update_member_identity_mismatch_skips_access_check() {
    let pool = ScriptedPool::new().on("normalized_full_name", no());
    let gw = gateway(pool.clone());

    let err = gw.update_member_field(&member(), &phone_update()).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Authorization(Denial::IdentityMismatch { .. })
    ));
    assert!(!pool.ran("people_ministries target"));
    assert!(!pool.ran("UPDATE"));
}

#[tokio::test]
async fn test_update_member_admin_bypasses_access_check() {
    let pool = ScriptedPool::new()
        .on("normalized_full_name", yes())
        .on("UPDATE people", updated_row());
    let gw = gateway(pool.clone());

    let outcome = gw.update_member_field(&admin(), &phone_update()).await.unwrap();

    assert_eq!(outcome.affected, 1);
    assert!(!pool.ran("people_ministries target"));
    assert!(pool.ran("UPDATE people SET phone"));
}

#[tokio::test]
async fn test_update_member_binds_typed_values() {
    let pool = ScriptedPool::new()
        .on("normalized_full_name", yes())
        .on("UPDATE people", updated_row());
    let gw = gateway(pool.clone());
    let mut update = phone_update();
    update.field = MemberField::BirthDate;
    update.value = "1996-01-23".to_string();

    gw.update_member_field(&admin(), &update).await.unwrap();

    assert_eq!(
        pool.params_of("UPDATE people SET birth_date"),
        Some(vec![
            SqlParam::Date(NaiveDate::from_ymd_opt(1996, 1, 23).unwrap()),
            SqlParam::Int(12),
        ])
    );
}

#[tokio::test]
async fn test_update_member_rejects_bad_values_without_connecting() {
    let pool = ScriptedPool::new();
    let gw = gateway(pool.clone());

    for (field, value) in [
        (MemberField::BirthDate, "2999-01-01"),
        (MemberField::BirthDate, "23/01/1996"),
        (MemberField::Baptized, "maybe"),
        (MemberField::LastName, "  "),
    ] {
        let mut update = phone_update();
        update.field = field;
        update.value = value.to_string();
        let err = gw.update_member_field(&admin(), &update).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)), "{field} = {value}");
    }
    assert_eq!(pool.acquired(), 0);
}

#[test]
fn test_member_field_allow_list() {
    assert_eq!("Phone".parse::<MemberField>().unwrap(), MemberField::Phone);
    assert_eq!(" birth_date ".parse::<MemberField>().unwrap(), MemberField::BirthDate);
    for rejected in ["id", "user_id", "phone = 1, user_id", "full_name"] {
        assert!(matches!(
            rejected.parse::<MemberField>(),
            Err(GatewayError::Validation(_))
        ));
    }
}

#[tokio::test]
async fn test_update_missing_member() {
    let pool = ScriptedPool::new().on("normalized_full_name", yes());
    let gw = gateway(pool.clone());

    let err = gw.update_member_field(&admin(), &phone_update()).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(!pool.ran("audit_log"));
}

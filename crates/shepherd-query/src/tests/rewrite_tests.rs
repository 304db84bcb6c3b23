//! Row-level rewriter cases.

use super::{leader_scope, scope_predicate};
use crate::{QueryError, TablePolicy, is_read_only, rewrite, screen};

#[test]
fn test_where_clause_is_conjoined() {
    let out = rewrite(
        "SELECT id, first_middle_name FROM vw_people WHERE birth_date > '2000-01-01'",
        &leader_scope(),
    )
    .unwrap();

    assert_eq!(out.scoped, 1);
    assert_eq!(
        out.sql,
        format!(
            "SELECT id, first_middle_name FROM vw_people WHERE (birth_date > '2000-01-01') AND {}",
            scope_predicate("vw_people")
        )
    );
}

#[test]
fn test_where_clause_is_installed() {
    let out = rewrite("SELECT id FROM vw_people", &leader_scope()).unwrap();
    assert_eq!(
        out.sql,
        format!("SELECT id FROM vw_people WHERE {}", scope_predicate("vw_people"))
    );
}

#[test]
fn test_disjunction_cannot_widen_scope() {
    let out = rewrite("SELECT id FROM vw_people WHERE id = 1 OR id > 0", &leader_scope()).unwrap();
    assert!(out.sql.starts_with("SELECT id FROM vw_people WHERE (id = 1 OR id > 0) AND ("));
}

#[test]
fn test_alias_qualifies_predicate() {
    let out = rewrite("SELECT p.id FROM vw_people p WHERE p.active", &leader_scope()).unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.contains(&scope_predicate("p")));
    assert!(!out.sql.contains("vw_people.id IN"));
}

#[test]
fn test_column_alias_list_is_scoped_before_renaming() {
    let out = rewrite(
        "SELECT v.* FROM vw_people AS v(real_id, first_middle_name, id)",
        &leader_scope(),
    )
    .unwrap();

    assert_eq!(out.scoped, 1);
    assert_eq!(
        out.sql,
        format!(
            "SELECT v.* FROM (SELECT * FROM vw_people WHERE {}) AS v (real_id, first_middle_name, id)",
            scope_predicate("vw_people")
        )
    );
    assert!(!out.sql.contains("v.id IN"));
}

#[test]
fn test_column_alias_list_inside_join_is_scoped() {
    let out = rewrite(
        "SELECT a.id FROM vw_people a JOIN vw_people AS b(x, y, id) ON a.id = b.x",
        &leader_scope(),
    )
    .unwrap();

    assert_eq!(out.scoped, 2);
    assert!(out.sql.contains(&scope_predicate("a")));
    assert!(out.sql.contains(&format!(
        "JOIN (SELECT * FROM vw_people WHERE {}) AS b (x, y, id)",
        scope_predicate("vw_people")
    )));
    assert!(!out.sql.contains("b.id IN"));
}

#[test]
fn test_schema_qualified_reference() {
    let out = rewrite("SELECT id FROM public.vw_people", &leader_scope()).unwrap();
    assert!(out.sql.contains(&scope_predicate("public.vw_people")));
}

#[test]
fn test_view_name_matches_case_insensitively() {
    let out = rewrite("SELECT id FROM VW_PEOPLE", &leader_scope()).unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.contains(&scope_predicate("VW_PEOPLE")));
}

#[test]
fn test_every_occurrence_is_scoped_independently() {
    let out = rewrite(
        "SELECT a.id FROM vw_people a JOIN vw_people b ON a.family_id = b.family_id",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(out.scoped, 2);
    assert!(out.sql.contains(&scope_predicate("a")));
    assert!(out.sql.contains(&scope_predicate("b")));
}

#[test]
fn test_nested_subquery_is_scoped() {
    let out = rewrite(
        "SELECT m.name FROM ministries m WHERE m.id IN \
         (SELECT pm.ministry_id FROM people_ministries pm JOIN vw_people v ON v.id = pm.person_id)",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.contains(&scope_predicate("v")));
    assert!(out.sql.starts_with("SELECT m.name FROM ministries"));
}

#[test]
fn test_derived_table_is_scoped() {
    let out = rewrite(
        "SELECT count(*) FROM (SELECT id FROM vw_people) AS x",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.contains(&scope_predicate("vw_people")));
}

#[test]
fn test_nested_join_is_scoped() {
    let out = rewrite(
        "SELECT v.id FROM (vw_people v JOIN people_ministries pm ON pm.person_id = v.id)",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.contains(&scope_predicate("v")));
}

#[test]
fn test_set_operation_and_cte_are_scoped() {
    let union = rewrite(
        "SELECT id FROM vw_people WHERE active UNION SELECT id FROM vw_people WHERE NOT active",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(union.scoped, 2);

    let cte = rewrite(
        "WITH young AS (SELECT id FROM vw_people WHERE birth_date > '2000-01-01') SELECT * FROM young",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(cte.scoped, 1);
}

#[test]
fn test_unrelated_query_is_unchanged() {
    let sql = "SELECT id, name FROM ministries WHERE parent_id = 3 ORDER BY name";
    let out = rewrite(sql, &leader_scope()).unwrap();
    assert_eq!(out.scoped, 0);
    assert!(!out.was_scoped());
    assert_eq!(out.sql, sql);
}

#[test]
fn test_statements_are_rewritten_independently() {
    let out = rewrite("SELECT 1; SELECT id FROM vw_people", &leader_scope()).unwrap();
    assert_eq!(out.scoped, 1);
    assert!(out.sql.starts_with("SELECT 1; SELECT id FROM vw_people WHERE "));
}

#[test]
fn test_rewritten_sql_stays_read_only_and_guarded() {
    let out = rewrite(
        "SELECT v.id FROM vw_people v WHERE v.id IN (SELECT id FROM vw_people WHERE active)",
        &leader_scope(),
    )
    .unwrap();
    assert_eq!(out.scoped, 2);
    assert!(is_read_only(&out.sql));
    assert!(!TablePolicy::default().touches_denied_table(&out.sql));
    assert_eq!(screen(&out.sql).unwrap().len(), 1);
}

#[test]
fn test_table_body_is_rejected() {
    let err = rewrite("TABLE vw_people", &leader_scope()).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_write_is_rejected() {
    let err = rewrite("DELETE FROM vw_people", &leader_scope()).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_unparseable_is_rejected() {
    assert!(matches!(
        rewrite("SELEC id FROM vw_people", &leader_scope()),
        Err(QueryError::Parse(_))
    ));
    assert_eq!(rewrite("", &leader_scope()), Err(QueryError::Empty));
}

#[test]
fn test_custom_schema_names() {
    let scope = leader_scope().with_tables("vw_members", "member_groups", "members");
    let out = rewrite("SELECT id FROM vw_members", &scope).unwrap();
    assert!(out.sql.contains("FROM member_groups AS shepherd_rls_members"));
    assert!(out.sql.contains("FROM members AS shepherd_rls_self"));

    let untouched = rewrite("SELECT id FROM vw_people", &scope).unwrap();
    assert_eq!(untouched.scoped, 0);
}

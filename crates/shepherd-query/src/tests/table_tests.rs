//! Private-table guard cases.

use std::collections::BTreeSet;

use test_case::test_case;

use crate::{TablePolicy, referenced_tables};

#[test_case("SELECT * FROM users"; "direct")]
#[test_case("SELECT * FROM (SELECT * FROM users) u"; "derived table")]
#[test_case("SELECT id FROM people WHERE user_id IN (SELECT id FROM users)"; "where subquery")]
#[test_case("SELECT p.id FROM people p JOIN refresh_tokens t ON t.user_id = p.user_id"; "join")]
#[test_case("SELECT p.id FROM (people p JOIN aux_user_roles r ON r.id = p.id)"; "nested join")]
#[test_case("WITH x AS (SELECT * FROM audit_log) SELECT * FROM x"; "cte body")]
#[test_case("SELECT id FROM people UNION SELECT id FROM users"; "union branch")]
#[test_case("SELECT * FROM public.users"; "schema qualified")]
#[test_case("SELECT * FROM USERS"; "upper case")]
#[test_case("TABLE users"; "table body")]
#[test_case("SELECT 1 UNION TABLE users"; "table body in set operation")]
#[test_case("INSERT INTO audit_log (action) VALUES ('x')"; "insert target")]
#[test_case("UPDATE users SET role_id = 1"; "update target")]
#[test_case("DELETE FROM refresh_tokens"; "delete target")]
#[test_case("DROP TABLE users"; "drop")]
#[test_case("TRUNCATE audit_log"; "truncate")]
#[test_case("ALTER TABLE users ADD COLUMN x int"; "alter")]
#[test_case("SELECT 1; DELETE FROM users"; "second statement")]
#[test_case("SELECT id FROM people WHERE EXISTS (SELECT 1 FROM users WHERE users.id = people.user_id)"; "exists")]
#[test_case("SELEC * FROM people"; "unparseable")]
#[test_case(""; "empty")]
fn test_touches_denied_table(sql: &str) {
    assert!(TablePolicy::default().touches_denied_table(sql));
}

#[test_case("SELECT * FROM people"; "people")]
#[test_case("SELECT id FROM vw_people v JOIN people_ministries pm ON pm.person_id = v.id"; "join")]
#[test_case("SELECT 'users' AS label FROM ministries"; "string literal")]
#[test_case("SELECT users FROM ministries"; "column named like a table")]
#[test_case("UPDATE people SET active = false WHERE id = 5"; "allowed write")]
fn test_does_not_touch_denied_table(sql: &str) {
    assert!(!TablePolicy::default().touches_denied_table(sql));
}

#[test]
fn test_denied_tables_reports_matches() {
    let policy = TablePolicy::default();
    let found = policy
        .denied_tables("SELECT * FROM users u JOIN audit_log a ON a.user_id = u.id JOIN people p ON p.user_id = u.id")
        .unwrap();
    let expected: BTreeSet<String> = ["audit_log", "users"].into_iter().map(String::from).collect();
    assert_eq!(found, expected);
}

#[test]
fn test_custom_deny_list() {
    let policy = TablePolicy::new(["donations"]);
    assert!(policy.touches_denied_table("SELECT amount FROM donations"));
    assert!(!policy.touches_denied_table("SELECT * FROM users"));
}

#[test]
fn test_referenced_tables_for_query() {
    let tables = referenced_tables(
        "SELECT m.name FROM ministries m WHERE m.id IN (SELECT ministry_id FROM people_ministries)",
    )
    .unwrap();
    let expected: BTreeSet<String> = ["ministries", "people_ministries"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(tables, expected);
}

//! Parsing front end shared by every decision in this crate.
//!
//! All decisions start from [`screen`]. Text that is empty, yields no
//! statements, or fails to parse comes back as `Err`, and every caller maps
//! that `Err` to its denying answer. There is exactly one place where "could not
//! understand the input" is decided.

use sqlparser::ast::{ObjectName, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use crate::error::{QueryError, Result};

/// Maximum parser nesting depth. Deeper input is rejected as unparseable.
pub const RECURSION_LIMIT: usize = 64;

/// Parses `sql` into one or more statements, or explains why it cannot.
pub fn screen(sql: &str) -> Result<Vec<Statement>> {
    if sql.trim().is_empty() {
        return Err(QueryError::Empty);
    }

    let statements = Parser::new(&PostgreSqlDialect {})
        .with_recursion_limit(RECURSION_LIMIT)
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_statements())
        .map_err(|e| {
            debug!(error = %e, "SQL rejected by parser");
            QueryError::Parse(e.to_string())
        })?;

    if statements.is_empty() {
        return Err(QueryError::Empty);
    }
    Ok(statements)
}

/// Parses a standalone expression. Used to build injected predicates.
pub(crate) fn parse_expr(text: &str) -> Result<sqlparser::ast::Expr> {
    Parser::new(&PostgreSqlDialect {})
        .with_recursion_limit(RECURSION_LIMIT)
        .try_with_sql(text)
        .and_then(|mut parser| parser.parse_expr())
        .map_err(|e| QueryError::Parse(e.to_string()))
}

/// Parses a standalone query. Used to build scoped derived tables.
pub(crate) fn parse_query(text: &str) -> Result<Box<sqlparser::ast::Query>> {
    Parser::new(&PostgreSqlDialect {})
        .with_recursion_limit(RECURSION_LIMIT)
        .try_with_sql(text)
        .and_then(|mut parser| parser.parse_query())
        .map_err(|e| QueryError::Parse(e.to_string()))
}

/// Comparison key of a relation: its last name part, ASCII-lowercased.
///
/// `public.Users`, `USERS` and `users` all map to `users`.
pub fn relation_key(name: &ObjectName) -> Option<String> {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| ident.value.to_ascii_lowercase())
}

/// Lowercased words of `sql` as seen by the tokenizer.
///
/// Returns `None` when the text cannot be tokenized.
pub(crate) fn word_tokens(sql: &str) -> Option<Vec<String>> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;
    Some(
        tokens
            .into_iter()
            .filter_map(|token| match token {
                Token::Word(word) => Some(word.value.to_ascii_lowercase()),
                _ => None,
            })
            .collect(),
    )
}

/// True for a plain SQL identifier: a letter or underscore followed by
/// letters, digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates `name` with [`is_identifier`].
pub fn require_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

//! Query layer error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query text is empty")]
    Empty,

    #[error("failed to parse SQL: {0}")]
    Parse(String),

    #[error("unsupported statement for row-level rewriting: {0}")]
    Unsupported(String),

    #[error("row-level rewrite incomplete: {found} reference(s) to '{view}' but {scoped} scoped")]
    IncompleteRewrite {
        view: String,
        found: usize,
        scoped: usize,
    },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

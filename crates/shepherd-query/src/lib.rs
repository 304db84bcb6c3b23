//! # shepherd-query: Statement screening for `Shepherd`
//!
//! This crate decides what caller-supplied SQL may do before it reaches the
//! database. It never executes anything.
//!
//! - [`is_read_only`]: the statement classifier
//! - [`TablePolicy`]: the private-table guard over a deny-list
//! - [`rewrite`]: row-level scoping of the protected view for non-administrators
//!
//! ## Failing closed
//!
//! Every decision starts from [`screen`]. Input it cannot parse is not
//! read-only, touches a denied table, and cannot be rewritten:
//!
//! ```
//! use shepherd_query::{TablePolicy, is_read_only};
//!
//! let policy = TablePolicy::default();
//! assert!(!is_read_only("SELEC id FROM people"));
//! assert!(policy.touches_denied_table("SELEC id FROM people"));
//! ```
//!
//! ## Usage
//!
//! ```
//! use shepherd_query::{RowScope, rewrite};
//! use shepherd_types::{PersonId, RoleId, UserId};
//!
//! let scope = RowScope::new(UserId::new(7), PersonId::new(42), [RoleId::new(10), RoleId::new(11)]);
//! let scoped = rewrite("SELECT id FROM vw_people", &scope)?;
//! assert_eq!(scoped.scoped, 1);
//! # Ok::<(), shepherd_query::QueryError>(())
//! ```

mod ast;
mod classifier;
mod error;
mod rewrite;
mod tables;


// Re-export public types
pub use ast::{RECURSION_LIMIT, is_identifier, relation_key, require_identifier, screen};
pub use classifier::{is_read_only, is_read_only_statement};
pub use error::{QueryError, Result};
pub use rewrite::{RowScope, Rewritten, rewrite};
pub use tables::{DEFAULT_DENIED_TABLES, TablePolicy, referenced_tables};

//! # shepherd-gateway: Permission-aware SQL execution for `Shepherd`
//!
//! The [`Gateway`] sits between a tool layer and PostgreSQL. It offers three
//! execution paths of decreasing restriction, identity and authorization
//! guards for mutations, and an audit trail.
//!
//! ```text
//!   caller SQL ──► run_read_only ──► classifier ─► table guard ─► rewriter ─┐
//!   mutation   ──► Authorizer ─► run_guarded ───────► table guard ──────────┼─► pool ─► PostgreSQL
//!   internal   ──► run_private ──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use shepherd_config::ShepherdConfig;
//! use shepherd_gateway::{Gateway, PgPool};
//! use shepherd_rbac::CallerContext;
//! use shepherd_types::{Principal, RoleId, UserId};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShepherdConfig::load()?;
//! let pool = PgPool::from_config(&config.database)?;
//! let gateway = Gateway::from_config(pool, &config);
//!
//! let caller = CallerContext::new(Principal::new(UserId::new(7), RoleId::new(3)));
//! let rows = gateway
//!     .run_read_only(&caller, "SELECT id, first_middle_name FROM vw_people")
//!     .await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

mod audit;
mod error;
mod gateway;
mod guard;
mod operations;
mod pool;
mod postgres;
mod value;


// Re-export public types
pub use audit::AuditLog;
pub use error::{DatabaseError, GatewayError, GatewayResult};
pub use gateway::{Gateway, QueryLimits, ScopeTables};
pub use guard::Authorizer;
pub use operations::{
    Attendance, FamilyLink, MAX_ATTENDANCE_BATCH, MemberField, MemberUpdate, MinistryLink,
    MutationOutcome,
};
pub use pool::{Connection, ConnectionPool, SqlParam};
pub use postgres::{PgConnection, PgPool};
pub use value::{ResultSet, Value};

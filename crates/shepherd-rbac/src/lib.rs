//! # shepherd-rbac: Ministry-scoped access control
//!
//! Provides the capability model the gateway enforces:
//! - **Account roles**: one configured administrator sentinel bypasses row scoping
//! - **Ministry roles**: leader and collaborator grant read access to a ministry's people
//! - **Decisions**: every authorization check yields an explicit [`Decision`]
//! - **Caller context**: the caller's resolved person id, cached per session
//!
//! ## Capability model
//!
//! | Capability                         | Admin | Leader (of M) | Collaborator (of M) | Self |
//! |------------------------------------|-------|---------------|---------------------|------|
//! | Read people of ministry M          | ✓     | ✓             | ✓                   | ✗    |
//! | Read own person record             | ✓     | ✓             | ✓                   | ✓    |
//! | Manage activities of M             | ✓     | ✓             | ✓                   | ✗    |
//! | Assign people into a child of M    | ✗*    | ✓             | ✗                   | ✗    |
//! | Create / update / remove ministries| ✓     | ✗             | ✗                   | ✗    |
//!
//! *Assignment requires leadership of the parent ministry; it has no admin bypass.
//!
//! ## Examples
//!
//! ```
//! use shepherd_rbac::{AccessRoles, Decision, Denial};
//! use shepherd_types::RoleId;
//!
//! let roles = AccessRoles::new(RoleId::new(1), RoleId::new(10), RoleId::new(11));
//!
//! assert!(roles.is_admin(RoleId::new(1)));
//! assert_eq!(roles.check_admin(RoleId::new(2)), Decision::Denied(Denial::NotAdministrator));
//! ```

pub mod claims;
pub mod context;
pub mod decision;
pub mod roles;
pub mod session;

// Re-export commonly used types
pub use claims::{ActivityDate, ClaimError, NameClaim};
pub use context::CallerContext;
pub use decision::{Decision, Denial};
pub use roles::{AccessRoles, MinistryRole};
pub use session::{Session, SessionRegistry};

//! Audit trail writer.

use shepherd_types::UserId;
use tracing::{debug, instrument};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::pool::{ConnectionPool, SqlParam};

const INSERT_AUDIT_SQL: &str = "\
    INSERT INTO audit_log (user_id, action, affected_object, detail, timestamp) \
    VALUES ($1::int, $2, $3, $4, CURRENT_TIMESTAMP)";

/// Appends entries to `audit_log` through the private path.
pub struct AuditLog<'g, P> {
    gateway: &'g Gateway<P>,
}

impl<'g, P: ConnectionPool> AuditLog<'g, P> {
    pub fn new(gateway: &'g Gateway<P>) -> Self {
        Self { gateway }
    }

    /// Records that `user` performed `action` on an object of `category`.
    #[instrument(skip(self, detail), fields(user_id = %user))]
    pub async fn record(&self, user: UserId, action: &str, category: &str, detail: &str) -> GatewayResult<()> {
        if !user.is_valid() {
            return Err(GatewayError::Validation("audit entry requires a user id".to_string()));
        }
        if action.trim().is_empty() {
            return Err(GatewayError::Validation("audit entry requires an action".to_string()));
        }
        if detail.trim().is_empty() {
            return Err(GatewayError::Validation("audit entry requires a detail".to_string()));
        }

        self.gateway
            .run_private(
                INSERT_AUDIT_SQL,
                &[
                    SqlParam::Int(user.get()),
                    SqlParam::from(action),
                    SqlParam::from(category),
                    SqlParam::from(detail),
                ],
            )
            .await?;
        debug!("Audit entry recorded");
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use rolewarden_core::{AppError, AppResult, GroupId};
use serde::{Deserialize, Serialize};

use crate::{IdentityId, RoleId, RolePolicy};

/// Pending, time-delayed revocation of a role from a member.
///
/// At most one row exists per (group, member, role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriod {
    /// Group the role belongs to.
    pub group_id: GroupId,
    /// Member who stopped qualifying.
    pub member_id: IdentityId,
    /// Role pending revocation.
    pub role_id: RoleId,
    /// Instant after which the role is removed.
    pub expires_at: DateTime<Utc>,
}

impl GracePeriod {
    /// Opens a grace period for a member under a policy.
    ///
    /// Returns `None` when the policy defines no grace window, and a
    /// validation error when the expiry is not representable.
    pub fn starting(
        policy: &RolePolicy,
        member_id: IdentityId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Self>> {
        let Some(window) = policy.grace_period() else {
            return Ok(None);
        };
        let expires_at = now.checked_add_signed(window).ok_or_else(|| {
            AppError::Validation(format!(
                "grace period for role '{}' overflows from {now}",
                policy.role_id()
            ))
        })?;

        Ok(Some(Self {
            group_id: policy.group_id().clone(),
            member_id,
            role_id: policy.role_id().clone(),
            expires_at,
        }))
    }

    /// Returns whether the grace window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

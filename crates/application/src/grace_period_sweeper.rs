use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use rolewarden_core::AppResult;
use rolewarden_domain::GracePeriod;

use crate::credential_store::CredentialStore;
use crate::platform_ports::{GuildDirectory, RoleAssignments};

/// Counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Grace periods found expired.
    pub expired: u64,
    /// Roles removed.
    pub revoked: u64,
    /// Rows whose member no longer held the role.
    pub already_absent: u64,
    /// Rows dropped because the member or role no longer resolves.
    pub unresolved: u64,
    /// Rows left for the next sweep because the platform call or the delete failed.
    pub failed: u64,
}

/// Performs deferred revocations once their grace period has passed.
#[derive(Clone)]
pub struct GracePeriodSweeper {
    credential_store: CredentialStore,
    directory: Arc<dyn GuildDirectory>,
    assignments: Arc<dyn RoleAssignments>,
}

impl GracePeriodSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(
        credential_store: CredentialStore,
        directory: Arc<dyn GuildDirectory>,
        assignments: Arc<dyn RoleAssignments>,
    ) -> Self {
        Self {
            credential_store,
            directory,
            assignments,
        }
    }

    /// Revokes the role of every grace period that expired before `now` and
    /// deletes its row.
    ///
    /// Members and roles are resolved from the platform cache. A row whose
    /// member or role no longer resolves is dropped. A row whose platform
    /// call or delete fails is left for the next sweep; other rows proceed.
    /// Only a failure to list the expired rows fails the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        for grace_period in self.credential_store.list_expired_grace_periods(now).await? {
            report.expired += 1;

            match self.revoke(&grace_period).await {
                Ok(Revocation::Removed) => report.revoked += 1,
                Ok(Revocation::AlreadyAbsent) => report.already_absent += 1,
                Ok(Revocation::Unresolved) => {
                    info!(
                        group_id = %grace_period.group_id,
                        member_id = %grace_period.member_id,
                        role_id = %grace_period.role_id,
                        "dropping grace period for unresolved member or role"
                    );
                    report.unresolved += 1;
                }
                Err(error) => {
                    warn!(
                        group_id = %grace_period.group_id,
                        member_id = %grace_period.member_id,
                        role_id = %grace_period.role_id,
                        error = %error,
                        "deferred role revocation failed"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            if let Err(error) = self
                .credential_store
                .remove_grace_period(
                    &grace_period.group_id,
                    &grace_period.member_id,
                    &grace_period.role_id,
                )
                .await
            {
                warn!(
                    group_id = %grace_period.group_id,
                    member_id = %grace_period.member_id,
                    role_id = %grace_period.role_id,
                    error = %error,
                    "failed to delete expired grace period"
                );
                report.failed += 1;
            }
        }

        Ok(report)
    }

    async fn revoke(&self, grace_period: &GracePeriod) -> AppResult<Revocation> {
        let member = self
            .directory
            .cached_member(&grace_period.group_id, &grace_period.member_id)
            .await?;
        let role = self
            .directory
            .cached_role(&grace_period.group_id, &grace_period.role_id)
            .await?;

        let (Some(member), Some(_)) = (member, role) else {
            return Ok(Revocation::Unresolved);
        };
        if !member.has_role(&grace_period.role_id) {
            return Ok(Revocation::AlreadyAbsent);
        }

        self.assignments
            .remove_role(
                &grace_period.group_id,
                &grace_period.member_id,
                &grace_period.role_id,
            )
            .await?;

        info!(
            group_id = %grace_period.group_id,
            member_id = %grace_period.member_id,
            role_id = %grace_period.role_id,
            "grace period expired; role revoked"
        );

        Ok(Revocation::Removed)
    }
}

enum Revocation {
    Removed,
    AlreadyAbsent,
    Unresolved,
}

//! Periodic reconciliation of member roles against ownership policies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{
    GracePeriod, MemberOwnership, MemberRoleState, MemberSnapshot, RoleId, RolePolicy,
    WalletAddress,
};

use crate::credential_store::CredentialStore;
use crate::grace_period_sweeper::{GracePeriodSweeper, SweepReport};
use crate::platform_ports::{GuildDirectory, GuildMember, OwnershipOracle, RoleAssignments};
use crate::shutdown::ShutdownSignal;

/// Counts of one policy pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// Members evaluated.
    pub evaluated: u64,
    /// Roles granted.
    pub granted: u64,
    /// Roles revoked immediately.
    pub revoked: u64,
    /// Members kept under a grace period.
    pub deferred: u64,
    /// Grace periods cancelled because the member qualifies again.
    pub grace_cancelled: u64,
    /// Whether shutdown stopped the pass before every member was evaluated.
    pub interrupted: bool,
}

/// Result of reconciling one policy.
#[derive(Debug)]
pub struct PolicyReport {
    /// Group of the policy.
    pub group_id: GroupId,
    /// Role of the policy.
    pub role_id: RoleId,
    /// Outcome, or the error that aborted the pass.
    pub outcome: AppResult<PolicyOutcome>,
}

/// Result of one reconciliation tick.
#[derive(Debug)]
pub struct TickReport {
    /// Per-policy results in configuration order.
    pub policies: Vec<PolicyReport>,
    /// Sweep result; absent when shutdown stopped the tick first.
    pub sweep: Option<AppResult<SweepReport>>,
    /// Wall time of the tick.
    pub duration: Duration,
}

impl TickReport {
    /// Number of policies reconciled without error.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.policies
            .iter()
            .filter(|report| report.outcome.is_ok())
            .count()
    }

    /// Number of policies aborted by an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.policies
            .iter()
            .filter(|report| report.outcome.is_err())
            .count()
    }

    /// Returns whether shutdown cut the tick short.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.sweep.is_none()
            || self
                .policies
                .iter()
                .any(|report| matches!(&report.outcome, Ok(outcome) if outcome.interrupted))
    }
}

/// Application service driving role grants, revocations and grace periods.
#[derive(Clone)]
pub struct RoleReconciler {
    credential_store: CredentialStore,
    directory: Arc<dyn GuildDirectory>,
    assignments: Arc<dyn RoleAssignments>,
    oracle: Arc<dyn OwnershipOracle>,
    sweeper: GracePeriodSweeper,
}

impl RoleReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        credential_store: CredentialStore,
        directory: Arc<dyn GuildDirectory>,
        assignments: Arc<dyn RoleAssignments>,
        oracle: Arc<dyn OwnershipOracle>,
    ) -> Self {
        let sweeper =
            GracePeriodSweeper::new(credential_store.clone(), directory.clone(), assignments.clone());

        Self {
            credential_store,
            directory,
            assignments,
            oracle,
            sweeper,
        }
    }

    /// Runs every policy in order, then sweeps expired grace periods once.
    ///
    /// A failing policy is reported and does not stop the remaining ones.
    /// Shutdown is honoured between members; an interrupted tick skips the
    /// remaining policies and the sweep.
    pub async fn run_tick(
        &self,
        policies: &[RolePolicy],
        now: DateTime<Utc>,
        shutdown: &ShutdownSignal,
    ) -> TickReport {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(policies.len());

        for policy in policies {
            if shutdown.is_triggered() {
                break;
            }

            let outcome = self.reconcile_policy(policy, now, shutdown).await;
            match &outcome {
                Ok(outcome) => info!(
                    group_id = %policy.group_id(),
                    role_id = %policy.role_id(),
                    evaluated = outcome.evaluated,
                    granted = outcome.granted,
                    revoked = outcome.revoked,
                    deferred = outcome.deferred,
                    grace_cancelled = outcome.grace_cancelled,
                    "role policy reconciled"
                ),
                Err(error) => warn!(
                    group_id = %policy.group_id(),
                    role_id = %policy.role_id(),
                    error = %error,
                    "role policy reconciliation aborted"
                ),
            }

            reports.push(PolicyReport {
                group_id: policy.group_id().clone(),
                role_id: policy.role_id().clone(),
                outcome,
            });
        }

        let sweep = if shutdown.is_triggered() {
            None
        } else {
            let sweep = self.sweeper.sweep(now).await;
            match &sweep {
                Ok(report) => info!(
                    expired = report.expired,
                    revoked = report.revoked,
                    already_absent = report.already_absent,
                    unresolved = report.unresolved,
                    failed = report.failed,
                    "grace periods swept"
                ),
                Err(error) => warn!(error = %error, "grace period sweep failed"),
            }
            Some(sweep)
        };

        TickReport {
            policies: reports,
            sweep,
            duration: started.elapsed(),
        }
    }

    /// Reconciles every member of the policy's group against the policy.
    ///
    /// The role and the member list are fetched fresh from the platform. The
    /// first error aborts the pass for this policy.
    pub async fn reconcile_policy(
        &self,
        policy: &RolePolicy,
        now: DateTime<Utc>,
        shutdown: &ShutdownSignal,
    ) -> AppResult<PolicyOutcome> {
        let group_id = policy.group_id();
        let role_id = policy.role_id();

        self.directory
            .fetch_role(group_id, role_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role '{role_id}' does not exist in group '{group_id}'"))
            })?;
        let members = self.directory.fetch_members(group_id).await?;

        let mut outcome = PolicyOutcome::default();
        for member in &members {
            if shutdown.is_triggered() {
                outcome.interrupted = true;
                break;
            }

            let state = self.reconcile_member(policy, member, now, &mut outcome).await?;
            debug!(
                group_id = %group_id,
                role_id = %role_id,
                member_id = %member.member_id,
                state = state.as_str(),
                "member evaluated"
            );
            outcome.evaluated += 1;
        }

        Ok(outcome)
    }

    async fn reconcile_member(
        &self,
        policy: &RolePolicy,
        member: &GuildMember,
        now: DateTime<Utc>,
        outcome: &mut PolicyOutcome,
    ) -> AppResult<MemberRoleState> {
        let group_id = policy.group_id();
        let role_id = policy.role_id();

        let wallets: Vec<WalletAddress> = self
            .credential_store
            .find_bindings_by_identity(group_id, &member.member_id)
            .await?
            .into_iter()
            .map(|binding| binding.wallet_address)
            .collect();

        let ownership = if wallets.is_empty() {
            MemberOwnership::Unbound
        } else if policy.disallow_all() {
            MemberOwnership::NotQueried
        } else {
            MemberOwnership::Observed(self.oracle.ownership_facts(&wallets).await?)
        };

        let state = policy.evaluate(&MemberSnapshot {
            holds_role: member.has_role(role_id),
            ownership,
        });

        match state {
            MemberRoleState::QualifiesGranted => {
                self.cancel_grace_period(policy, member, outcome).await?;
            }
            MemberRoleState::QualifiesNotGranted => {
                self.cancel_grace_period(policy, member, outcome).await?;
                self.assignments
                    .add_role(group_id, &member.member_id, role_id)
                    .await?;
                outcome.granted += 1;
                info!(
                    group_id = %group_id,
                    role_id = %role_id,
                    member_id = %member.member_id,
                    "role granted"
                );
            }
            MemberRoleState::GracePending => {
                if let Some(grace_period) =
                    GracePeriod::starting(policy, member.member_id.clone(), now)?
                    &&self.credential_store.set_grace_period(&grace_period).await?
                {
                    info!(
                        group_id = %group_id,
                        role_id = %role_id,
                        member_id = %member.member_id,
                        expires_at = %grace_period.expires_at,
                        "grace period started"
                    );
                }
                outcome.deferred += 1;
            }
            MemberRoleState::NoBinding | MemberRoleState::DisqualifiedHeld => {
                if member.has_role(role_id) {
                    self.credential_store
                        .remove_grace_period(group_id, &member.member_id, role_id)
                        .await?;
                    self.assignments
                        .remove_role(group_id, &member.member_id, role_id)
                        .await?;
                    outcome.revoked += 1;
                    info!(
                        group_id = %group_id,
                        role_id = %role_id,
                        member_id = %member.member_id,
                        state = state.as_str(),
                        "role revoked"
                    );
                }
            }
            MemberRoleState::DisqualifiedNotHeld => {}
        }

        Ok(state)
    }

    async fn cancel_grace_period(
        &self,
        policy: &RolePolicy,
        member: &GuildMember,
        outcome: &mut PolicyOutcome,
    ) -> AppResult<()> {
        if self
            .credential_store
            .remove_grace_period(policy.group_id(), &member.member_id, policy.role_id())
            .await?
        {
            outcome.grace_cancelled += 1;
            info!(
                group_id = %policy.group_id(),
                role_id = %policy.role_id(),
                member_id = %member.member_id,
                "grace period cancelled"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

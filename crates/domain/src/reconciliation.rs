//! Per-member role decision for one reconciliation pass.

use crate::{OwnershipFacts, RolePolicy};

/// What is known about a member's wallets when a policy is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOwnership {
    /// Member has no bound wallet.
    Unbound,
    /// Member has wallets but the oracle was not consulted (suspended policy).
    NotQueried,
    /// Oracle facts for the union of the member's wallets.
    Observed(OwnershipFacts),
}

/// Member state fed to a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberSnapshot {
    /// Whether the member currently holds the policy's role.
    pub holds_role: bool,
    /// Ownership knowledge for the member.
    pub ownership: MemberOwnership,
}

/// Outcome of evaluating one member against one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRoleState {
    /// No wallet bound; the role must be absent.
    NoBinding,
    /// Qualifies and already holds the role.
    QualifiesGranted,
    /// Qualifies but lacks the role; grant it.
    QualifiesNotGranted,
    /// Fails and holds the role with no grace window; revoke now.
    DisqualifiedHeld,
    /// Fails and does not hold the role; nothing to do.
    DisqualifiedNotHeld,
    /// Fails and holds the role under a grace window; revocation deferred.
    GracePending,
}

impl MemberRoleState {
    /// Returns whether the member currently satisfies the policy.
    #[must_use]
    pub fn qualifies(&self) -> bool {
        matches!(self, Self::QualifiesGranted | Self::QualifiesNotGranted)
    }

    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoBinding => "no_binding",
            Self::QualifiesGranted => "qualifies_granted",
            Self::QualifiesNotGranted => "qualifies_not_granted",
            Self::DisqualifiedHeld => "disqualified_held",
            Self::DisqualifiedNotHeld => "disqualified_not_held",
            Self::GracePending => "grace_pending",
        }
    }
}

impl RolePolicy {
    /// Classifies a member for this policy.
    #[must_use]
    pub fn evaluate(&self, member: &MemberSnapshot) -> MemberRoleState {
        let qualifies = match member.ownership {
            MemberOwnership::Unbound => return MemberRoleState::NoBinding,
            MemberOwnership::NotQueried => false,
            MemberOwnership::Observed(facts) => self.qualifies(&facts),
        };

        match (qualifies, member.holds_role) {
            (true, true) => MemberRoleState::QualifiesGranted,
            (true, false) => MemberRoleState::QualifiesNotGranted,
            (false, false) => MemberRoleState::DisqualifiedNotHeld,
            (false, true) if self.grace_period().is_some() => MemberRoleState::GracePending,
            (false, true) => MemberRoleState::DisqualifiedHeld,
        }
    }
}

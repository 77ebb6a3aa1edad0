//! Role policies and the ownership predicates they evaluate.

use chrono::Duration;
use rolewarden_core::{AppError, AppResult, GroupId};
use serde::{Deserialize, Serialize};

use crate::RoleId;

/// Longest accepted grace window, ten years.
pub const MAX_GRACE_PERIOD_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Ownership facts reported by the oracle for the union of a member's wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipFacts {
    /// Number of tokens currently owned across all wallets.
    pub owned_count: u64,
    /// Whether any of the wallets minted at least one token.
    pub has_minted: bool,
}

/// Condition a member's ownership facts must satisfy to hold a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipPredicate {
    /// Member must own at least this many tokens.
    MinOwnedCount(u64),
    /// Member must have minted at least one token.
    AnyMinted,
}

impl OwnershipPredicate {
    /// Returns whether the facts satisfy this predicate.
    #[must_use]
    pub fn is_satisfied_by(&self, facts: &OwnershipFacts) -> bool {
        match self {
            Self::MinOwnedCount(minimum) => facts.owned_count >= *minimum,
            Self::AnyMinted => facts.has_minted,
        }
    }
}

/// Raw policy fields as they appear in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicyInput {
    /// Group the role belongs to.
    pub group_id: String,
    /// Role granted by the policy.
    pub role_id: String,
    /// Minimum owned count predicate.
    #[serde(default)]
    pub min_owned_count: Option<u64>,
    /// Minted-token predicate.
    #[serde(default)]
    pub requires_any_minted: bool,
    /// Suspends the policy: no member qualifies while set.
    #[serde(default)]
    pub disallow_all: bool,
    /// Delay between a member failing the predicate and losing the role.
    #[serde(default)]
    pub grace_period_seconds: Option<i64>,
}

/// Access rule binding a (group, role) pair to an ownership predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    group_id: GroupId,
    role_id: RoleId,
    predicate: OwnershipPredicate,
    disallow_all: bool,
    grace_period_seconds: Option<i64>,
}

impl RolePolicy {
    /// Validates configuration input into a policy.
    ///
    /// Exactly one predicate kind must be active. A grace period, when
    /// present, must be positive and at most [`MAX_GRACE_PERIOD_SECONDS`].
    /// A zero `min_owned_count` admits every member with a bound wallet.
    pub fn new(input: RolePolicyInput) -> AppResult<Self> {
        let group_id = GroupId::new(input.group_id)?;
        let role_id = RoleId::new(input.role_id)?;

        let predicate = match (input.min_owned_count, input.requires_any_minted) {
            (Some(minimum), false) => OwnershipPredicate::MinOwnedCount(minimum),
            (None, true) => OwnershipPredicate::AnyMinted,
            (Some(_), true) => {
                return Err(AppError::Validation(format!(
                    "policy for role '{role_id}' must not combine min_owned_count and requires_any_minted"
                )));
            }
            (None, false) => {
                return Err(AppError::Validation(format!(
                    "policy for role '{role_id}' requires min_owned_count or requires_any_minted"
                )));
            }
        };

        if let Some(seconds) = input.grace_period_seconds {
            if seconds <= 0 {
                return Err(AppError::Validation(format!(
                    "policy for role '{role_id}' must use a positive grace_period_seconds"
                )));
            }
            if seconds > MAX_GRACE_PERIOD_SECONDS {
                return Err(AppError::Validation(format!(
                    "policy for role '{role_id}' must use a grace_period_seconds of at most {MAX_GRACE_PERIOD_SECONDS}"
                )));
            }
        }

        Ok(Self {
            group_id,
            role_id,
            predicate,
            disallow_all: input.disallow_all,
            grace_period_seconds: input.grace_period_seconds,
        })
    }

    /// Returns the group the policy applies to.
    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Returns the managed role.
    #[must_use]
    pub fn role_id(&self) -> &RoleId {
        &self.role_id
    }

    /// Returns the ownership predicate.
    #[must_use]
    pub fn predicate(&self) -> OwnershipPredicate {
        self.predicate
    }

    /// Returns whether the policy is suspended.
    #[must_use]
    pub fn disallow_all(&self) -> bool {
        self.disallow_all
    }

    /// Returns the revocation delay, if the policy defines one.
    #[must_use]
    pub fn grace_period(&self) -> Option<Duration> {
        self.grace_period_seconds.and_then(Duration::try_seconds)
    }

    /// Returns whether a member with these facts qualifies for the role.
    #[must_use]
    pub fn qualifies(&self, facts: &OwnershipFacts) -> bool {
        !self.disallow_all && self.predicate.is_satisfied_by(facts)
    }
}

use async_trait::async_trait;

use rolewarden_core::{AppResult, GroupId};
use rolewarden_domain::{IdentityId, OwnershipFacts, RoleId, WalletAddress};

/// Member of a chat group as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    /// Platform user identifier.
    pub member_id: IdentityId,
    /// Display name at fetch time.
    pub display_name: String,
    /// Roles currently held.
    pub role_ids: Vec<RoleId>,
}

impl GuildMember {
    /// Returns whether the member currently holds a role.
    #[must_use]
    pub fn has_role(&self, role_id: &RoleId) -> bool {
        self.role_ids.iter().any(|held| held == role_id)
    }
}

/// Role defined in a chat group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRole {
    /// Platform role identifier.
    pub role_id: RoleId,
    /// Role name.
    pub name: String,
}

/// Read access to group members and roles.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    /// Resolves a role, refreshing the local cache.
    async fn fetch_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>>;

    /// Fetches the full member list of a group from the platform, bypassing
    /// and refreshing the local cache.
    async fn fetch_members(&self, group_id: &GroupId) -> AppResult<Vec<GuildMember>>;

    /// Resolves a member from the local cache without a platform call.
    async fn cached_member(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
    ) -> AppResult<Option<GuildMember>>;

    /// Resolves a role from the local cache without a platform call.
    async fn cached_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>>;
}

/// Write access to member roles.
#[async_trait]
pub trait RoleAssignments: Send + Sync {
    /// Grants a role to a member.
    async fn add_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()>;

    /// Removes a role from a member.
    async fn remove_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()>;
}

/// Source of truth for asset ownership.
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    /// Returns aggregated ownership facts across a set of wallets.
    ///
    /// `owned_count` is the total across all wallets and `has_minted` is true
    /// when any of them minted.
    async fn ownership_facts(&self, wallets: &[WalletAddress]) -> AppResult<OwnershipFacts>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolewarden_core::{AppResult, GroupId};
use rolewarden_domain::{BindingId, GracePeriod, IdentityId, RoleId};

/// Binding columns exactly as persisted.
///
/// When `sealed` is false the lookup and value columns hold plaintext. When
/// it is true the lookup columns hold blind indexes and the value columns hold
/// authenticated ciphertext under the group's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBindingFields {
    /// Whether the value columns are encrypted.
    pub sealed: bool,
    /// Equality lookup key for the identity.
    pub identity_lookup: String,
    /// Identity value (plaintext or ciphertext).
    pub identity_value: String,
    /// Display name value (plaintext or ciphertext).
    pub display_name_value: String,
    /// Equality lookup key for the wallet; unique across all bindings.
    pub wallet_lookup: String,
    /// Wallet value (plaintext or ciphertext).
    pub wallet_value: String,
}

/// Persisted binding row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBinding {
    /// Row identifier.
    pub id: BindingId,
    /// Group the binding was last made in; selects the key of sealed rows.
    pub group_id: GroupId,
    /// Stored columns.
    pub fields: StoredBindingFields,
}

/// Repository port for the `accounts` table.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    /// Inserts a binding or, when the wallet lookup already exists, moves
    /// that row to the new identity and group.
    async fn upsert_binding(
        &self,
        group_id: &GroupId,
        fields: StoredBindingFields,
    ) -> AppResult<BindingId>;

    /// Lists every binding of an identity lookup key.
    async fn find_by_identity_lookup(&self, identity_lookup: &str) -> AppResult<Vec<StoredBinding>>;

    /// Returns the binding for a wallet lookup key.
    async fn find_by_wallet_lookup(&self, wallet_lookup: &str) -> AppResult<Option<StoredBinding>>;

    /// Lists plaintext rows last bound in a group.
    async fn list_unsealed(&self, group_id: &GroupId) -> AppResult<Vec<StoredBinding>>;

    /// Rewrites the stored columns of one row in place.
    async fn replace_fields(&self, id: BindingId, fields: StoredBindingFields) -> AppResult<()>;
}

/// Repository port for the `grace_periods` table.
#[async_trait]
pub trait GracePeriodRepository: Send + Sync {
    /// Returns whether a grace period exists for the triple.
    async fn has_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool>;

    /// Inserts a grace period unless one already exists for the triple.
    ///
    /// Returns whether a row was created. An existing row keeps its expiry.
    async fn set_grace_period(&self, grace_period: &GracePeriod) -> AppResult<bool>;

    /// Deletes the grace period for the triple. Returns whether a row existed.
    async fn remove_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool>;

    /// Lists grace periods whose expiry is strictly before `now`.
    async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> AppResult<Vec<GracePeriod>>;
}

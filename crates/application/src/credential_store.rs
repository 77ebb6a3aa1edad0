//! Durable bindings and grace periods with transparent field encryption.
//!
//! Callers always see plaintext. Encryption, blind indexing and decoding of
//! stored rows happen at this boundary.
//!
//! A wallet has at most one binding. Plaintext lookups match bindings made
//! in any group. Sealed lookups are blind indexes under the calling group's
//! key, so with encryption required a binding is only found from the group
//! whose key sealed it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{
    Binding, GracePeriod, IdentityId, NewBinding, RoleId, WalletAddress,
};

use crate::binding_ports::{
    BindingRepository, GracePeriodRepository, StoredBinding, StoredBindingFields,
};
use crate::encryption_gateway::{EncryptionGateway, FieldEncryption, FieldSealer};

const IDENTITY_FIELD: &str = "identity";
const WALLET_FIELD: &str = "wallet";

/// Result of resealing plaintext rows of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SealReport {
    /// Rows rewritten in sealed form.
    pub sealed: u64,
    /// Plaintext rows left as-is because a sealed row already holds their wallet.
    pub skipped: u64,
}

/// Application service owning binding and grace period persistence.
#[derive(Clone)]
pub struct CredentialStore {
    bindings: Arc<dyn BindingRepository>,
    grace_periods: Arc<dyn GracePeriodRepository>,
    gateway: EncryptionGateway,
    encryption: FieldEncryption,
}

impl CredentialStore {
    /// Creates a credential store.
    #[must_use]
    pub fn new(
        bindings: Arc<dyn BindingRepository>,
        grace_periods: Arc<dyn GracePeriodRepository>,
        gateway: EncryptionGateway,
        encryption: FieldEncryption,
    ) -> Self {
        Self {
            bindings,
            grace_periods,
            gateway,
            encryption,
        }
    }

    /// Returns the configured encryption mode.
    #[must_use]
    pub fn encryption(&self) -> FieldEncryption {
        self.encryption
    }

    /// Inserts a binding or rebinds an existing wallet to a new identity.
    pub async fn upsert_binding(&self, binding: NewBinding) -> AppResult<Binding> {
        let fields = self.store_fields(&binding)?;
        let id = self
            .bindings
            .upsert_binding(&binding.group_id, fields)
            .await?;

        Ok(binding.into_binding(id))
    }

    /// Lists all bindings of an identity visible from a group.
    pub async fn find_bindings_by_identity(
        &self,
        group_id: &GroupId,
        identity_id: &IdentityId,
    ) -> AppResult<Vec<Binding>> {
        let lookup = self.lookup_key(group_id, IDENTITY_FIELD, identity_id.as_str())?;
        self.bindings
            .find_by_identity_lookup(lookup.as_str())
            .await?
            .into_iter()
            .map(|row| self.decode(row))
            .collect()
    }

    /// Returns the binding of a wallet visible from a group.
    pub async fn find_binding_by_wallet(
        &self,
        group_id: &GroupId,
        wallet_address: &WalletAddress,
    ) -> AppResult<Option<Binding>> {
        let lookup = self.lookup_key(group_id, WALLET_FIELD, wallet_address.as_str())?;
        self.bindings
            .find_by_wallet_lookup(lookup.as_str())
            .await?
            .map(|row| self.decode(row))
            .transpose()
    }

    /// Rewrites plaintext rows of a group in sealed form, keeping their ids.
    ///
    /// Does nothing while encryption is disabled.
    pub async fn seal_plaintext_bindings(&self, group_id: &GroupId) -> AppResult<SealReport> {
        let mut report = SealReport::default();
        if self.encryption == FieldEncryption::Disabled {
            return Ok(report);
        }

        let sealer = self.gateway.require_sealer(group_id)?;
        for row in self.bindings.list_unsealed(group_id).await? {
            let binding = decode_plaintext(&row)?;
            let fields = seal_fields(sealer.as_ref(), &binding)?;

            if let Some(existing) = self
                .bindings
                .find_by_wallet_lookup(fields.wallet_lookup.as_str())
                .await?
            {
                warn!(
                    group_id = %group_id,
                    binding_id = row.id.as_i64(),
                    sealed_binding_id = existing.id.as_i64(),
                    "plaintext binding superseded by sealed binding; leaving it untouched"
                );
                report.skipped += 1;
                continue;
            }

            self.bindings.replace_fields(row.id, fields).await?;
            report.sealed += 1;
        }

        if report.sealed > 0 {
            info!(group_id = %group_id, sealed = report.sealed, "sealed plaintext bindings");
        }

        Ok(report)
    }

    /// Startup step shared by every process: when encryption is required,
    /// loads the key of every group with a setup channel and reseals the
    /// plaintext rows of each group in `group_ids`.
    ///
    /// Per-group failures are logged and skipped so one misconfigured group
    /// does not keep the others from starting.
    pub async fn prepare_encryption(&self, group_ids: &[GroupId]) -> SealReport {
        let mut total = SealReport::default();
        if self.encryption == FieldEncryption::Disabled {
            info!("field encryption disabled; bindings are stored as plaintext");
            return total;
        }

        let loaded = self.gateway.load_configured_keys().await;
        info!(loaded, groups = group_ids.len(), "group encryption keys loaded");

        for group_id in group_ids {
            match self.seal_plaintext_bindings(group_id).await {
                Ok(report) => {
                    total.sealed += report.sealed;
                    total.skipped += report.skipped;
                }
                Err(error) => {
                    warn!(group_id = %group_id, error = %error, "failed to seal plaintext bindings");
                }
            }
        }

        total
    }

    /// Returns whether a grace period is pending for the triple.
    pub async fn has_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        self.grace_periods
            .has_grace_period(group_id, member_id, role_id)
            .await
    }

    /// Opens a grace period unless one is already pending. Returns whether one was created.
    pub async fn set_grace_period(&self, grace_period: &GracePeriod) -> AppResult<bool> {
        self.grace_periods.set_grace_period(grace_period).await
    }

    /// Removes a pending grace period. Returns whether one existed.
    pub async fn remove_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        self.grace_periods
            .remove_grace_period(group_id, member_id, role_id)
            .await
    }

    /// Lists grace periods that expired before `now`.
    pub async fn list_expired_grace_periods(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<GracePeriod>> {
        self.grace_periods.list_expired_grace_periods(now).await
    }

    fn store_fields(&self, binding: &NewBinding) -> AppResult<StoredBindingFields> {
        match self.encryption {
            FieldEncryption::Disabled => Ok(plaintext_fields(binding)),
            FieldEncryption::Required => {
                let sealer = self.gateway.require_sealer(&binding.group_id)?;
                seal_fields(sealer.as_ref(), binding)
            }
        }
    }

    fn lookup_key(&self, group_id: &GroupId, field: &str, value: &str) -> AppResult<String> {
        match self.encryption {
            FieldEncryption::Disabled => Ok(value.to_owned()),
            FieldEncryption::Required => self.gateway.blind_index(group_id, field, value),
        }
    }

    fn decode(&self, row: StoredBinding) -> AppResult<Binding> {
        if !row.fields.sealed {
            return decode_plaintext(&row).map(|binding| binding.into_binding(row.id));
        }

        let sealer = self.gateway.require_sealer(&row.group_id)?;
        let identity = sealer.open(row.fields.identity_value.as_str())?;
        let display_name = sealer.open(row.fields.display_name_value.as_str())?;
        let wallet = sealer.open(row.fields.wallet_value.as_str())?;

        Ok(Binding {
            id: row.id,
            group_id: row.group_id,
            identity_id: corrupt_column(IdentityId::new(identity), row.id.as_i64())?,
            display_name,
            wallet_address: corrupt_column(WalletAddress::parse(&wallet), row.id.as_i64())?,
        })
    }
}

fn plaintext_fields(binding: &NewBinding) -> StoredBindingFields {
    StoredBindingFields {
        sealed: false,
        identity_lookup: binding.identity_id.as_str().to_owned(),
        identity_value: binding.identity_id.as_str().to_owned(),
        display_name_value: binding.display_name.clone(),
        wallet_lookup: binding.wallet_address.as_str().to_owned(),
        wallet_value: binding.wallet_address.as_str().to_owned(),
    }
}

fn seal_fields(sealer: &dyn FieldSealer, binding: &NewBinding) -> AppResult<StoredBindingFields> {
    Ok(StoredBindingFields {
        sealed: true,
        identity_lookup: sealer.blind_index(IDENTITY_FIELD, binding.identity_id.as_str()),
        identity_value: sealer.seal(binding.identity_id.as_str())?,
        display_name_value: sealer.seal(binding.display_name.as_str())?,
        wallet_lookup: sealer.blind_index(WALLET_FIELD, binding.wallet_address.as_str()),
        wallet_value: sealer.seal(binding.wallet_address.as_str())?,
    })
}

fn decode_plaintext(row: &StoredBinding) -> AppResult<NewBinding> {
    Ok(NewBinding {
        group_id: row.group_id.clone(),
        identity_id: corrupt_column(
            IdentityId::new(row.fields.identity_value.as_str()),
            row.id.as_i64(),
        )?,
        display_name: row.fields.display_name_value.clone(),
        wallet_address: corrupt_column(
            WalletAddress::parse(row.fields.wallet_value.as_str()),
            row.id.as_i64(),
        )?,
    })
}

fn corrupt_column<T>(value: AppResult<T>, binding_id: i64) -> AppResult<T> {
    value.map_err(|error| {
        AppError::Internal(format!("binding {binding_id} holds an invalid value: {error}"))
    })
}

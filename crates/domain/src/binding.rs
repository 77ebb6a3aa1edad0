use rolewarden_core::GroupId;
use serde::{Deserialize, Serialize};

use crate::{IdentityId, WalletAddress};

/// Storage identifier of a binding row. Monotonic and unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(i64);

impl BindingId {
    /// Wraps a storage identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the storage identifier.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Verified link between a platform identity and a wallet address.
///
/// At most one binding exists per wallet within a group: binding the wallet
/// again overwrites the identity fields of the existing binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Storage identifier.
    pub id: BindingId,
    /// Group the binding (and its encryption key) belongs to.
    pub group_id: GroupId,
    /// Platform identity that proved ownership of the wallet.
    pub identity_id: IdentityId,
    /// Platform display name captured at bind time.
    pub display_name: String,
    /// Bound wallet.
    pub wallet_address: WalletAddress,
}

/// Binding fields accepted by the credential store before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBinding {
    /// Group the binding belongs to.
    pub group_id: GroupId,
    /// Verified platform identity.
    pub identity_id: IdentityId,
    /// Platform display name.
    pub display_name: String,
    /// Verified wallet.
    pub wallet_address: WalletAddress,
}

impl NewBinding {
    /// Attaches the storage identifier assigned by the store.
    #[must_use]
    pub fn into_binding(self, id: BindingId) -> Binding {
        Binding {
            id,
            group_id: self.group_id,
            identity_id: self.identity_id,
            display_name: self.display_name,
            wallet_address: self.wallet_address,
        }
    }
}

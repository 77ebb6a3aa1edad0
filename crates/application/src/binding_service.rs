//! Verification of bind requests against two independent proofs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{BIND_CHALLENGE, Binding, IdentityId, NewBinding, WalletAddress};

use crate::credential_store::CredentialStore;

/// Identity returned by the identity platform for a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformIdentity {
    /// Authenticated user identifier.
    pub identity_id: IdentityId,
    /// Display name of the user.
    pub display_name: String,
}

/// Port for the identity platform's "who am I" endpoint.
#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Exchanges a bearer token for the caller's identity.
    async fn who_am_i(&self, access_token: &str) -> AppResult<PlatformIdentity>;
}

/// Port recovering the signer of a wallet signature.
pub trait WalletSignatureVerifier: Send + Sync {
    /// Returns the address that produced `signature` over `message`.
    fn recover_signer(&self, message: &str, signature: &str) -> AppResult<WalletAddress>;
}

/// Bind request as received from the bind page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    /// Opaque bearer token issued by the identity platform.
    pub identity_access_token: String,
    /// Identity the caller claims to be.
    pub claimed_identity_id: String,
    /// Wallet the caller claims to own.
    pub claimed_wallet_address: String,
    /// Wallet signature over the bind challenge.
    pub signature: String,
    /// Group the binding is scoped to.
    pub group_id: GroupId,
}

/// Application service implementing the bind flow.
#[derive(Clone)]
pub struct BindingService {
    identity_platform: Arc<dyn IdentityPlatform>,
    signature_verifier: Arc<dyn WalletSignatureVerifier>,
    credential_store: CredentialStore,
}

impl BindingService {
    /// Creates a binding service.
    #[must_use]
    pub fn new(
        identity_platform: Arc<dyn IdentityPlatform>,
        signature_verifier: Arc<dyn WalletSignatureVerifier>,
        credential_store: CredentialStore,
    ) -> Self {
        Self {
            identity_platform,
            signature_verifier,
            credential_store,
        }
    }

    /// Verifies both proofs and persists the binding.
    ///
    /// Fails with `IdentityMismatch` when the token does not belong to the
    /// claimed identity, `SignatureMismatch` when the signature was not made
    /// by the claimed wallet, and `EncryptionKeyUnavailable` when encryption
    /// is required but the group's key is not loaded. Nothing is written on
    /// failure.
    pub async fn bind(&self, request: BindRequest) -> AppResult<Binding> {
        let claimed_identity = IdentityId::new(request.claimed_identity_id)?;
        let claimed_wallet = WalletAddress::parse(&request.claimed_wallet_address)?;

        let platform_identity = self
            .identity_platform
            .who_am_i(request.identity_access_token.as_str())
            .await
            .map_err(|error| {
                warn!(
                    claimed_identity_id = %claimed_identity,
                    error = %error,
                    "identity platform rejected bind token"
                );
                AppError::IdentityMismatch(format!(
                    "could not confirm identity '{claimed_identity}'"
                ))
            })?;

        if platform_identity.identity_id != claimed_identity {
            return Err(AppError::IdentityMismatch(format!(
                "token does not belong to identity '{claimed_identity}'"
            )));
        }

        let signer = self
            .signature_verifier
            .recover_signer(BIND_CHALLENGE, request.signature.as_str())
            .map_err(|error| {
                AppError::SignatureMismatch(format!("signature could not be recovered: {error}"))
            })?;

        // Both sides are normalized to lowercase on parse.
        if signer != claimed_wallet {
            return Err(AppError::SignatureMismatch(format!(
                "signature was made by '{signer}', not '{claimed_wallet}'"
            )));
        }

        let binding = self
            .credential_store
            .upsert_binding(NewBinding {
                group_id: request.group_id,
                identity_id: claimed_identity,
                display_name: platform_identity.display_name,
                wallet_address: claimed_wallet,
            })
            .await?;

        info!(
            group_id = %binding.group_id,
            binding_id = binding.id.as_i64(),
            "wallet bound"
        );

        Ok(binding)
    }
}

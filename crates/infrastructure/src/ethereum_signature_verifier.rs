//! Signer recovery for Ethereum `personal_sign` signatures.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use rolewarden_application::WalletSignatureVerifier;
use rolewarden_core::{AppError, AppResult};
use rolewarden_domain::WalletAddress;

const SIGNATURE_LENGTH: usize = 65;

/// Recovers the wallet that produced a 65-byte `r || s || v` signature
/// over an EIP-191 prefixed message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthereumSignatureVerifier;

impl EthereumSignatureVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WalletSignatureVerifier for EthereumSignatureVerifier {
    fn recover_signer(&self, message: &str, signature: &str) -> AppResult<WalletAddress> {
        let trimmed = signature.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|error| AppError::Validation(format!("signature is not hex: {error}")))?;
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(AppError::Validation(format!(
                "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        let (compact, parity) = bytes.split_at(64);
        let mut signature = Signature::from_slice(compact)
            .map_err(|error| AppError::Validation(format!("invalid signature: {error}")))?;
        let mut recovery_id = recovery_id(parity[0])?;

        // Wallets may emit high-s signatures; recovery expects the low-s form.
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let digest = personal_message_digest(message);
        let verifying_key =
            VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
                .map_err(|error| {
                    AppError::SignatureMismatch(format!("signer could not be recovered: {error}"))
                })?;

        Ok(address_of(&verifying_key))
    }
}

fn recovery_id(v: u8) -> AppResult<RecoveryId> {
    let normalized = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => {
            return Err(AppError::Validation(format!(
                "signature recovery byte {other} is not supported"
            )));
        }
    };

    RecoveryId::from_byte(normalized)
        .ok_or_else(|| AppError::Validation(format!("invalid recovery byte {v}")))
}

fn personal_message_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn address_of(verifying_key: &VerifyingKey) -> WalletAddress {
    let encoded = verifying_key.to_encoded_point(false);
    let hash: [u8; 32] = Keccak256::digest(&encoded.as_bytes()[1..]).into();

    let mut address = [0_u8; 20];
    address.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&address)
}

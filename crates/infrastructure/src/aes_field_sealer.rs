//! AES-256-GCM sealing with HMAC-SHA256 blind indexes for stored bindings.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use rolewarden_application::{FieldSealer, FieldSealerProvider};
use rolewarden_core::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LENGTH: usize = 12;
const INDEX_KEY_LABEL: &[u8] = b"rolewarden/blind-index/v1";
const CIPHER_KEY_LABEL: &[u8] = b"rolewarden/field-cipher/v1";

/// Field sealer for one group key.
///
/// Two subkeys are derived from the master key so the lookup index and the
/// ciphertext never share key material.
#[derive(Clone)]
pub struct AesFieldSealer {
    index_mac: HmacSha256,
    cipher: Aes256Gcm,
}

impl AesFieldSealer {
    /// Creates a sealer from a 32-byte master key.
    pub fn new(master_key: &[u8; 32]) -> AppResult<Self> {
        let index_key = derive_subkey(master_key, INDEX_KEY_LABEL)?;
        let cipher_key = derive_subkey(master_key, CIPHER_KEY_LABEL)?;

        let index_mac = <HmacSha256 as Mac>::new_from_slice(&index_key)
            .map_err(|error| AppError::Internal(format!("invalid blind index key: {error}")))?;
        let cipher = Aes256Gcm::new((&cipher_key).into());

        Ok(Self { index_mac, cipher })
    }

    /// Creates a sealer from a hex-encoded 32-byte master key.
    pub fn from_hex(hex_key: &str) -> AppResult<Self> {
        let decoded = hex::decode(hex_key.trim()).map_err(|error| {
            AppError::Validation(format!("invalid group encryption key hex: {error}"))
        })?;

        let key: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            AppError::Validation(
                "group encryption key must be exactly 32 bytes (64 hex chars)".to_owned(),
            )
        })?;

        Self::new(&key)
    }
}

impl FieldSealer for AesFieldSealer {
    fn blind_index(&self, field: &str, value: &str) -> String {
        let mut mac = self.index_mac.clone();
        mac.update(field.as_bytes());
        mac.update(&[0]);
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn seal(&self, plaintext: &str) -> AppResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|error| AppError::Internal(format!("failed to seal field: {error}")))?;

        // Nonce is stored in front of the ciphertext.
        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, sealed: &str) -> AppResult<String> {
        let decoded = STANDARD
            .decode(sealed)
            .map_err(|error| AppError::Internal(format!("sealed field is not base64: {error}")))?;

        if decoded.len() < NONCE_LENGTH {
            return Err(AppError::Internal(
                "sealed field too short: missing nonce".to_owned(),
            ));
        }

        let (nonce_bytes, ciphertext) = decoded.split_at(NONCE_LENGTH);
        let nonce_array: [u8; NONCE_LENGTH] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::Internal("nonce must be exactly 12 bytes".to_owned()))?;
        let nonce = Nonce::from(nonce_array);

        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|error| AppError::Internal(format!("failed to open sealed field: {error}")))?;

        String::from_utf8(plaintext)
            .map_err(|error| AppError::Internal(format!("sealed field is not UTF-8: {error}")))
    }
}

/// Builds [`AesFieldSealer`]s from hex key material posted in setup channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesFieldSealerProvider;

impl FieldSealerProvider for AesFieldSealerProvider {
    fn sealer_from_key_material(&self, key_material: &str) -> AppResult<Arc<dyn FieldSealer>> {
        Ok(Arc::new(AesFieldSealer::from_hex(key_material)?))
    }
}

fn derive_subkey(master_key: &[u8; 32], label: &[u8]) -> AppResult<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(master_key)
        .map_err(|error| AppError::Internal(format!("invalid master key: {error}")))?;
    mac.update(label);
    Ok(mac.finalize().into_bytes().into())
}

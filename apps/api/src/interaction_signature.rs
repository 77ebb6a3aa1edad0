//! Ed25519 verification of chat-platform interaction requests.

use axum::http::HeaderMap;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rolewarden_core::AppError;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Verifies that interaction bodies were signed by the application key.
#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    public_key: VerifyingKey,
}

impl InteractionVerifier {
    pub fn new(public_key: VerifyingKey) -> Self {
        Self { public_key }
    }

    pub fn from_hex(public_key_hex: &str) -> Result<Self, AppError> {
        let bytes: [u8; 32] = hex::decode(public_key_hex.trim())
            .map_err(|error| {
                AppError::Validation(format!(
                    "DISCORD_APPLICATION_PUBLIC_KEY is not hex: {error}"
                ))
            })?
            .try_into()
            .map_err(|_| {
                AppError::Validation(
                    "DISCORD_APPLICATION_PUBLIC_KEY must be 32 bytes".to_owned(),
                )
            })?;

        let public_key = VerifyingKey::from_bytes(&bytes).map_err(|error| {
            AppError::Validation(format!("invalid DISCORD_APPLICATION_PUBLIC_KEY: {error}"))
        })?;

        Ok(Self::new(public_key))
    }

    /// Checks the signature headers against `timestamp || body`.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), AppError> {
        let signature_hex = header_value(headers, SIGNATURE_HEADER)?;
        let timestamp = header_value(headers, TIMESTAMP_HEADER)?;

        let signature_bytes: [u8; 64] = hex::decode(signature_hex)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                AppError::SignatureMismatch("interaction signature is malformed".to_owned())
            })?;
        let signature = Signature::from_bytes(&signature_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.public_key
            .verify(&message, &signature)
            .map_err(|_| AppError::SignatureMismatch("interaction signature is invalid".to_owned()))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::SignatureMismatch(format!("missing {name} header")))
}

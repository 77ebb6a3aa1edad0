//! Platform identity, role and wallet identifiers.

use std::fmt::{Display, Formatter};

use rolewarden_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Fixed, publicly known message a wallet signs to prove ownership.
///
/// The bind page asks the wallet to sign exactly this text; changing it
/// invalidates every signature produced by deployed clients.
pub const BIND_CHALLENGE: &str =
    "This signature is safe and will bind your wallet to your discord user ID.";

/// Chat-platform user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(String);

impl IdentityId {
    /// Creates an identity identifier from its platform value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(AppError::Validation(
                "identity id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the platform value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for IdentityId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdentityId> for String {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

impl Display for IdentityId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Chat-platform role identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

impl RoleId {
    /// Creates a role identifier from its platform value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(AppError::Validation("role id must not be empty".to_owned()));
        }

        Ok(Self(value))
    }

    /// Returns the platform value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for RoleId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleId> for String {
    fn from(value: RoleId) -> Self {
        value.0
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// EVM wallet address, normalized to lowercase `0x`-prefixed hex.
///
/// Normalizing on construction makes equality case-insensitive on the
/// plaintext, so checksummed and lowercase spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Number of hex characters after the `0x` prefix.
    pub const HEX_LENGTH: usize = 40;

    /// Parses and normalizes a wallet address.
    pub fn parse(value: &str) -> AppResult<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| {
                AppError::Validation(format!("wallet address '{trimmed}' must start with 0x"))
            })?;

        if digits.len() != Self::HEX_LENGTH
            || !digits.chars().all(|character| character.is_ascii_hexdigit())
        {
            return Err(AppError::Validation(format!(
                "wallet address '{trimmed}' must contain exactly 40 hex characters"
            )));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Builds an address from the 20 raw address bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        use std::fmt::Write;

        let encoded = bytes
            .iter()
            .fold(String::with_capacity(42), |mut acc, byte| {
                let _ = write!(acc, "{byte:02x}");
                acc
            });

        Self(format!("0x{encoded}"))
    }

    /// Returns the normalized lowercase address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl Display for WalletAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn checksummed_address_is_normalized() {
        let address = WalletAddress::parse("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
        assert_eq!(
            address.map(String::from).ok().as_deref(),
            Some("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf")
        );
    }

    #[test]
    fn address_without_prefix_is_rejected() {
        assert!(WalletAddress::parse("7e5f4552091a69125d5dfcb7b8c2659029395bdf").is_err());
    }

    #[test]
    fn short_address_is_rejected() {
        assert!(WalletAddress::parse("0x7e5f45").is_err());
    }

    #[test]
    fn non_hex_address_is_rejected() {
        assert!(WalletAddress::parse("0xzz5f4552091a69125d5dfcb7b8c2659029395bdf").is_err());
    }

    #[test]
    fn address_from_bytes_matches_parsed_form() {
        let bytes = [0xabu8; 20];
        let parsed = WalletAddress::parse(&format!("0x{}", "AB".repeat(20)));
        assert_eq!(parsed.ok(), Some(WalletAddress::from_bytes(&bytes)));
    }

    #[test]
    fn identity_id_rejects_blank_values() {
        assert!(IdentityId::new("  ").is_err());
        assert!(RoleId::new("").is_err());
    }

    proptest! {
        #[test]
        fn wallet_equality_ignores_case(digits in "[0-9a-fA-F]{40}") {
            let lower = WalletAddress::parse(&format!("0x{}", digits.to_ascii_lowercase()));
            let upper = WalletAddress::parse(&format!("0X{}", digits.to_ascii_uppercase()));
            let mixed = WalletAddress::parse(&format!("0x{digits}"));

            prop_assert!(lower.is_ok());
            prop_assert_eq!(lower.as_ref().ok(), upper.as_ref().ok());
            prop_assert_eq!(lower.ok(), mixed.ok());
        }
    }
}

//! Shared primitives for all Rust crates in Rolewarden.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Rolewarden crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Chat-platform group (guild) identifier.
///
/// Every binding, role policy, grace period and encryption key is scoped by a
/// group, so it is the partition key threaded through every store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Creates a group identifier from its platform value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new(value.into().trim().to_owned()).map_err(|_| {
            AppError::Validation("group id must not be empty".to_owned())
        })?;

        Ok(Self(value.into()))
    }

    /// Returns the platform value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for GroupId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupId> for String {
    fn from(value: GroupId) -> Self {
        value.0
    }
}

impl Display for GroupId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The identity platform did not confirm the claimed identity.
    #[error("identity mismatch: {0}")]
    IdentityMismatch(String),

    /// The wallet signature does not recover to the claimed address.
    #[error("signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Encryption is required for a group whose key has not been loaded.
    #[error("encryption key unavailable: {0}")]
    EncryptionKeyUnavailable(String),

    /// The key distribution channel holds no key for a group.
    #[error("key not configured: {0}")]
    KeyNotConfigured(String),

    /// A call to an external platform, oracle or identity provider failed.
    #[error("external api failure: {0}")]
    ExternalApi(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

//! Per-group key material and field sealing for stored identity data.
//!
//! Stored fields are split in two: a keyed blind index used only for equality
//! lookups and the uniqueness constraint, and a randomized authenticated
//! ciphertext used only for reading values back. The key for a group comes
//! from the latest message of that group's setup channel and is cached for
//! the lifetime of the process.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{info, warn};

use rolewarden_core::{AppError, AppResult, GroupId};

/// Whether stored identity fields are encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncryption {
    /// Fields are stored as plaintext.
    Disabled,
    /// Fields are sealed; groups without a loaded key cannot store or read bindings.
    Required,
}

impl FieldEncryption {
    /// Returns the configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Required => "required",
        }
    }
}

impl FromStr for FieldEncryption {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "required" => Ok(Self::Required),
            other => Err(AppError::Validation(format!(
                "FIELD_ENCRYPTION must be either 'disabled' or 'required', got '{other}'"
            ))),
        }
    }
}

/// Key-bound field protection for one group.
pub trait FieldSealer: Send + Sync {
    /// Computes the deterministic lookup key of a field value.
    ///
    /// `field` separates the index domains so equal values in different
    /// columns produce unrelated indexes.
    fn blind_index(&self, field: &str, value: &str) -> String;

    /// Encrypts a value with a fresh nonce.
    fn seal(&self, plaintext: &str) -> AppResult<String>;

    /// Decrypts and authenticates a sealed value.
    fn open(&self, sealed: &str) -> AppResult<String>;
}

/// Builds sealers from key material distributed through setup channels.
pub trait FieldSealerProvider: Send + Sync {
    /// Parses key material into a sealer.
    fn sealer_from_key_material(&self, key_material: &str) -> AppResult<Arc<dyn FieldSealer>>;
}

/// Port for the chat channel used to distribute group keys.
#[async_trait]
pub trait KeyDistributionChannel: Send + Sync {
    /// Returns the content of the latest message in the channel, if any.
    async fn latest_message(&self, channel_id: &str) -> AppResult<Option<String>>;
}

/// Application service holding the per-group sealers.
#[derive(Clone)]
pub struct EncryptionGateway {
    channel: Arc<dyn KeyDistributionChannel>,
    provider: Arc<dyn FieldSealerProvider>,
    setup_channels: Arc<HashMap<GroupId, String>>,
    sealers: Arc<RwLock<HashMap<GroupId, Arc<dyn FieldSealer>>>>,
}

impl EncryptionGateway {
    /// Creates a gateway from the setup channel of every configured group.
    #[must_use]
    pub fn new(
        channel: Arc<dyn KeyDistributionChannel>,
        provider: Arc<dyn FieldSealerProvider>,
        setup_channels: HashMap<GroupId, String>,
    ) -> Self {
        Self {
            channel,
            provider,
            setup_channels: Arc::new(setup_channels),
            sealers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Loads and caches the key of one group.
    ///
    /// A group whose key is already cached is left untouched: keys are never
    /// refreshed within one process.
    pub async fn load_key(&self, group_id: &GroupId) -> AppResult<()> {
        if self.sealer_for(group_id)?.is_some() {
            return Ok(());
        }

        let channel_id = self.setup_channels.get(group_id).ok_or_else(|| {
            AppError::KeyNotConfigured(format!("group '{group_id}' has no setup channel"))
        })?;

        let key_material = self
            .channel
            .latest_message(channel_id)
            .await?
            .map(|message| message.trim().to_owned())
            .filter(|message| !message.is_empty())
            .ok_or_else(|| {
                AppError::KeyNotConfigured(format!(
                    "setup channel of group '{group_id}' holds no key"
                ))
            })?;

        let sealer = self.provider.sealer_from_key_material(&key_material)?;
        self.sealers
            .write()
            .map_err(|error| {
                AppError::Internal(format!("failed to lock encryption key cache: {error}"))
            })?
            .entry(group_id.clone())
            .or_insert(sealer);

        Ok(())
    }

    /// Loads the key of every group that has a setup channel.
    ///
    /// Failures are logged per group and do not stop the remaining groups.
    /// Returns the number of groups with a usable key afterwards.
    pub async fn load_configured_keys(&self) -> usize {
        let mut group_ids: Vec<&GroupId> = self.setup_channels.keys().collect();
        group_ids.sort();

        let mut loaded = 0_usize;
        for group_id in group_ids {
            match self.load_key(group_id).await {
                Ok(()) => {
                    loaded += 1;
                    info!(group_id = %group_id, "group encryption key loaded");
                }
                Err(error) => {
                    warn!(group_id = %group_id, error = %error, "failed to load group encryption key");
                }
            }
        }

        loaded
    }

    /// Returns the cached sealer of a group.
    pub fn sealer_for(&self, group_id: &GroupId) -> AppResult<Option<Arc<dyn FieldSealer>>> {
        let sealers = self.sealers.read().map_err(|error| {
            AppError::Internal(format!("failed to lock encryption key cache: {error}"))
        })?;

        Ok(sealers.get(group_id).cloned())
    }

    /// Returns the cached sealer of a group or `EncryptionKeyUnavailable`.
    pub fn require_sealer(&self, group_id: &GroupId) -> AppResult<Arc<dyn FieldSealer>> {
        self.sealer_for(group_id)?.ok_or_else(|| {
            AppError::EncryptionKeyUnavailable(format!(
                "no encryption key loaded for group '{group_id}'"
            ))
        })
    }

    /// Encrypts a value under the key of a group.
    pub fn encrypt(&self, group_id: &GroupId, plaintext: &str) -> AppResult<String> {
        self.require_sealer(group_id)?.seal(plaintext)
    }

    /// Decrypts a value sealed under the key of a group.
    pub fn decrypt(&self, group_id: &GroupId, ciphertext: &str) -> AppResult<String> {
        self.require_sealer(group_id)?.open(ciphertext)
    }

    /// Computes the lookup key of a field value under the key of a group.
    pub fn blind_index(&self, group_id: &GroupId, field: &str, value: &str) -> AppResult<String> {
        Ok(self.require_sealer(group_id)?.blind_index(field, value))
    }
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rolewarden_application::FieldEncryption;
use rolewarden_core::{AppError, AppResult};

const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";
const DEFAULT_RECONCILE_INTERVAL_SECONDS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub discord_bot_token: String,
    pub discord_api_base_url: String,
    pub groups_config_path: String,
    pub field_encryption: FieldEncryption,
    pub ownership_oracle_url: String,
    pub reconcile_interval: Duration,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let required = |name: &str| -> AppResult<String> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = required("DATABASE_URL")?;
        let discord_bot_token = required("DISCORD_BOT_TOKEN")?;
        let discord_api_base_url = optional("DISCORD_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE_URL.to_owned());
        let groups_config_path = required("GROUPS_CONFIG_PATH")?;
        let field_encryption = optional("FIELD_ENCRYPTION")
            .map(|value| FieldEncryption::from_str(value.as_str()))
            .transpose()?
            .unwrap_or(FieldEncryption::Disabled);
        let ownership_oracle_url = required("OWNERSHIP_ORACLE_URL")?;

        let reconcile_interval_seconds = match optional("RECONCILE_INTERVAL_SECONDS") {
            Some(value) => value.trim().parse::<u64>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid RECONCILE_INTERVAL_SECONDS value '{value}': {error}"
                ))
            })?,
            None => DEFAULT_RECONCILE_INTERVAL_SECONDS,
        };

        if reconcile_interval_seconds == 0 {
            return Err(AppError::Validation(
                "RECONCILE_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            discord_bot_token,
            discord_api_base_url,
            groups_config_path,
            field_encryption,
            ownership_oracle_url,
            reconcile_interval: Duration::from_secs(reconcile_interval_seconds),
        })
    }
}

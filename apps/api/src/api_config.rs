use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rolewarden_application::FieldEncryption;
use rolewarden_core::{AppError, GroupId};
use tracing_subscriber::EnvFilter;

const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub discord_bot_token: String,
    pub discord_api_base_url: String,
    pub discord_application_id: Option<String>,
    pub discord_application_public_key: String,
    pub groups_config_path: String,
    pub field_encryption: FieldEncryption,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: Option<String>,
    pub bind_page_url: String,
    pub bind_default_group_id: Option<GroupId>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let required = |name: &str| -> Result<String, AppError> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = required("DATABASE_URL")?;
        let discord_bot_token = required("DISCORD_BOT_TOKEN")?;
        let discord_api_base_url = optional("DISCORD_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE_URL.to_owned());
        let discord_application_id = optional("DISCORD_APPLICATION_ID");
        let discord_application_public_key = required("DISCORD_APPLICATION_PUBLIC_KEY")?;
        let groups_config_path = required("GROUPS_CONFIG_PATH")?;
        let field_encryption = optional("FIELD_ENCRYPTION")
            .map(|value| FieldEncryption::from_str(value.as_str()))
            .transpose()?
            .unwrap_or(FieldEncryption::Disabled);

        let api_host = optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = optional("API_PORT")
            .map(|value| {
                value
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))
            })
            .transpose()?
            .unwrap_or(3001);

        let frontend_url = optional("FRONTEND_URL");
        let bind_page_url = required("BIND_PAGE_URL")?;
        let bind_default_group_id = optional("BIND_DEFAULT_GROUP_ID")
            .map(|value| {
                GroupId::new(value).map_err(|error| {
                    AppError::Validation(format!("invalid BIND_DEFAULT_GROUP_ID: {error}"))
                })
            })
            .transpose()?;

        Ok(Self {
            migrate_only,
            database_url,
            discord_bot_token,
            discord_api_base_url,
            discord_application_id,
            discord_application_public_key,
            groups_config_path,
            field_encryption,
            api_host,
            api_port,
            frontend_url,
            bind_page_url,
            bind_default_group_id,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        move |name| values.get(name).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/rolewarden"),
        ("DISCORD_BOT_TOKEN", "bot-token"),
        ("DISCORD_APPLICATION_PUBLIC_KEY", "ab"),
        ("GROUPS_CONFIG_PATH", "groups.json"),
        ("BIND_PAGE_URL", "https://bind.example/"),
    ];

    #[test]
    fn minimal_environment_uses_defaults() -> Result<(), AppError> {
        let config = ApiConfig::from_lookup(false, lookup_from(MINIMAL))?;

        assert_eq!(config.discord_api_base_url, DEFAULT_DISCORD_API_BASE_URL);
        assert_eq!(config.field_encryption, FieldEncryption::Disabled);
        assert_eq!(config.socket_address()?.to_string(), "127.0.0.1:3001");
        assert!(config.discord_application_id.is_none());
        assert!(config.bind_default_group_id.is_none());
        assert!(config.frontend_url.is_none());
        Ok(())
    }

    #[test]
    fn missing_required_variable_is_reported_by_name() {
        let pairs: Vec<(&str, &str)> = MINIMAL
            .iter()
            .copied()
            .filter(|(name, _)| *name != "BIND_PAGE_URL")
            .collect();

        let Err(AppError::Validation(message)) = ApiConfig::from_lookup(false, lookup_from(&pairs))
        else {
            panic!("missing BIND_PAGE_URL should be rejected");
        };
        assert!(message.contains("BIND_PAGE_URL"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (name, value) in [("FIELD_ENCRYPTION", "sometimes"), ("API_PORT", "http")] {
            let mut pairs = MINIMAL.to_vec();
            pairs.push((name, value));
            assert!(
                matches!(
                    ApiConfig::from_lookup(false, lookup_from(&pairs)),
                    Err(AppError::Validation(_))
                ),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn optional_overrides_are_read() -> Result<(), AppError> {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("FIELD_ENCRYPTION", "required"),
            ("API_PORT", "8080"),
            ("BIND_DEFAULT_GROUP_ID", "guild-a"),
            ("DISCORD_APPLICATION_ID", "42"),
        ]);

        let config = ApiConfig::from_lookup(true, lookup_from(&pairs))?;

        assert!(config.migrate_only);
        assert_eq!(config.field_encryption, FieldEncryption::Required);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.bind_default_group_id, Some(GroupId::new("guild-a")?));
        assert_eq!(config.discord_application_id.as_deref(), Some("42"));
        Ok(())
    }
}

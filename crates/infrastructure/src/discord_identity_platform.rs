//! Discord "who am I" lookup for bind tokens.

use async_trait::async_trait;
use serde::Deserialize;

use rolewarden_application::{IdentityPlatform, PlatformIdentity};
use rolewarden_core::{AppError, AppResult};
use rolewarden_domain::IdentityId;

use crate::http_response::{ensure_success, transport_error};

/// Identity platform adapter backed by the Discord REST API.
#[derive(Clone)]
pub struct DiscordIdentityPlatform {
    http_client: reqwest::Client,
    api_base_url: String,
}

impl DiscordIdentityPlatform {
    /// Creates an adapter for a Discord API base URL such as `https://discord.com/api/v10`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
}

impl CurrentUser {
    fn display_name(&self) -> String {
        match self.discriminator.as_deref() {
            Some(discriminator) if !discriminator.is_empty() && discriminator != "0" => {
                format!("{}#{discriminator}", self.username)
            }
            _ => self.username.clone(),
        }
    }
}

#[async_trait]
impl IdentityPlatform for DiscordIdentityPlatform {
    async fn who_am_i(&self, access_token: &str) -> AppResult<PlatformIdentity> {
        let action = "discord current user lookup";
        let response = self
            .http_client
            .get(format!("{}/users/@me", self.api_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| transport_error(action, error))?;

        let user: CurrentUser = ensure_success(response, action)
            .await?
            .json()
            .await
            .map_err(|error| {
                AppError::ExternalApi(format!("invalid discord current user payload: {error}"))
            })?;

        Ok(PlatformIdentity {
            display_name: user.display_name(),
            identity_id: IdentityId::new(user.id)?,
        })
    }
}

//! Discord bot client for guild members, roles and setup channels.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use rolewarden_application::{
    CommandDefinition, GuildDirectory, GuildMember, GuildRole, KeyDistributionChannel,
    RoleAssignments,
};
use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{IdentityId, RoleId};

use crate::http_response::{ensure_success, transport_error};

const MEMBER_PAGE_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct GuildCache {
    members: HashMap<IdentityId, GuildMember>,
    roles: HashMap<RoleId, GuildRole>,
}

/// Guild directory, role mutation and setup channel adapter authenticated
/// as a bot.
///
/// Members and roles fetched from the API are cached per guild; cached
/// lookups never hit the network.
pub struct DiscordGuildClient {
    http_client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
    cache: RwLock<HashMap<GroupId, GuildCache>>,
}

impl DiscordGuildClient {
    /// Creates a client for a Discord API base URL and bot token.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            bot_token: bot_token.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the guild slash commands of an application.
    pub async fn publish_commands(
        &self,
        application_id: &str,
        group_id: &GroupId,
        definitions: &[CommandDefinition],
    ) -> AppResult<()> {
        let payload: Vec<CommandPayload<'_>> = definitions
            .iter()
            .map(|definition| CommandPayload {
                name: definition.name.as_str(),
                description: definition.description.as_str(),
                kind: 1,
            })
            .collect();

        self.send(
            self.http_client
                .put(format!(
                    "{}/applications/{application_id}/guilds/{group_id}/commands",
                    self.api_base_url
                ))
                .json(&payload),
            "discord command publication",
        )
        .await?;

        Ok(())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.bot_token))
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        action: &str,
    ) -> AppResult<reqwest::Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|error| transport_error(action, error))?;

        ensure_success(response, action).await
    }

    async fn get_json<T>(&self, url: String, action: &str) -> AppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.send(self.http_client.get(url), action)
            .await?
            .json()
            .await
            .map_err(|error| AppError::ExternalApi(format!("invalid {action} payload: {error}")))
    }

    async fn update_cached_roles(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        update: impl FnOnce(&mut Vec<RoleId>),
    ) {
        let mut cache = self.cache.write().await;
        if let Some(member) = cache
            .get_mut(group_id)
            .and_then(|guild| guild.members.get_mut(member_id))
        {
            update(&mut member.role_ids);
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandPayload<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    user: UserPayload,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    content: String,
}

impl RolePayload {
    fn into_role(self) -> AppResult<GuildRole> {
        Ok(GuildRole {
            role_id: RoleId::new(self.id)?,
            name: self.name,
        })
    }
}

impl MemberPayload {
    fn into_member(self) -> AppResult<GuildMember> {
        let display_name = self
            .nick
            .or(self.user.global_name)
            .unwrap_or(self.user.username);

        Ok(GuildMember {
            member_id: IdentityId::new(self.user.id)?,
            display_name,
            role_ids: self
                .roles
                .into_iter()
                .map(RoleId::new)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}

#[async_trait]
impl GuildDirectory for DiscordGuildClient {
    async fn fetch_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>> {
        let payload: Vec<RolePayload> = self
            .get_json(
                format!("{}/guilds/{group_id}/roles", self.api_base_url),
                "discord role listing",
            )
            .await?;
        let roles = payload
            .into_iter()
            .map(RolePayload::into_role)
            .collect::<AppResult<Vec<_>>>()?;

        let found = roles.iter().find(|role| &role.role_id == role_id).cloned();
        let mut cache = self.cache.write().await;
        cache.entry(group_id.clone()).or_default().roles = roles
            .into_iter()
            .map(|role| (role.role_id.clone(), role))
            .collect();

        Ok(found)
    }

    async fn fetch_members(&self, group_id: &GroupId) -> AppResult<Vec<GuildMember>> {
        let mut members = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/guilds/{group_id}/members?limit={MEMBER_PAGE_SIZE}",
                self.api_base_url
            );
            if let Some(after) = after.as_deref() {
                url.push_str("&after=");
                url.push_str(after);
            }

            let page: Vec<MemberPayload> = self.get_json(url, "discord member listing").await?;
            let page_len = page.len();
            for payload in page {
                members.push(payload.into_member()?);
            }

            if page_len < MEMBER_PAGE_SIZE {
                break;
            }
            after = members
                .last()
                .map(|member| member.member_id.as_str().to_owned());
        }

        debug!(group_id = %group_id, members = members.len(), "fetched guild members");

        let mut cache = self.cache.write().await;
        cache.entry(group_id.clone()).or_default().members = members
            .iter()
            .map(|member| (member.member_id.clone(), member.clone()))
            .collect();

        Ok(members)
    }

    async fn cached_member(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
    ) -> AppResult<Option<GuildMember>> {
        Ok(self
            .cache
            .read()
            .await
            .get(group_id)
            .and_then(|guild| guild.members.get(member_id))
            .cloned())
    }

    async fn cached_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>> {
        Ok(self
            .cache
            .read()
            .await
            .get(group_id)
            .and_then(|guild| guild.roles.get(role_id))
            .cloned())
    }
}

#[async_trait]
impl RoleAssignments for DiscordGuildClient {
    async fn add_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        self.send(
            self.http_client.put(format!(
                "{}/guilds/{group_id}/members/{member_id}/roles/{role_id}",
                self.api_base_url
            )),
            "discord role grant",
        )
        .await?;

        self.update_cached_roles(group_id, member_id, |roles| {
            if !roles.contains(role_id) {
                roles.push(role_id.clone());
            }
        })
        .await;
        Ok(())
    }

    async fn remove_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        self.send(
            self.http_client.delete(format!(
                "{}/guilds/{group_id}/members/{member_id}/roles/{role_id}",
                self.api_base_url
            )),
            "discord role removal",
        )
        .await?;

        self.update_cached_roles(group_id, member_id, |roles| {
            roles.retain(|held| held != role_id);
        })
        .await;
        Ok(())
    }
}

#[async_trait]
impl KeyDistributionChannel for DiscordGuildClient {
    async fn latest_message(&self, channel_id: &str) -> AppResult<Option<String>> {
        let messages: Vec<MessagePayload> = self
            .get_json(
                format!("{}/channels/{channel_id}/messages?limit=1", self.api_base_url),
                "discord setup channel read",
            )
            .await?;

        Ok(messages.into_iter().next().map(|message| message.content))
    }
}

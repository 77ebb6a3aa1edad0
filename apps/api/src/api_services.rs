use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rolewarden_application::{
    BindLinkCommand, BindingService, BoundWalletsCommand, CommandRegistry, CredentialStore,
    EncryptionGateway, GroupsConfig,
};
use rolewarden_core::{AppError, GroupId};
use rolewarden_infrastructure::{
    AesFieldSealerProvider, DiscordGuildClient, DiscordIdentityPlatform,
    EthereumSignatureVerifier, PostgresBindingRepository, PostgresGracePeriodRepository,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::api_config::ApiConfig;
use crate::interaction_signature::InteractionVerifier;
use crate::state::AppState;

pub fn load_groups_config(path: &str) -> Result<GroupsConfig, AppError> {
    let document = fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read groups configuration '{path}': {error}"))
    })?;

    GroupsConfig::from_json(&document)
}

pub async fn build_app_state(
    pool: PgPool,
    config: &ApiConfig,
    groups: GroupsConfig,
) -> Result<AppState, AppError> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let guild_client = Arc::new(DiscordGuildClient::new(
        http_client.clone(),
        config.discord_api_base_url.as_str(),
        config.discord_bot_token.as_str(),
    ));
    let gateway = EncryptionGateway::new(
        guild_client.clone(),
        Arc::new(AesFieldSealerProvider),
        groups.setup_channels(),
    );
    let credential_store = CredentialStore::new(
        Arc::new(PostgresBindingRepository::new(pool.clone())),
        Arc::new(PostgresGracePeriodRepository::new(pool)),
        gateway,
        config.field_encryption,
    );

    let group_ids: Vec<GroupId> = groups
        .groups()
        .iter()
        .map(|group| group.group_id.clone())
        .collect();
    let sealed = credential_store.prepare_encryption(&group_ids).await;
    if sealed.sealed > 0 || sealed.skipped > 0 {
        info!(
            sealed = sealed.sealed,
            skipped = sealed.skipped,
            "plaintext bindings resealed"
        );
    }

    let binding_service = BindingService::new(
        Arc::new(DiscordIdentityPlatform::new(
            http_client,
            config.discord_api_base_url.as_str(),
        )),
        Arc::new(EthereumSignatureVerifier::new()),
        credential_store.clone(),
    );

    let command_registry = build_command_registry(config, credential_store)?;
    if let Some(application_id) = config.discord_application_id.as_deref() {
        publish_commands(&guild_client, application_id, &group_ids, &command_registry).await;
    }

    Ok(AppState {
        binding_service,
        command_registry: Arc::new(command_registry),
        interaction_verifier: InteractionVerifier::from_hex(
            config.discord_application_public_key.as_str(),
        )?,
        groups: Arc::new(groups),
        bind_default_group_id: config.bind_default_group_id.clone(),
    })
}

fn build_command_registry(
    config: &ApiConfig,
    credential_store: CredentialStore,
) -> Result<CommandRegistry, AppError> {
    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(BindLinkCommand::new(config.bind_page_url.as_str())))?;
    registry.register(Arc::new(BoundWalletsCommand::new(credential_store)))?;
    Ok(registry)
}

async fn publish_commands(
    guild_client: &DiscordGuildClient,
    application_id: &str,
    group_ids: &[GroupId],
    registry: &CommandRegistry,
) {
    let definitions = registry.definitions();
    for group_id in group_ids {
        match guild_client
            .publish_commands(application_id, group_id, &definitions)
            .await
        {
            Ok(()) => info!(group_id = %group_id, commands = definitions.len(), "commands published"),
            Err(error) => {
                warn!(group_id = %group_id, error = %error, "failed to publish commands");
            }
        }
    }
}

//! Rolewarden role reconciliation worker.

#![forbid(unsafe_code)]

mod supervisor;
mod worker_config;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rolewarden_application::{
    CredentialStore, EncryptionGateway, GroupsConfig, RoleReconciler, shutdown_channel,
};
use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_infrastructure::{
    AesFieldSealerProvider, DiscordGuildClient, HttpOwnershipOracle, PostgresBindingRepository,
    PostgresGracePeriodRepository, connect_and_migrate,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::worker_config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let groups = load_groups_config(config.groups_config_path.as_str())?;
    let policies = Arc::new(groups.policies());
    let pool = connect_and_migrate(config.database_url.as_str(), 5).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let guild_client = Arc::new(DiscordGuildClient::new(
        http_client.clone(),
        config.discord_api_base_url.as_str(),
        config.discord_bot_token.as_str(),
    ));

    let credential_store = CredentialStore::new(
        Arc::new(PostgresBindingRepository::new(pool.clone())),
        Arc::new(PostgresGracePeriodRepository::new(pool)),
        EncryptionGateway::new(
            guild_client.clone(),
            Arc::new(AesFieldSealerProvider),
            groups.setup_channels(),
        ),
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

    let reconciler = RoleReconciler::new(
        credential_store,
        guild_client.clone(),
        guild_client,
        Arc::new(HttpOwnershipOracle::new(
            http_client,
            config.ownership_oracle_url.as_str(),
        )),
    );

    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested; finishing the current member"),
            Err(error) => warn!(error = %error, "failed to listen for shutdown signal"),
        }
        trigger.trigger();
    });

    info!(
        groups = group_ids.len(),
        policies = policies.len(),
        interval_seconds = config.reconcile_interval.as_secs(),
        field_encryption = config.field_encryption.as_str(),
        "rolewarden-worker started"
    );

    let tick_signal = signal.clone();
    supervisor::run_supervised(config.reconcile_interval, signal, move || {
        let reconciler = reconciler.clone();
        let policies = policies.clone();
        let signal = tick_signal.clone();
        async move { reconciler.run_tick(&policies, Utc::now(), &signal).await }
    })
    .await;

    Ok(())
}

fn load_groups_config(path: &str) -> AppResult<GroupsConfig> {
    let document = fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read groups configuration '{path}': {error}"))
    })?;

    GroupsConfig::from_json(&document)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

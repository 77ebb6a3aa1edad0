//! Rolewarden API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod interaction_signature;
mod state;

use rolewarden_core::AppError;
use rolewarden_infrastructure::connect_and_migrate;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str(), 10).await?;

    if config.migrate_only {
        info!("migrations applied; exiting");
        return Ok(());
    }

    let groups = api_services::load_groups_config(config.groups_config_path.as_str())?;
    info!(
        groups = groups.groups().len(),
        policies = groups.policies().len(),
        field_encryption = config.field_encryption.as_str(),
        "groups configuration loaded"
    );

    let app_state = api_services::build_app_state(pool, &config, groups).await?;
    let app = api_router::build_router(app_state, config.frontend_url.as_deref())?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "rolewarden-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(error = %error, "failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use rolewarden_application::CommandInvocation;
use rolewarden_core::{AppError, GroupId};
use rolewarden_domain::IdentityId;
use tracing::{debug, warn};

use crate::dto::{
    INTERACTION_APPLICATION_COMMAND, INTERACTION_PING, InteractionRequest, InteractionResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Webhook for slash commands.
///
/// The raw body is verified before it is parsed, since the signature covers
/// the exact bytes sent.
pub async fn interactions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<InteractionResponse>> {
    if let Err(error) = state.interaction_verifier.verify(&headers, &body) {
        warn!(error = %error, "rejected unsigned interaction");
        return Err(error.into());
    }

    let interaction: InteractionRequest = serde_json::from_slice(&body)
        .map_err(|error| AppError::Validation(format!("invalid interaction payload: {error}")))?;

    match interaction.kind {
        INTERACTION_PING => Ok(Json(InteractionResponse::pong())),
        INTERACTION_APPLICATION_COMMAND => Ok(Json(run_command(&state, interaction).await)),
        other => Err(AppError::Validation(format!("unsupported interaction type {other}")).into()),
    }
}

async fn run_command(state: &AppState, interaction: InteractionRequest) -> InteractionResponse {
    let invocation = match command_invocation(state, interaction) {
        Ok(invocation) => invocation,
        Err(error) => {
            debug!(error = %error, "interaction is not a usable command");
            return InteractionResponse::message(
                "This command can only be used in a configured server.",
                true,
            );
        }
    };

    let reply = state.command_registry.dispatch(&invocation).await;
    InteractionResponse::message(reply.content, reply.ephemeral)
}

fn command_invocation(
    state: &AppState,
    interaction: InteractionRequest,
) -> Result<CommandInvocation, AppError> {
    let name = interaction
        .data
        .map(|data| data.name)
        .ok_or_else(|| AppError::Validation("command interaction without data".to_owned()))?;
    let group_id = interaction
        .guild_id
        .map(GroupId::new)
        .transpose()?
        .ok_or_else(|| AppError::Validation("command used outside a server".to_owned()))?;
    let invoker_id = interaction
        .member
        .map(|member| IdentityId::new(member.user.id))
        .transpose()?
        .ok_or_else(|| AppError::Validation("command interaction without member".to_owned()))?;

    if !state.groups.contains(&group_id) {
        return Err(AppError::Validation(format!(
            "group '{group_id}' is not configured"
        )));
    }

    Ok(CommandInvocation {
        name,
        group_id,
        invoker_id,
    })
}

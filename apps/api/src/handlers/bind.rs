use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use rolewarden_application::BindRequest;
use rolewarden_core::{AppError, AppResult};
use tracing::warn;

use crate::dto::{BindRequestDto, BindResultResponse};
use crate::state::AppState;

/// Accepts a bind request from the bind page.
///
/// Every failure collapses into the same `ko` answer; the reason is only
/// logged.
pub async fn bind_handler(
    State(state): State<AppState>,
    payload: Result<Json<BindRequestDto>, JsonRejection>,
) -> (StatusCode, Json<BindResultResponse>) {
    let result = match payload {
        Ok(Json(payload)) => bind(&state, payload).await,
        Err(rejection) => Err(AppError::Validation(format!(
            "invalid bind payload: {rejection}"
        ))),
    };

    match result {
        Ok(()) => (StatusCode::OK, Json(BindResultResponse::OK)),
        Err(error) => {
            warn!(error = %error, "bind request rejected");
            (StatusCode::BAD_REQUEST, Json(BindResultResponse::KO))
        }
    }
}

async fn bind(state: &AppState, payload: BindRequestDto) -> AppResult<()> {
    let group_id = state.resolve_bind_group(payload.group_id.as_deref())?;

    state
        .binding_service
        .bind(BindRequest {
            identity_access_token: payload.identity_access_token,
            claimed_identity_id: payload.claimed_identity_id,
            claimed_wallet_address: payload.claimed_wallet_address,
            signature: payload.signature,
            group_id,
        })
        .await?;

    Ok(())
}

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use rolewarden_core::AppError;
use tower_http::cors::CorsLayer;

/// Lets the bind page, served from its own origin, post bind requests.
pub(super) fn build_cors_layer(frontend_url: &str) -> Result<CorsLayer, AppError> {
    Ok(CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(frontend_url)
                .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

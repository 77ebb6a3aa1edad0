use axum::Router;
use axum::routing::{get, post};
use rolewarden_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

mod cors;

pub fn build_router(app_state: AppState, frontend_url: Option<&str>) -> Result<Router, AppError> {
    let router = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/bind", post(handlers::bind::bind_handler))
        .route(
            "/api/interactions",
            post(handlers::interactions::interactions_handler),
        )
        .with_state(app_state);

    let router = match frontend_url {
        Some(frontend_url) => router.layer(cors::build_cors_layer(frontend_url)?),
        None => router,
    };

    Ok(router.layer(TraceLayer::new_for_http()))
}

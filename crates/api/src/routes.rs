use crate::handlers;
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Access control
        .route(
            "/access_control/grant-access",
            post(handlers::access_control::grant_access),
        )
        .route(
            "/access_control/revoke-access",
            post(handlers::access_control::revoke_access),
        )
        .route(
            "/access_control/access-log",
            get(handlers::access_control::access_log),
        )
        .with_state(state)
}

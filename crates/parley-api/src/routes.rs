use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use crate::auth::{self, AppState};
use crate::messages;
use crate::middleware::require_auth;
use crate::profile;

/// Assemble the full application router. The composition root mounts this
/// once; tests mount it against in-memory state.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/signup", post(auth::signup))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/signin", post(auth::signin))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/profile", get(profile::get_profile))
        .route("/users", get(profile::list_users))
        .route("/messages/{user_id}", get(messages::get_conversation))
        .route("/messages", post(messages::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Parley API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

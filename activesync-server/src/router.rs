use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::activesync::{handle_activesync, handle_autodiscover, ACTIVESYNC_PATH};
use crate::api;
use crate::middleware::{admin_auth_middleware, cors_layer};
use crate::state::AppState;

/// Attachments and mail bodies arrive inline; cap request bodies at 50 MiB.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let protected_api = Router::<AppState>::new()
        .nest("/api", api::router())
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(cors_layer());

    let public_routes = Router::<AppState>::new()
        .route(
            ACTIVESYNC_PATH,
            get(handle_activesync).post(handle_activesync).options(handle_activesync),
        )
        .route("/autodiscover/autodiscover.xml", post(handle_autodiscover))
        .route("/Autodiscover/Autodiscover.xml", post(handle_autodiscover))
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/version", get(version_info));

    protected_api
        .merge(public_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

async fn version_info() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "library_version": activesync_core::LIBRARY_VERSION,
        })),
    )
}

//! Admin API authentication and CORS.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::state::AppState;

/// Origins allowed to call the admin API from a browser.
const ALLOWED_ORIGINS: &[&str] = &["http://localhost:8046", "http://127.0.0.1:8046"];

/// Require the configured admin key as `Authorization: Bearer` or `x-api-key`.
///
/// An empty configured key disables the admin API entirely.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let expected = state.config().admin_api_key.as_str();
    if expected.is_empty() {
        tracing::warn!("Admin API request to {} rejected: no admin_api_key configured", request.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or(Some(s)))
        .or_else(|| request.headers().get("x-api-key").and_then(|h| h.to_str().ok()));

    match presented {
        Some(key) if constant_time_compare(key.trim(), expected) => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Admin API request to {} with missing or invalid key", request.uri().path());
            Err(StatusCode::UNAUTHORIZED)
        },
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(std::time::Duration::from_secs(3600))
}

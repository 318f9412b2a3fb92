//! HTTP glue for the ActiveSync endpoint.

use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{HeaderMap, Method},
    response::Response,
};

use activesync_core::{ActiveSyncRequest, ActiveSyncResponse};

use crate::state::AppState;

pub const ACTIVESYNC_PATH: &str = "/Microsoft-Server-ActiveSync";

pub async fn handle_activesync(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let request = ActiveSyncRequest { method, headers, query, body };
    into_response(state.dispatcher().handle(request).await)
}

/// Autodiscover is posted to its own well-known path without a query string.
pub async fn handle_autodiscover(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ActiveSyncRequest {
        method: Method::POST,
        headers,
        query: Some("Cmd=Autodiscover".to_string()),
        body,
    };
    into_response(state.dispatcher().handle(request).await)
}

/// The global status, if any, is already recorded on the dispatcher's request span.
fn into_response(response: ActiveSyncResponse) -> Response {
    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() = response.status;
    *http.headers_mut() = response.headers;
    http
}

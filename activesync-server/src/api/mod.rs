//! API Routes
//!
//! REST endpoints for administering device state. Mounted under `/api`
//! behind the admin key middleware.

mod devices;


use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use activesync_core::{AppError, StoreError, LIBRARY_VERSION};
use activesync_types::{DeviceError, ProtocolVersion, ProvisioningMode};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        // Devices
        .route("/devices", get(devices::list_devices))
        .route("/devices/reset-policy-keys", post(devices::reset_all_policy_keys))
        .route("/devices/:device_id", delete(devices::remove_device))
        .route("/devices/:device_id/block", post(devices::block_device))
        .route("/devices/:device_id/unblock", post(devices::unblock_device))
        .route("/devices/:device_id/wipe", post(devices::wipe_device))
        .route("/devices/:device_id/reset-policy-key", post(devices::reset_policy_key))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

/// Map core failures onto admin API statuses.
pub(crate) fn api_error(e: AppError) -> (StatusCode, String) {
    let status = match &e {
        AppError::Store(StoreError::NotFound(_)) | AppError::Device(DeviceError::NotFound { .. }) => {
            StatusCode::NOT_FOUND
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub library_version: String,
    pub product_name: String,
    pub max_version: ProtocolVersion,
    pub provisioning: ProvisioningMode,
    pub device_bindings: usize,
    pub started_at: DateTime<Utc>,
}

pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let devices = state.registry().list(None).await.map_err(api_error)?;
    let config = state.config();

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        library_version: LIBRARY_VERSION.to_string(),
        product_name: config.product_name.clone(),
        max_version: config.max_version,
        provisioning: config.provisioning,
        device_bindings: devices.len(),
        started_at: state.inner.started_at,
    }))
}

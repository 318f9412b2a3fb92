use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use activesync_types::Device;

use super::api_error;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceActionResponse {
    pub device_id: String,
    pub action: String,
    /// Number of user bindings touched
    pub affected: usize,
}

impl DeviceActionResponse {
    fn new(device_id: &str, action: &str, affected: usize) -> Self {
        Self {
            device_id: Device::normalize_id(device_id),
            action: action.to_string(),
            affected,
        }
    }
}

pub async fn list_devices(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<Device>>, (StatusCode, String)> {
    let devices = state.registry().list(filter.user.as_deref()).await.map_err(api_error)?;
    Ok(Json(devices))
}

pub async fn block_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceActionResponse>, (StatusCode, String)> {
    state.registry().set_blocked(&device_id, true).await.map_err(api_error)?;
    Ok(Json(DeviceActionResponse::new(&device_id, "block", 1)))
}

pub async fn unblock_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceActionResponse>, (StatusCode, String)> {
    state.registry().set_blocked(&device_id, false).await.map_err(api_error)?;
    Ok(Json(DeviceActionResponse::new(&device_id, "unblock", 1)))
}

pub async fn wipe_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceActionResponse>, (StatusCode, String)> {
    state.registry().request_wipe(&device_id).await.map_err(api_error)?;
    Ok(Json(DeviceActionResponse::new(&device_id, "wipe", 1)))
}

pub async fn reset_policy_key(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<DeviceActionResponse>, (StatusCode, String)> {
    let affected = state
        .registry()
        .reset_policy_key(&device_id, filter.user.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(DeviceActionResponse::new(&device_id, "reset-policy-key", affected)))
}

pub async fn remove_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<DeviceActionResponse>, (StatusCode, String)> {
    state.registry().remove(&device_id, filter.user.as_deref()).await.map_err(api_error)?;
    Ok(Json(DeviceActionResponse::new(&device_id, "remove", 1)))
}

#[derive(Serialize)]
pub struct ResetAllResponse {
    pub affected: usize,
}

pub async fn reset_all_policy_keys(
    State(state): State<AppState>,
) -> Result<Json<ResetAllResponse>, (StatusCode, String)> {
    let affected = state.registry().reset_all_policy_keys().await.map_err(api_error)?;
    Ok(Json(ResetAllResponse { affected }))
}

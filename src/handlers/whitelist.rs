use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::AppError;

/// Body for whitelist mutations
#[derive(Debug, Deserialize)]
pub struct SubnetRequest {
    /// Address or CIDR text, e.g. `"10.0.0.1"` or `"192.168.1.0/24"`
    pub subnet: String,
}

/// Handle `GET /whitelist`: canonical strings in insertion order.
pub async fn list(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.whitelist.list())
}

/// Handle `POST /whitelist/add`: parse, dedup by canonical form, persist,
/// return the updated list. Malformed text is a 400 for the caller.
pub async fn add(
    State(state): State<AppState>,
    Json(req): Json<SubnetRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    info!(subnet = %req.subnet, "Whitelist add requested");
    let updated = state.whitelist.add(&req.subnet)?;
    Ok(Json(updated))
}

/// Handle `POST /whitelist/remove`: exact-match removal (bare addresses
/// widen to their full-width form first), return the updated list.
pub async fn remove(
    State(state): State<AppState>,
    Json(req): Json<SubnetRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    info!(subnet = %req.subnet, "Whitelist remove requested");
    let updated = state.whitelist.remove(&req.subnet)?;
    Ok(Json(updated))
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use leadvault_domains::{ActivityTrigger, Dashboard, DashboardUpdate};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct ActivityRequest {
    message: String,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.ledger.load(auth.user_id).await?))
}

pub async fn update_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(update): Json<DashboardUpdate>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.ledger.update(auth.user_id, update).await?))
}

pub async fn append_activity(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ActivityRequest>,
) -> Result<Json<Dashboard>, ApiError> {
    state
        .ledger
        .append_activity(auth.user_id, &body.message)
        .await?;
    let dashboard = state
        .ledger
        .fetch_or_create(auth.user_id, ActivityTrigger::Access)
        .await?;
    Ok(Json(dashboard))
}

/// Spend points to reveal a contact. Returns the updated dashboard and the
/// full profile.
pub async fn unlock_contact(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dashboard = state
        .ledger
        .unlock_contact(auth.user_id, profile_id, state.config.unlock_cost_points)
        .await?;
    let profile = state.profiles.get(profile_id).await?;
    Ok(Json(json!({
        "dashboard": dashboard,
        "profile": profile,
    })))
}

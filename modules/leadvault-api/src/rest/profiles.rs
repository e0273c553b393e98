use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use leadvault_domains::profiles::{check_duplicate, ProfileQuery};
use leadvault_domains::{NewProfile, Profile, ProfileUpdate};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    mine: bool,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Deserialize)]
pub struct DuplicateRequest {
    url: String,
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let query = ProfileQuery {
        uploaded_by: params.mine.then_some(auth.user_id),
        limit: params.limit.unwrap_or(20).min(100),
        offset: params.offset.unwrap_or(0),
    };
    let unlocked = state.ledger.unlocked_contact_ids(auth.user_id).await?;
    let profiles: Vec<Profile> = state
        .profiles
        .list(query)
        .await?
        .into_iter()
        .map(|p| p.view_for(auth.user_id, &unlocked))
        .collect();
    Ok(Json(json!({
        "profiles": profiles,
        "limit": query.limit,
        "offset": query.offset,
    })))
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let profile = state.profiles.create(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Email, phone and extra links stay hidden until the caller uploads or
/// unlocks the profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.profiles.get(id).await?;
    let unlocked = state.ledger.unlocked_contact_ids(auth.user_id).await?;
    Ok(Json(profile.view_for(auth.user_id, &unlocked)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profiles.update(auth.user_id, id, body).await?))
}

pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.profiles.delete(auth.user_id, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Pre-submit duplicate lookup. Lookup failures report "not a duplicate".
pub async fn check_duplicate_profile(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(body): Json<DuplicateRequest>,
) -> Json<serde_json::Value> {
    match check_duplicate(state.profiles.store(), Some(body.url.trim())).await {
        Some(report) => Json(json!(report)),
        None => Json(json!({ "exists": false })),
    }
}

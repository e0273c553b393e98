use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;

use leadvault_domains::users::{normalize_email, upsert_oauth_user, NewUser, User, PROVIDER_LOCAL};
use leadvault_domains::ActivityTrigger;

use crate::auth::{create_oauth_state, hash_password, verify_oauth_state, verify_password, AuthUser};
use crate::error::ApiError;
use crate::jwt::{clear_jwt_cookie, jwt_cookie, AuthError, TokenKind};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct SignupRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Issue tokens for `user` and attach the access token as a cookie.
async fn signed_in(
    state: &AppState,
    user: User,
    trigger: ActivityTrigger,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let dashboard = state.ledger.fetch_or_create(user.id, trigger).await?;
    let tokens = state.jwt.issue_pair(user.id)?;
    let cookie = jwt_cookie(&tokens.token, state.jwt.access_ttl_secs());
    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "user": user,
            "token": tokens.token,
            "refreshToken": tokens.refresh_token,
            "expiresIn": tokens.expires_in,
            "dashboard": dashboard,
        })),
    )
        .into_response())
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&body.email);
    if !email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".into()));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("An account with this email already exists".into()));
    }

    let name = match body.name.trim() {
        "" => email.split('@').next().unwrap_or_default().to_string(),
        n => n.to_string(),
    };
    let user = state
        .users
        .create(&NewUser {
            email,
            name,
            password_hash: Some(hash_password(&body.password)?),
            auth_provider: PROVIDER_LOCAL.to_string(),
            provider_user_id: None,
            avatar: None,
        })
        .await?;
    tracing::info!(user_id = %user.id, "User signed up");

    signed_in(&state, user, ActivityTrigger::Signup, StatusCode::CREATED).await
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::Validation(
            "This account uses Google sign-in".into(),
        ));
    };
    if !verify_password(&body.password, hash) {
        tracing::info!(user_id = %user.id, "Rejected login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    state.users.touch_login(user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    signed_in(&state, user, ActivityTrigger::Login, StatusCode::OK).await
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or(AuthError::Invalid)?;
    Ok(Json(json!({ "user": user })))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Response, ApiError> {
    let claims = state
        .jwt
        .verify_token(&body.refresh_token, TokenKind::Refresh)?;
    let user_id = claims.user_id()?;
    if state.users.find_by_id(user_id).await?.is_none() {
        return Err(AuthError::Invalid.into());
    }

    let tokens = state.jwt.issue_pair(user_id)?;
    let cookie = jwt_cookie(&tokens.token, state.jwt.access_ttl_secs());
    Ok(([(header::SET_COOKIE, cookie)], Json(tokens)).into_response())
}

pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_jwt_cookie())],
        Json(json!({ "success": true })),
    )
}

pub async fn google_start(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Google sign-in is not configured".into()))?;
    let oauth_state = create_oauth_state(&state.config.jwt_secret);
    Ok(Redirect::to(&google.authorize_url(&oauth_state)?))
}

/// Finish the Google flow and hand tokens to the frontend. Failures send the
/// browser back to the login page instead of returning JSON.
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthCallback>,
) -> Response {
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();
    match complete_google_login(&state, params).await {
        Ok((user, is_new)) => {
            let trigger = if is_new {
                ActivityTrigger::OAuthFirstLogin
            } else {
                ActivityTrigger::Login
            };
            let tokens = match state.ledger.fetch_or_create(user.id, trigger).await {
                Ok(_) => state.jwt.issue_pair(user.id),
                Err(e) => Err(e.into()),
            };
            match tokens {
                Ok(tokens) => {
                    let target = format!(
                        "{frontend}/auth/callback?token={}&refreshToken={}",
                        tokens.token, tokens.refresh_token
                    );
                    let cookie = jwt_cookie(&tokens.token, state.jwt.access_ttl_secs());
                    ([(header::SET_COOKIE, cookie)], Redirect::to(&target)).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, user_id = %user.id, "Failed to finish OAuth login");
                    Redirect::to(&format!("{frontend}/login?error=oauth_failed")).into_response()
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            Redirect::to(&format!("{frontend}/login?error=oauth_failed")).into_response()
        }
    }
}

async fn complete_google_login(
    state: &AppState,
    params: OAuthCallback,
) -> anyhow::Result<(User, bool)> {
    if let Some(error) = params.error {
        anyhow::bail!("provider returned error: {error}");
    }
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Google sign-in is not configured"))?;
    let oauth_state = params.state.unwrap_or_default();
    if !verify_oauth_state(&oauth_state, &state.config.jwt_secret) {
        anyhow::bail!("invalid or expired OAuth state");
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing authorization code"))?;

    let identity = google.identity_for_code(&code).await?;
    let (user, is_new) = upsert_oauth_user(state.users.as_ref(), &identity).await?;
    if !is_new {
        state.users.touch_login(user.id).await?;
    }
    tracing::info!(user_id = %user.id, is_new, "Google sign-in completed");
    Ok((user, is_new))
}

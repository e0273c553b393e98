use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jwt::{parse_auth_cookie, AuthError, TokenKind};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const OAUTH_STATE_TTL_SECS: i64 = 600;

/// Authenticated user. Extract this in handlers that require auth.
/// The access token comes from `Authorization: Bearer` or the auth cookie.
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers).ok_or(AuthError::Missing)?;
        let claims = state.jwt.verify_token(token, TokenKind::Access)?;
        Ok(AuthUser {
            user_id: claims.user_id()?,
        })
    }
}

fn request_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    bearer.or_else(|| {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_auth_cookie)
    })
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {e}"))
}

/// False for a wrong password or an unreadable stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create a signed OAuth `state` value: `nonce.expiry.signature`.
pub fn create_oauth_state(secret: &str) -> String {
    let expiry = chrono::Utc::now().timestamp() + OAUTH_STATE_TTL_SECS;
    let payload = format!("{}.{expiry}", Uuid::new_v4().simple());
    let sig = sign(&payload, secret);
    format!("{payload}.{sig}")
}

/// Verify a state value produced by [`create_oauth_state`].
pub fn verify_oauth_state(value: &str, secret: &str) -> bool {
    let Some((payload, sig)) = value.rsplit_once('.') else {
        return false;
    };
    if !constant_time_eq(sig.as_bytes(), sign(payload, secret).as_bytes()) {
        return false;
    }
    payload
        .split_once('.')
        .and_then(|(_, expiry)| expiry.parse::<i64>().ok())
        .is_some_and(|expiry| chrono::Utc::now().timestamp() <= expiry)
}

fn sign(payload: &str, secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn oauth_state_roundtrip() {
        let state = create_oauth_state("secret");
        assert!(verify_oauth_state(&state, "secret"));
        assert!(!verify_oauth_state(&state, "other-secret"));
    }

    #[test]
    fn tampered_oauth_state_is_rejected() {
        let state = create_oauth_state("secret");
        let (payload, sig) = state.rsplit_once('.').unwrap();
        let (nonce, _) = payload.split_once('.').unwrap();
        let forged = format!("{nonce}.{}.{sig}", i64::MAX);
        assert!(!verify_oauth_state(&forged, "secret"));
        assert!(!verify_oauth_state("garbage", "secret"));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=from-cookie"));
        assert_eq!(request_token(&headers), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(request_token(&headers), Some("from-header"));
    }
}

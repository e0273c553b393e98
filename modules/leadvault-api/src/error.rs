use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use leadvault_common::LeadVaultError;
use leadvault_domains::scraping::ScrapeError;

use crate::jwt::AuthError;

/// Error returned by every JSON handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Not enough points: {available} available, {required} required")]
    InsufficientPoints { available: i32, required: i32 },
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Auth(AuthError::Missing) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Auth(AuthError::Expired) => (StatusCode::UNAUTHORIZED, "token_expired"),
            ApiError::Auth(AuthError::Invalid) => (StatusCode::UNAUTHORIZED, "token_invalid"),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::InsufficientPoints { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_points")
            }
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                json!({"error": "Internal server error", "code": code})
            }
            ApiError::InsufficientPoints {
                available,
                required,
            } => json!({
                "error": self.to_string(),
                "code": code,
                "available": available,
                "required": required,
            }),
            _ => json!({"error": self.to_string(), "code": code}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LeadVaultError> for ApiError {
    fn from(err: LeadVaultError) -> Self {
        match err {
            LeadVaultError::Validation(msg) => ApiError::Validation(msg),
            LeadVaultError::NotFound(what) => ApiError::NotFound(format!("Not found: {what}")),
            LeadVaultError::Conflict(msg) => ApiError::Conflict(msg),
            LeadVaultError::Forbidden(msg) => ApiError::Forbidden(msg),
            LeadVaultError::InsufficientPoints {
                available,
                required,
            } => ApiError::InsufficientPoints {
                available,
                required,
            },
            LeadVaultError::Upstream(msg) => ApiError::Upstream(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Validation(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_distinguished_by_code() {
        assert_eq!(
            ApiError::Auth(AuthError::Expired).status_and_code(),
            (StatusCode::UNAUTHORIZED, "token_expired")
        );
        assert_eq!(
            ApiError::Auth(AuthError::Invalid).status_and_code(),
            (StatusCode::UNAUTHORIZED, "token_invalid")
        );
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (LeadVaultError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (LeadVaultError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LeadVaultError::Conflict("x".into()), StatusCode::CONFLICT),
            (LeadVaultError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                LeadVaultError::InsufficientPoints {
                    available: 1,
                    required: 10,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (LeadVaultError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (
                LeadVaultError::Database("secret detail".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_and_code().0, status);
        }
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let resp = ApiError::Internal("password=hunter2".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "internal_error");
    }
}

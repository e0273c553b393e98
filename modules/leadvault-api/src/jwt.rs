use anyhow::Result;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadvault_common::AppConfig;

const COOKIE_NAME: &str = "auth_token";
const ISSUER: &str = "leadvault";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub typ: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::Invalid)
    }
}

/// Why a request was not authenticated. Clients refresh on `Expired` and
/// sign in again on `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// Access and refresh tokens pair returned on sign-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// JWT service for creating and verifying tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: ISSUER.to_string(),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn create_token(&self, user_id: Uuid, kind: TokenKind) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(ttl);

        let claims = Claims {
            sub: user_id.to_string(),
            typ: kind,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        Ok(TokenPair {
            token: self.create_token(user_id, TokenKind::Access)?,
            refresh_token: self.create_token(user_id, TokenKind::Refresh)?,
            expires_in: self.access_ttl_secs,
        })
    }

    /// Verify signature, issuer, expiry and token kind.
    pub fn verify_token(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })?;
        if claims.typ != expected {
            return Err(AuthError::Invalid);
        }
        Ok(claims)
    }
}

/// Build a Set-Cookie header that sets the JWT token.
pub fn jwt_cookie(token: &str, max_age_secs: i64) -> String {
    let secure = if cfg!(debug_assertions) {
        ""
    } else {
        "; Secure"
    };
    format!("{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}{secure}")
}

/// Build a Set-Cookie header that clears the JWT cookie.
pub fn clear_jwt_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Parse the auth_token cookie value from a Cookie header string.
pub fn parse_auth_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(COOKIE_NAME)?.strip_prefix('='))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> JwtService {
        JwtService::new("test-secret-key", 3600, 7200)
    }

    #[test]
    fn roundtrip_access_token() {
        let svc = test_service();
        let user = Uuid::new_v4();
        let token = svc.create_token(user, TokenKind::Access).unwrap();
        let claims = svc.verify_token(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.iss, "leadvault");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn refresh_token_lives_longer_and_is_not_an_access_token() {
        let svc = test_service();
        let pair = svc.issue_pair(Uuid::new_v4()).unwrap();
        let claims = svc
            .verify_token(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 7200);
        assert_eq!(
            svc.verify_token(&pair.refresh_token, TokenKind::Access)
                .unwrap_err(),
            AuthError::Invalid
        );
    }

    #[test]
    fn expired_and_invalid_are_distinguished() {
        let expired = JwtService::new("test-secret-key", -3600, -3600);
        let token = expired.create_token(Uuid::new_v4(), TokenKind::Access).unwrap();
        assert_eq!(
            test_service().verify_token(&token, TokenKind::Access).unwrap_err(),
            AuthError::Expired
        );
        assert_eq!(
            test_service().verify_token("garbage", TokenKind::Access).unwrap_err(),
            AuthError::Invalid
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let other = JwtService::new("secret-b", 3600, 3600);
        let token = other.create_token(Uuid::new_v4(), TokenKind::Access).unwrap();
        assert_eq!(
            test_service().verify_token(&token, TokenKind::Access).unwrap_err(),
            AuthError::Invalid
        );
    }

    #[test]
    fn parse_cookie() {
        assert_eq!(
            parse_auth_cookie("auth_token=abc123; other=xyz"),
            Some("abc123")
        );
        assert_eq!(
            parse_auth_cookie("other=xyz; auth_token=abc123"),
            Some("abc123")
        );
        assert_eq!(parse_auth_cookie("auth_token="), None);
        assert_eq!(parse_auth_cookie("other=xyz"), None);
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        assert!(clear_jwt_cookie().contains("Max-Age=0"));
        assert!(jwt_cookie("t", 60).starts_with("auth_token=t;"));
    }
}

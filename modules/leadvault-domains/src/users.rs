use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use leadvault_common::Result;

use crate::db::map_db_err;

pub const PROVIDER_LOCAL: &str = "local";
pub const PROVIDER_GOOGLE: &str = "google";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub auth_provider: String,
    #[serde(skip_serializing)]
    pub provider_user_id: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub auth_provider: String,
    pub provider_user_id: Option<String>,
    pub avatar: Option<String>,
}

/// Identity returned by an OAuth provider after the code exchange.
#[derive(Debug, Clone)]
pub struct OAuthIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_provider(&self, provider: &str, provider_user_id: &str)
        -> Result<Option<User>>;
    async fn create(&self, user: &NewUser) -> Result<User>;
    /// Attach an OAuth identity to an existing (email-matched) account.
    async fn link_provider(&self, id: Uuid, identity: &OAuthIdentity) -> Result<User>;
    async fn touch_login(&self, id: Uuid) -> Result<()>;
}

/// Emails are compared case-insensitively; store them lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Find the account behind an OAuth identity, linking by email or creating it
/// when needed. The boolean is true when the account was created just now.
pub async fn upsert_oauth_user(store: &dyn UserStore, identity: &OAuthIdentity) -> Result<(User, bool)> {
    if let Some(user) = store
        .find_by_provider(&identity.provider, &identity.provider_user_id)
        .await?
    {
        return Ok((user, false));
    }

    let email = normalize_email(&identity.email);
    if let Some(existing) = store.find_by_email(&email).await? {
        tracing::info!(user_id = %existing.id, provider = %identity.provider, "Linking OAuth identity to existing account");
        let user = store.link_provider(existing.id, identity).await?;
        return Ok((user, false));
    }

    let user = store
        .create(&NewUser {
            email,
            name: identity.name.clone(),
            password_hash: None,
            auth_provider: identity.provider.clone(),
            provider_user_id: Some(identity.provider_user_id.clone()),
            avatar: identity.avatar.clone(),
        })
        .await?;
    tracing::info!(user_id = %user.id, provider = %identity.provider, "Created OAuth account");
    Ok((user, true))
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE auth_provider = $1 AND provider_user_id = $2",
        )
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash, auth_provider, provider_user_id, avatar, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(normalize_email(&user.email))
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.auth_provider)
        .bind(&user.provider_user_id)
        .bind(&user.avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn link_provider(&self, id: Uuid, identity: &OAuthIdentity) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET auth_provider = $2,
                provider_user_id = $3,
                avatar = COALESCE(avatar, $4)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&identity.provider)
        .bind(&identity.provider_user_id)
        .bind(&identity.avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn touch_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}

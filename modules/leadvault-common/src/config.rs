use anyhow::{Context, Result};

const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600; // 7 days
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600; // 30 days
const DEFAULT_UNLOCK_COST: i32 = 10;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
    pub allowed_origins: Vec<String>,
    pub frontend_url: String,
    /// Base URL the scrape orchestrator uses to call back into `POST /api/profiles`.
    /// When unset, profiles are written directly through the profile service.
    pub internal_api_url: Option<String>,

    // Auth
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: Option<String>,

    // Scraping
    pub apify_api_token: String,
    pub apify_linkedin_actor: Option<String>,

    // Ledger
    pub unlock_cost_points: i32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required_env("DATABASE_URL")?,
            web_host: std::env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: std::env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("WEB_PORT must be a number")?,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            internal_api_url: optional_env("INTERNAL_API_URL"),
            jwt_secret: required_env("JWT_SECRET")?,
            access_token_ttl_secs: parse_env("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS)?,
            refresh_token_ttl_secs: parse_env(
                "REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            )?,
            google_client_id: optional_env("GOOGLE_CLIENT_ID"),
            google_client_secret: optional_env("GOOGLE_CLIENT_SECRET"),
            google_redirect_url: optional_env("GOOGLE_REDIRECT_URL"),
            apify_api_token: required_env("APIFY_API_TOKEN")?,
            apify_linkedin_actor: optional_env("APIFY_LINKEDIN_ACTOR"),
            unlock_cost_points: parse_env("UNLOCK_COST_POINTS", DEFAULT_UNLOCK_COST)?,
        };

        config.log_keys();
        Ok(config)
    }

    /// Google OAuth is enabled only when all three settings are present.
    pub fn google_oauth(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.google_client_id.as_deref()?,
            self.google_client_secret.as_deref()?,
            self.google_redirect_url.as_deref()?,
        ))
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  JWT_SECRET: {}", preview(&self.jwt_secret));
        tracing::info!("  APIFY_API_TOKEN: {}", preview(&self.apify_api_token));
        tracing::info!("  GOOGLE_CLIENT_ID: {}", preview_opt(&self.google_client_id));
        tracing::info!("  INTERNAL_API_URL: {}", preview_opt(&self.internal_api_url));
        tracing::info!("  UNLOCK_COST_POINTS: {}", self.unlock_cost_points);
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

/// First few characters of a secret, for startup logs.
fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

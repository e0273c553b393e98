use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use leadvault_common::{LeadVaultError, Result};
use leadvault_domains::scraping::{ProfileSink, SavedProfile};
use leadvault_domains::{NewProfile, Profile};

use crate::jwt::{JwtService, TokenKind};

/// Persists scraped profiles by calling back into `POST /api/profiles`, so
/// they pass through the same validation and duplicate check as manual
/// uploads. Requests carry an access token minted for the batch owner.
pub struct HttpProfileSink {
    client: reqwest::Client,
    endpoint: String,
    jwt: JwtService,
}

impl HttpProfileSink {
    pub fn new(base_url: &str, jwt: JwtService) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/profiles", base_url.trim_end_matches('/')),
            jwt,
        }
    }
}

#[async_trait]
impl ProfileSink for HttpProfileSink {
    async fn persist(&self, user_id: Uuid, profile: NewProfile) -> Result<SavedProfile> {
        let token = self.jwt.create_token(user_id, TokenKind::Access)?;
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&profile)
            .send()
            .await
            .map_err(|e| LeadVaultError::Upstream(format!("profile endpoint unreachable: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            let saved: Profile = resp
                .json()
                .await
                .map_err(|e| LeadVaultError::Upstream(format!("unreadable profile response: {e}")))?;
            return Ok(SavedProfile::from(&saved));
        }

        let message = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        Err(match status {
            StatusCode::CONFLICT => LeadVaultError::Conflict(message),
            StatusCode::BAD_REQUEST => LeadVaultError::Validation(message),
            _ => LeadVaultError::Upstream(format!("profile endpoint returned {status}: {message}")),
        })
    }
}

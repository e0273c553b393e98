use anyhow::{bail, Context, Result};
use serde::Deserialize;

use leadvault_domains::users::{OAuthIdentity, PROVIDER_GOOGLE};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google authorization-code flow.
pub struct GoogleOAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleOAuth {
    pub fn new(client_id: &str, client_secret: &str, redirect_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_url: redirect_url.to_string(),
        }
    }

    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )?;
        Ok(url.into())
    }

    /// Exchange an authorization code and resolve the signed-in identity.
    pub async fn identity_for_code(&self, code: &str) -> Result<OAuthIdentity> {
        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Google token request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Google token exchange returned {status}: {body}");
        }
        let token: TokenResponse = resp.json().await?;

        let info: GoogleUserInfo = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("Google userinfo request failed")?
            .error_for_status()?
            .json()
            .await?;

        into_identity(info)
    }
}

fn into_identity(info: GoogleUserInfo) -> Result<OAuthIdentity> {
    let Some(email) = info.email.filter(|e| !e.trim().is_empty()) else {
        bail!("Google account has no email address");
    };
    if info.email_verified == Some(false) {
        bail!("Google email address is not verified");
    }
    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    Ok(OAuthIdentity {
        provider: PROVIDER_GOOGLE.to_string(),
        provider_user_id: info.sub,
        email,
        name,
        avatar: info.picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_state_and_redirect() {
        let google = GoogleOAuth::new("cid", "secret", "http://localhost:3000/cb");
        let url = google.authorize_url("abc.123.sig").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=abc.123.sig"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcb"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn identity_requires_verified_email() {
        let info = GoogleUserInfo {
            sub: "1".into(),
            email: Some("a@b.co".into()),
            email_verified: Some(false),
            name: None,
            picture: None,
        };
        assert!(into_identity(info).is_err());

        let info = GoogleUserInfo {
            sub: "1".into(),
            email: Some("ada@b.co".into()),
            email_verified: Some(true),
            name: None,
            picture: None,
        };
        let identity = into_identity(info).unwrap();
        assert_eq!(identity.name, "ada");
        assert_eq!(identity.provider, "google");
    }
}

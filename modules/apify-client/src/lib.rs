pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    Education, EmployeeCountRange, LinkedInProfile, LinkedInScraperInput, NamedEntry, Position,
    PositionCompany, RunData, RunStatus, TimePeriod, YearMonth,
};

use serde::de::DeserializeOwned;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor used for LinkedIn profile scraping when none is configured.
pub const LINKEDIN_PROFILE_SCRAPER: &str = "dev_fusion~linkedin-profile-scraper";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    actor_id: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            actor_id: LINKEDIN_PROFILE_SCRAPER.to_string(),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Start a LinkedIn profile scrape run. Returns immediately with run metadata.
    pub async fn start_linkedin_scrape(&self, profile_urls: Vec<String>) -> Result<RunData> {
        let input = LinkedInScraperInput::new(profile_urls);

        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        tracing::info!(
            run_id = %api_resp.data.id,
            urls = input.profile_urls.len(),
            "Apify LinkedIn run started"
        );
        Ok(api_resp.data)
    }

    /// Fetch the current state of a run without waiting.
    pub async fn get_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let api_resp: ApiResponse<RunData> = resp.json().await?;
        tracing::debug!(run_id, status = %api_resp.data.status, "Apify run status");
        Ok(api_resp.data)
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let items: Vec<T> = resp.json().await?;
        tracing::info!(dataset_id, count = items.len(), "Fetched dataset items");
        Ok(items)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApifyError::Api {
        status: status.as_u16(),
        message: body,
    })
}

use apify_client::{ApifyClient, RunStatus};
use async_trait::async_trait;

/// Handle for a submitted scrape run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeJob {
    pub run_id: String,
    pub dataset_id: String,
}

/// Third-party scraping service boundary.
#[async_trait]
pub trait ProfileScraper: Send + Sync {
    /// Start a run for `urls`. Only URLs are sent upstream.
    async fn submit(&self, urls: Vec<String>) -> anyhow::Result<ScrapeJob>;
    async fn poll(&self, run_id: &str) -> anyhow::Result<RunStatus>;
    /// Raw result items; parsing happens per item so one bad payload only
    /// fails its own entry.
    async fn fetch(&self, dataset_id: &str) -> anyhow::Result<Vec<serde_json::Value>>;
}

#[async_trait]
impl ProfileScraper for ApifyClient {
    async fn submit(&self, urls: Vec<String>) -> anyhow::Result<ScrapeJob> {
        let run = self.start_linkedin_scrape(urls).await?;
        Ok(ScrapeJob {
            run_id: run.id,
            dataset_id: run.default_dataset_id,
        })
    }

    async fn poll(&self, run_id: &str) -> anyhow::Result<RunStatus> {
        Ok(self.get_run(run_id).await?.run_status())
    }

    async fn fetch(&self, dataset_id: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(self.get_dataset_items(dataset_id).await?)
    }
}

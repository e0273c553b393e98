//! Batch LinkedIn import: submit URLs to the scraper, wait for the run,
//! then normalize and persist every result independently.

mod scraper;
mod sink;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use apify_client::{LinkedInProfile, RunStatus};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use leadvault_common::{is_profile_url, profile_url_key, ContactOverrides, REWARD_PER_PROFILE};

use crate::dashboards::{CreditOutcome, Ledger};
use crate::normalize::{normalize_profile, NormalizeError};

pub use scraper::{ProfileScraper, ScrapeJob};
pub use sink::{ProfileSink, SavedProfile, StoreProfileSink};

/// Inbound batch request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeRequest {
    pub profiles: Vec<ContactOverrides>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeState {
    Validating,
    Submitting,
    Polling,
    Fetching,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{0}")]
    Validation(String),
}

/// Outcome for one submitted URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SavedProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    fn saved(url: &str, profile: SavedProfile) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            profile: Some(profile),
            error: None,
        }
    }

    fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            profile: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub state: ScrapeState,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub reward_points: i32,
    pub reward_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_error: Option<String>,
    pub results: Vec<ItemResult>,
}

pub struct ScrapeOrchestrator {
    scraper: Arc<dyn ProfileScraper>,
    sink: Arc<dyn ProfileSink>,
    ledger: Ledger,
    policy: PollPolicy,
}

impl ScrapeOrchestrator {
    pub fn new(scraper: Arc<dyn ProfileScraper>, sink: Arc<dyn ProfileSink>, ledger: Ledger) -> Self {
        Self {
            scraper,
            sink,
            ledger,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one batch to completion.
    ///
    /// Only validation errors are returned as `Err`. Once a run has been
    /// submitted every outcome, including a failed upstream stage, is
    /// reported through the summary.
    pub async fn run(&self, request: ScrapeRequest) -> Result<BatchSummary, ScrapeError> {
        let batch_id = Uuid::new_v4();
        tracing::info!(batch_id = %batch_id, state = ?ScrapeState::Validating, submitted = request.profiles.len(), "Scrape batch received");

        let user_id = request
            .user_id
            .ok_or_else(|| ScrapeError::Validation("userId is required".to_string()))?;
        let inputs: Vec<ContactOverrides> = request
            .profiles
            .into_iter()
            .map(|mut p| {
                p.url = p.url.trim().to_string();
                p
            })
            .filter(|p| is_profile_url(&p.url))
            .collect();
        if inputs.is_empty() {
            return Err(ScrapeError::Validation(
                "at least one LinkedIn profile URL is required".to_string(),
            ));
        }

        let urls: Vec<String> = inputs.iter().map(|p| p.url.clone()).collect();
        let items = match self.scrape(batch_id, urls).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(batch_id = %batch_id, state = ?ScrapeState::Failed, error = %e, "Scrape stage failed");
                let reason = format!("Scraping service failed: {e}");
                let results = inputs
                    .iter()
                    .map(|p| ItemResult::failed(&p.url, reason.clone()))
                    .collect();
                return Ok(BatchSummary {
                    batch_id,
                    state: ScrapeState::Failed,
                    total: inputs.len(),
                    processed: 0,
                    successful: 0,
                    failed: inputs.len(),
                    reward_points: 0,
                    reward_applied: false,
                    stage_error: Some(e.to_string()),
                    results,
                });
            }
        };

        tracing::info!(batch_id = %batch_id, state = ?ScrapeState::Processing, items = items.len(), "Processing scrape results");
        let aligned = correlate(&inputs, items);
        let current_year = chrono::Utc::now().year();

        let mut results = Vec::with_capacity(inputs.len());
        for (input, item) in inputs.iter().zip(aligned) {
            let result = self.process_item(user_id, input, item, current_year).await;
            if let Some(error) = &result.error {
                tracing::warn!(batch_id = %batch_id, url = %input.url, error = %error, "Scrape item failed");
            }
            results.push(result);
        }

        let successful = results.iter().filter(|r| r.success).count();
        let reward_points = i32::try_from(successful)
            .unwrap_or(i32::MAX)
            .saturating_mul(REWARD_PER_PROFILE);
        let reward_applied = self
            .apply_reward(batch_id, user_id, successful, reward_points)
            .await;

        tracing::info!(
            batch_id = %batch_id,
            state = ?ScrapeState::Done,
            total = inputs.len(),
            successful,
            reward_points,
            "Scrape batch finished"
        );

        Ok(BatchSummary {
            batch_id,
            state: ScrapeState::Done,
            total: inputs.len(),
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            reward_points,
            reward_applied,
            stage_error: None,
            results,
        })
    }

    /// Submit, poll and fetch. Any error here is fatal for the batch.
    async fn scrape(&self, batch_id: Uuid, urls: Vec<String>) -> anyhow::Result<Vec<Value>> {
        tracing::info!(batch_id = %batch_id, state = ?ScrapeState::Submitting, urls = urls.len(), "Submitting scrape run");
        let job = self.scraper.submit(urls).await?;

        tracing::info!(batch_id = %batch_id, state = ?ScrapeState::Polling, run_id = %job.run_id, "Waiting for scrape run");
        let mut finished = false;
        for attempt in 1..=self.policy.max_attempts {
            let status = self.scraper.poll(&job.run_id).await?;
            tracing::debug!(batch_id = %batch_id, attempt, status = ?status, "Polled scrape run");
            match status {
                RunStatus::Succeeded => {
                    finished = true;
                    break;
                }
                s if s.is_terminal() => bail!("run {} ended with status {:?}", job.run_id, s),
                _ if attempt < self.policy.max_attempts => {
                    tokio::time::sleep(self.policy.interval).await
                }
                _ => {}
            }
        }
        if !finished {
            return Err(anyhow!(
                "run {} did not finish after {} status checks",
                job.run_id,
                self.policy.max_attempts
            ));
        }

        tracing::info!(batch_id = %batch_id, state = ?ScrapeState::Fetching, dataset_id = %job.dataset_id, "Fetching scrape results");
        self.scraper.fetch(&job.dataset_id).await
    }

    async fn process_item(
        &self,
        user_id: Uuid,
        input: &ContactOverrides,
        item: Option<Value>,
        current_year: i32,
    ) -> ItemResult {
        let Some(item) = item else {
            return ItemResult::failed(&input.url, "No data returned for this profile");
        };
        let raw: LinkedInProfile = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(e) => return ItemResult::failed(&input.url, format!("Invalid profile payload: {e}")),
        };
        let normalized = match normalize_profile(&raw, user_id, input, current_year) {
            Ok(n) => n,
            Err(NormalizeError::InsufficientData) => {
                return ItemResult::failed(&input.url, "Insufficient profile data")
            }
        };
        match self
            .sink
            .persist(normalized.uploaded_by, normalized.profile)
            .await
        {
            Ok(saved) => ItemResult::saved(&input.url, saved),
            Err(e) => ItemResult::failed(&input.url, e.to_string()),
        }
    }

    async fn apply_reward(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
        successful: usize,
        points: i32,
    ) -> bool {
        if points <= 0 {
            return false;
        }
        let reason = format!("Imported {successful} LinkedIn profiles");
        match self
            .ledger
            .credit(user_id, points, &reason, &format!("scrape:{batch_id}"))
            .await
        {
            Ok(CreditOutcome::Applied) | Ok(CreditOutcome::AlreadyApplied) => true,
            Err(e) => {
                tracing::error!(batch_id = %batch_id, user_id = %user_id, error = %e, "Failed to credit scrape reward");
                false
            }
        }
    }
}

fn echoed_url(item: &Value) -> Option<&str> {
    ["inputUrl", "url"]
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Line results up with inputs by the profile URL each result echoes.
/// Results that echo nothing usable fall back to their position.
fn correlate(inputs: &[ContactOverrides], items: Vec<Value>) -> Vec<Option<Value>> {
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, input) in inputs.iter().enumerate() {
        if let Some(key) = profile_url_key(&input.url) {
            by_key.entry(key).or_default().push(idx);
        }
    }

    let mut aligned: Vec<Option<Value>> = vec![None; inputs.len()];
    let mut unechoed = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        let Some(key) = echoed_url(&item).and_then(profile_url_key) else {
            unechoed.push((position, item));
            continue;
        };
        let slot = by_key
            .get(&key)
            .and_then(|candidates| candidates.iter().copied().find(|&i| aligned[i].is_none()));
        match slot {
            Some(i) => aligned[i] = Some(item),
            None => tracing::warn!(key, "Dropping scrape result that matches no submitted URL"),
        }
    }

    for (position, item) in unechoed {
        match aligned.get_mut(position) {
            Some(slot) if slot.is_none() => *slot = Some(item),
            _ => tracing::warn!(position, "Dropping scrape result without a URL"),
        }
    }
    aligned
}

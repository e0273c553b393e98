//! In-memory trait implementations for tests. Enabled by `cfg(test)` or the
//! `test-support` feature.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use apify_client::RunStatus;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use leadvault_common::{LeadVaultError, Result};

use crate::dashboards::{trim_activity, Credit, Dashboard, DashboardStore, UnlockOutcome};
use crate::profiles::{NewProfile, Profile, ProfileQuery, ProfileStore};
use crate::scraping::{ProfileScraper, ProfileSink, SavedProfile, ScrapeJob};
use crate::users::{normalize_email, NewUser, OAuthIdentity, User, UserStore};

// --- Profiles ---

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<Vec<Profile>>,
    fail_lookups: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make slug lookups and uploader counts return a database error.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Profile> {
        self.profiles.lock().unwrap().clone()
    }

    fn check_lookups(&self) -> Result<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(LeadVaultError::Database("lookup unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_linkedin_id(&self, linkedin_id: &str) -> Result<Option<Profile>> {
        self.check_lookups()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.linkedin_id.as_deref() == Some(linkedin_id))
            .cloned())
    }

    async fn insert(
        &self,
        uploaded_by: Uuid,
        linkedin_id: Option<&str>,
        profile: &NewProfile,
    ) -> Result<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        let linkedin_id = linkedin_id.filter(|id| !id.is_empty());
        if let Some(id) = linkedin_id {
            if profiles.iter().any(|p| p.linkedin_id.as_deref() == Some(id)) {
                return Err(LeadVaultError::Conflict(format!("linkedin id {id} already exists")));
            }
        }
        let now = Utc::now();
        let stored = Profile {
            id: Uuid::new_v4(),
            linkedin_id: linkedin_id.map(str::to_string),
            name: profile.name.clone(),
            job_title: profile.job_title.clone(),
            company: profile.company.clone(),
            location: profile.location.clone(),
            industry: profile.industry.clone(),
            seniority_level: profile.seniority_level.to_string(),
            experience: profile.experience,
            skills: profile.skills.clone(),
            education: profile.education.clone(),
            work_experience: profile.work_experience.clone(),
            company_size: profile.company_size.clone(),
            avatar: profile.avatar.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            linkedin_url: profile.linkedin_url.clone(),
            extra_links: profile.extra_links.clone(),
            uploaded_by,
            created_at: now,
            updated_at: now,
        };
        profiles.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, profile: &Profile) -> Result<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(id) = profile.linkedin_id.as_deref() {
            if profiles
                .iter()
                .any(|p| p.id != profile.id && p.linkedin_id.as_deref() == Some(id))
            {
                return Err(LeadVaultError::Conflict(format!("linkedin id {id} already exists")));
            }
        }
        let slot = profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| LeadVaultError::NotFound(format!("profile {}", profile.id)))?;
        *slot = Profile {
            updated_at: Utc::now(),
            ..profile.clone()
        };
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut profiles = self.profiles.lock().unwrap();
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        Ok(profiles.len() < before)
    }

    async fn list(&self, query: ProfileQuery) -> Result<Vec<Profile>> {
        let mut matching: Vec<Profile> = self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.uploaded_by.map_or(true, |u| p.uploaded_by == u))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit.min(100) as usize)
            .collect())
    }

    async fn count_by_uploader(&self, user_id: Uuid) -> Result<i64> {
        self.check_lookups()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.uploaded_by == user_id)
            .count() as i64)
    }
}

// --- Dashboards ---

/// Mirrors the atomic semantics of the Postgres store under one lock.
#[derive(Default)]
pub struct InMemoryDashboardStore {
    dashboards: Mutex<HashMap<Uuid, Dashboard>>,
    credit_keys: Mutex<HashSet<String>>,
}

impl InMemoryDashboardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DashboardStore for InMemoryDashboardStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Dashboard>> {
        Ok(self.dashboards.lock().unwrap().get(&user_id).cloned())
    }

    async fn create(&self, dashboard: &Dashboard) -> Result<Dashboard> {
        Ok(self
            .dashboards
            .lock()
            .unwrap()
            .entry(dashboard.user_id)
            .or_insert_with(|| dashboard.clone())
            .clone())
    }

    async fn save(&self, dashboard: &Dashboard) -> Result<Dashboard> {
        let mut dashboards = self.dashboards.lock().unwrap();
        let slot = dashboards
            .get_mut(&dashboard.user_id)
            .ok_or_else(|| LeadVaultError::NotFound(format!("dashboard for user {}", dashboard.user_id)))?;
        *slot = dashboard.clone();
        Ok(slot.clone())
    }

    async fn append_activity(&self, user_id: Uuid, message: &str) -> Result<()> {
        if let Some(d) = self.dashboards.lock().unwrap().get_mut(&user_id) {
            d.recent_activity.push(message.to_string());
            trim_activity(&mut d.recent_activity);
            d.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool> {
        let mut dashboards = self.dashboards.lock().unwrap();
        let Some(d) = dashboards.get_mut(&user_id) else {
            return Ok(false);
        };
        if d.uploaded_profile_ids.contains(&profile_id) {
            return Ok(false);
        }
        d.uploaded_profile_ids.push(profile_id);
        d.my_uploads += 1;
        d.total_contacts += 1;
        d.updated_at = Utc::now();
        Ok(true)
    }

    async fn remove_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool> {
        let mut dashboards = self.dashboards.lock().unwrap();
        let Some(d) = dashboards.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = d.uploaded_profile_ids.len();
        d.uploaded_profile_ids.retain(|id| *id != profile_id);
        if d.uploaded_profile_ids.len() == before {
            return Ok(false);
        }
        d.my_uploads = (d.my_uploads - 1).max(0);
        d.total_contacts = (d.total_contacts - 1).max(0);
        d.updated_at = Utc::now();
        Ok(true)
    }

    async fn unlock(&self, user_id: Uuid, profile_id: Uuid, cost: i32) -> Result<UnlockOutcome> {
        let mut dashboards = self.dashboards.lock().unwrap();
        let d = dashboards
            .get_mut(&user_id)
            .ok_or_else(|| LeadVaultError::NotFound(format!("dashboard for user {user_id}")))?;
        if d.unlocked_contact_ids.contains(&profile_id) {
            return Ok(UnlockOutcome::AlreadyUnlocked(d.clone()));
        }
        if d.available_points < cost {
            return Ok(UnlockOutcome::InsufficientPoints {
                available: d.available_points,
            });
        }
        d.available_points -= cost;
        d.unlocked_contact_ids.push(profile_id);
        d.unlocked_profiles += 1;
        d.updated_at = Utc::now();
        Ok(UnlockOutcome::Unlocked(d.clone()))
    }

    async fn apply_credit(&self, credit: &Credit) -> Result<bool> {
        let mut dashboards = self.dashboards.lock().unwrap();
        let Some(d) = dashboards.get_mut(&credit.user_id) else {
            return Ok(false);
        };
        if !self
            .credit_keys
            .lock()
            .unwrap()
            .insert(credit.idempotency_key.clone())
        {
            return Ok(false);
        }
        d.available_points += credit.amount;
        d.updated_at = Utc::now();
        Ok(true)
    }
}

// --- Users ---

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.auth_provider == provider
                    && u.provider_user_id.as_deref() == Some(provider_user_id)
            })
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        let email = normalize_email(&user.email);
        if users.iter().any(|u| u.email == email) {
            return Err(LeadVaultError::Conflict(format!("email {email} already registered")));
        }
        let created = User {
            id: Uuid::new_v4(),
            email,
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            auth_provider: user.auth_provider.clone(),
            provider_user_id: user.provider_user_id.clone(),
            avatar: user.avatar.clone(),
            created_at: Utc::now(),
            last_login_at: Some(Utc::now()),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn link_provider(&self, id: Uuid, identity: &OAuthIdentity) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| LeadVaultError::NotFound(format!("user {id}")))?;
        user.auth_provider = identity.provider.clone();
        user.provider_user_id = Some(identity.provider_user_id.clone());
        if user.avatar.is_none() {
            user.avatar = identity.avatar.clone();
        }
        Ok(user.clone())
    }

    async fn touch_login(&self, id: Uuid) -> Result<()> {
        if let Some(user) = self.users.lock().unwrap().iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

// --- Scraping ---

/// Scripted scraper. Statuses are consumed in order; the last one repeats.
pub struct MockScraper {
    submit_error: Option<String>,
    statuses: Mutex<VecDeque<RunStatus>>,
    items: Vec<Value>,
    submitted: Mutex<Vec<Vec<String>>>,
    polls: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockScraper {
    /// Succeeds on the first poll and returns `items`.
    pub fn succeeding(items: Vec<Value>) -> Self {
        Self {
            submit_error: None,
            statuses: Mutex::new(VecDeque::from([RunStatus::Succeeded])),
            items,
            submitted: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing_submit(message: &str) -> Self {
        Self {
            submit_error: Some(message.to_string()),
            ..Self::succeeding(Vec::new())
        }
    }

    pub fn with_statuses(self, statuses: Vec<RunStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileScraper for MockScraper {
    async fn submit(&self, urls: Vec<String>) -> anyhow::Result<ScrapeJob> {
        self.submitted.lock().unwrap().push(urls);
        if let Some(message) = &self.submit_error {
            anyhow::bail!("{message}");
        }
        Ok(ScrapeJob {
            run_id: "run-1".to_string(),
            dataset_id: "dataset-1".to_string(),
        })
    }

    async fn poll(&self, _run_id: &str) -> anyhow::Result<RunStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(RunStatus::Running))
    }

    async fn fetch(&self, _dataset_id: &str) -> anyhow::Result<Vec<Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

/// Records every persisted profile; optionally rejects names.
#[derive(Default)]
pub struct RecordingSink {
    persisted: Mutex<Vec<(Uuid, NewProfile)>>,
    rejected_names: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_name(&self, name: &str) {
        self.rejected_names.lock().unwrap().insert(name.to_string());
    }

    pub fn persisted(&self) -> Vec<(Uuid, NewProfile)> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileSink for RecordingSink {
    async fn persist(&self, user_id: Uuid, profile: NewProfile) -> Result<SavedProfile> {
        if self.rejected_names.lock().unwrap().contains(&profile.name) {
            return Err(LeadVaultError::Conflict(format!(
                "profile {} already exists",
                profile.name
            )));
        }
        let saved = SavedProfile {
            id: Uuid::new_v4(),
            name: profile.name.clone(),
            linkedin_id: profile
                .linkedin_url
                .as_deref()
                .and_then(leadvault_common::extract_linkedin_id),
        };
        self.persisted.lock().unwrap().push((user_id, profile));
        Ok(saved)
    }
}

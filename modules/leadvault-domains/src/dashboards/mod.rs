mod ledger;
mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadvault_common::{LeadVaultError, Result, MAX_RECENT_ACTIVITY, STARTING_POINTS};

pub use ledger::{ActivityTrigger, CreditOutcome, Ledger};
pub use store::PgDashboardStore;

/// Per-user points and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user_id: Uuid,
    pub available_points: i32,
    pub total_contacts: i32,
    pub unlocked_profiles: i32,
    pub my_uploads: i32,
    pub uploaded_profile_ids: Vec<Uuid>,
    pub unlocked_contact_ids: Vec<Uuid>,
    pub recent_activity: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn new(user_id: Uuid, welcome: &str) -> Self {
        Self {
            user_id,
            available_points: STARTING_POINTS,
            total_contacts: 0,
            unlocked_profiles: 0,
            my_uploads: 0,
            uploaded_profile_ids: Vec::new(),
            unlocked_contact_ids: Vec::new(),
            recent_activity: vec![welcome.to_string()],
            updated_at: Utc::now(),
        }
    }

    /// Append one activity line, keeping only the newest entries.
    pub fn push_activity(&mut self, message: impl Into<String>) {
        self.recent_activity.push(message.into());
        trim_activity(&mut self.recent_activity);
    }
}

/// Drop the oldest lines so at most `MAX_RECENT_ACTIVITY` remain.
pub(crate) fn trim_activity(activity: &mut Vec<String>) {
    if activity.len() > MAX_RECENT_ACTIVITY {
        let excess = activity.len() - MAX_RECENT_ACTIVITY;
        activity.drain(..excess);
    }
}

/// Client-supplied dashboard fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardUpdate {
    pub available_points: Option<i32>,
    pub total_contacts: Option<i32>,
    pub unlocked_profiles: Option<i32>,
    pub my_uploads: Option<i32>,
    pub uploaded_profile_ids: Option<Vec<Uuid>>,
    pub unlocked_contact_ids: Option<Vec<Uuid>>,
    pub recent_activity: Option<Vec<String>>,
}

impl DashboardUpdate {
    pub(crate) fn apply(self, dashboard: &mut Dashboard) -> Result<()> {
        for (field, value) in [
            ("availablePoints", self.available_points),
            ("totalContacts", self.total_contacts),
            ("unlockedProfiles", self.unlocked_profiles),
            ("myUploads", self.my_uploads),
        ] {
            if matches!(value, Some(v) if v < 0) {
                return Err(LeadVaultError::Validation(format!(
                    "{field} cannot be negative"
                )));
            }
        }

        if let Some(v) = self.available_points {
            dashboard.available_points = v;
        }
        if let Some(v) = self.total_contacts {
            dashboard.total_contacts = v;
        }
        if let Some(v) = self.unlocked_profiles {
            dashboard.unlocked_profiles = v;
        }
        if let Some(v) = self.my_uploads {
            dashboard.my_uploads = v;
        }
        if let Some(v) = self.uploaded_profile_ids {
            dashboard.uploaded_profile_ids = v;
        }
        if let Some(v) = self.unlocked_contact_ids {
            dashboard.unlocked_contact_ids = v;
        }
        if let Some(mut v) = self.recent_activity {
            trim_activity(&mut v);
            dashboard.recent_activity = v;
        }
        dashboard.updated_at = Utc::now();
        Ok(())
    }
}

/// Outcome of a point-spending unlock at the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UnlockOutcome {
    Unlocked(Dashboard),
    AlreadyUnlocked(Dashboard),
    InsufficientPoints { available: i32 },
}

/// A points credit that is applied at most once per idempotency key.
#[derive(Debug, Clone)]
pub struct Credit {
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: String,
    pub idempotency_key: String,
}

/// Storage boundary for dashboards. Counter mutations are single atomic
/// operations; `save` is a whole-record overwrite.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<Dashboard>>;
    /// Insert unless a dashboard already exists; returns the stored record.
    async fn create(&self, dashboard: &Dashboard) -> Result<Dashboard>;
    async fn save(&self, dashboard: &Dashboard) -> Result<Dashboard>;
    async fn append_activity(&self, user_id: Uuid, message: &str) -> Result<()>;
    /// Returns false when the profile was already counted.
    async fn record_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool>;
    /// Undo `record_upload` for a deleted profile. Returns false when the
    /// profile was not counted.
    async fn remove_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool>;
    async fn unlock(&self, user_id: Uuid, profile_id: Uuid, cost: i32) -> Result<UnlockOutcome>;
    /// Returns false when the idempotency key was already used.
    async fn apply_credit(&self, credit: &Credit) -> Result<bool>;
}

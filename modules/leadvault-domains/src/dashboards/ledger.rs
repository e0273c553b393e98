use std::sync::Arc;

use uuid::Uuid;

use leadvault_common::{LeadVaultError, Result, STARTING_POINTS};

use super::{Credit, Dashboard, DashboardStore, DashboardUpdate, UnlockOutcome};
use crate::profiles::ProfileStore;

/// What caused a dashboard to be created; picks the welcome line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTrigger {
    Signup,
    Login,
    OAuthFirstLogin,
    Access,
}

impl ActivityTrigger {
    pub fn welcome(self) -> String {
        match self {
            ActivityTrigger::Signup => {
                format!("Welcome to LeadVault! You received {STARTING_POINTS} free points.")
            }
            ActivityTrigger::Login => {
                format!("Dashboard set up on login. You received {STARTING_POINTS} welcome points.")
            }
            ActivityTrigger::OAuthFirstLogin => format!(
                "Welcome! Signed in with Google. You received {STARTING_POINTS} free points."
            ),
            ActivityTrigger::Access => {
                format!("Dashboard created. You received {STARTING_POINTS} welcome points.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    Applied,
    AlreadyApplied,
}

/// Points, counters and activity for every user.
#[derive(Clone)]
pub struct Ledger {
    dashboards: Arc<dyn DashboardStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl Ledger {
    pub fn new(dashboards: Arc<dyn DashboardStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            dashboards,
            profiles,
        }
    }

    /// Return the user's dashboard, creating it with defaults on first use.
    pub async fn fetch_or_create(&self, user_id: Uuid, trigger: ActivityTrigger) -> Result<Dashboard> {
        if let Some(existing) = self.dashboards.find(user_id).await? {
            return Ok(existing);
        }
        let dashboard = self
            .dashboards
            .create(&Dashboard::new(user_id, &trigger.welcome()))
            .await?;
        tracing::info!(user_id = %user_id, trigger = ?trigger, "Dashboard created");
        Ok(dashboard)
    }

    /// Profiles the user has paid to see. A user without a dashboard has
    /// unlocked nothing.
    pub async fn unlocked_contact_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .dashboards
            .find(user_id)
            .await?
            .map(|d| d.unlocked_contact_ids)
            .unwrap_or_default())
    }

    /// Dashboard read path: fetch-or-create followed by counter reconciliation.
    pub async fn load(&self, user_id: Uuid) -> Result<Dashboard> {
        let dashboard = self.fetch_or_create(user_id, ActivityTrigger::Access).await?;
        Ok(self.reconcile(dashboard).await)
    }

    /// Recompute upload and unlock counters from their sources of truth and
    /// persist a correction when they drifted. Failures are logged and the
    /// dashboard is returned as read.
    pub async fn reconcile(&self, mut dashboard: Dashboard) -> Dashboard {
        let user_id = dashboard.user_id;
        let uploads = match self.profiles.count_by_uploader(user_id).await {
            Ok(count) => i32::try_from(count).unwrap_or(i32::MAX),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Dashboard reconciliation skipped");
                return dashboard;
            }
        };
        let unlocked = i32::try_from(dashboard.unlocked_contact_ids.len()).unwrap_or(i32::MAX);

        if dashboard.my_uploads == uploads
            && dashboard.total_contacts == uploads
            && dashboard.unlocked_profiles == unlocked
        {
            return dashboard;
        }

        tracing::info!(
            user_id = %user_id,
            stored_uploads = dashboard.my_uploads,
            actual_uploads = uploads,
            stored_unlocked = dashboard.unlocked_profiles,
            actual_unlocked = unlocked,
            "Correcting drifted dashboard counters"
        );
        let original = dashboard.clone();
        dashboard.my_uploads = uploads;
        dashboard.total_contacts = uploads;
        dashboard.unlocked_profiles = unlocked;
        dashboard.updated_at = chrono::Utc::now();

        match self.dashboards.save(&dashboard).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to persist reconciled counters");
                original
            }
        }
    }

    /// Overwrite the provided fields; `updated_at` is always stamped.
    pub async fn update(&self, user_id: Uuid, update: DashboardUpdate) -> Result<Dashboard> {
        let mut dashboard = self.fetch_or_create(user_id, ActivityTrigger::Access).await?;
        update.apply(&mut dashboard)?;
        self.dashboards.save(&dashboard).await
    }

    pub async fn append_activity(&self, user_id: Uuid, message: &str) -> Result<()> {
        let message = message.trim();
        if message.is_empty() {
            return Err(LeadVaultError::Validation("activity message is required".to_string()));
        }
        self.fetch_or_create(user_id, ActivityTrigger::Access).await?;
        self.dashboards.append_activity(user_id, message).await
    }

    /// Count a new upload exactly once.
    pub async fn record_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.fetch_or_create(user_id, ActivityTrigger::Access).await?;
        if !self.dashboards.record_upload(user_id, profile_id).await? {
            tracing::debug!(user_id = %user_id, profile_id = %profile_id, "Upload already counted");
        }
        Ok(())
    }

    /// Take a deleted profile off its uploader's dashboard.
    pub async fn record_removal(&self, user_id: Uuid, profile_id: Uuid) -> Result<()> {
        if !self.dashboards.remove_upload(user_id, profile_id).await? {
            tracing::debug!(user_id = %user_id, profile_id = %profile_id, "Upload was not counted");
        }
        Ok(())
    }

    /// Credit points at most once per `idempotency_key`.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<CreditOutcome> {
        if amount <= 0 {
            return Err(LeadVaultError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }
        self.fetch_or_create(user_id, ActivityTrigger::Access).await?;

        let credit = Credit {
            user_id,
            amount,
            reason: reason.to_string(),
            idempotency_key: idempotency_key.to_string(),
        };
        if !self.dashboards.apply_credit(&credit).await? {
            tracing::info!(user_id = %user_id, idempotency_key, "Credit already applied");
            return Ok(CreditOutcome::AlreadyApplied);
        }

        tracing::info!(user_id = %user_id, amount, reason, "Points credited");
        if let Err(e) = self
            .dashboards
            .append_activity(user_id, &format!("Earned {amount} points: {reason}"))
            .await
        {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to log credit activity");
        }
        Ok(CreditOutcome::Applied)
    }

    /// Spend `cost` points to unlock a contact. Unlocking twice is free.
    pub async fn unlock_contact(&self, user_id: Uuid, profile_id: Uuid, cost: i32) -> Result<Dashboard> {
        if cost < 0 {
            return Err(LeadVaultError::Validation("unlock cost cannot be negative".to_string()));
        }
        let profile = self
            .profiles
            .find_by_id(profile_id)
            .await?
            .ok_or_else(|| LeadVaultError::NotFound(format!("profile {profile_id}")))?;
        self.fetch_or_create(user_id, ActivityTrigger::Access).await?;

        match self.dashboards.unlock(user_id, profile_id, cost).await? {
            UnlockOutcome::Unlocked(_) => {
                tracing::info!(user_id = %user_id, profile_id = %profile_id, cost, "Contact unlocked");
                self.dashboards
                    .append_activity(
                        user_id,
                        &format!("Unlocked contact: {} (-{cost} points)", profile.name),
                    )
                    .await?;
                self.dashboards.find(user_id).await?.ok_or_else(|| {
                    LeadVaultError::NotFound(format!("dashboard for user {user_id}"))
                })
            }
            UnlockOutcome::AlreadyUnlocked(dashboard) => Ok(dashboard),
            UnlockOutcome::InsufficientPoints { available } => {
                Err(LeadVaultError::InsufficientPoints {
                    available,
                    required: cost,
                })
            }
        }
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use leadvault_common::{LeadVaultError, Result, MAX_RECENT_ACTIVITY};

use super::{Credit, Dashboard, DashboardStore, UnlockOutcome};
use crate::db::map_db_err;

pub struct PgDashboardStore {
    pool: PgPool,
}

impl PgDashboardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardStore for PgDashboardStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Dashboard>> {
        sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn create(&self, dashboard: &Dashboard) -> Result<Dashboard> {
        sqlx::query(
            r#"
            INSERT INTO dashboards (
                user_id, available_points, total_contacts, unlocked_profiles, my_uploads,
                uploaded_profile_ids, unlocked_contact_ids, recent_activity, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(dashboard.user_id)
        .bind(dashboard.available_points)
        .bind(dashboard.total_contacts)
        .bind(dashboard.unlocked_profiles)
        .bind(dashboard.my_uploads)
        .bind(&dashboard.uploaded_profile_ids)
        .bind(&dashboard.unlocked_contact_ids)
        .bind(&dashboard.recent_activity)
        .bind(dashboard.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        // Another request may have created it first; return whatever won.
        self.find(dashboard.user_id).await?.ok_or_else(|| {
            LeadVaultError::Database(format!("dashboard {} vanished after insert", dashboard.user_id))
        })
    }

    async fn save(&self, dashboard: &Dashboard) -> Result<Dashboard> {
        sqlx::query_as::<_, Dashboard>(
            r#"
            UPDATE dashboards SET
                available_points = $2,
                total_contacts = $3,
                unlocked_profiles = $4,
                my_uploads = $5,
                uploaded_profile_ids = $6,
                unlocked_contact_ids = $7,
                recent_activity = $8,
                updated_at = $9
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(dashboard.user_id)
        .bind(dashboard.available_points)
        .bind(dashboard.total_contacts)
        .bind(dashboard.unlocked_profiles)
        .bind(dashboard.my_uploads)
        .bind(&dashboard.uploaded_profile_ids)
        .bind(&dashboard.unlocked_contact_ids)
        .bind(&dashboard.recent_activity)
        .bind(dashboard.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn append_activity(&self, user_id: Uuid, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dashboards SET
                recent_activity = (recent_activity || $2::text)
                    [GREATEST(cardinality(recent_activity) + 2 - $3, 1):],
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(message)
        .bind(MAX_RECENT_ACTIVITY as i32)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn record_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dashboards SET
                my_uploads = my_uploads + 1,
                total_contacts = total_contacts + 1,
                uploaded_profile_ids = array_append(uploaded_profile_ids, $2),
                updated_at = NOW()
            WHERE user_id = $1 AND NOT ($2 = ANY(uploaded_profile_ids))
            "#,
        )
        .bind(user_id)
        .bind(profile_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_upload(&self, user_id: Uuid, profile_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dashboards SET
                my_uploads = GREATEST(my_uploads - 1, 0),
                total_contacts = GREATEST(total_contacts - 1, 0),
                uploaded_profile_ids = array_remove(uploaded_profile_ids, $2),
                updated_at = NOW()
            WHERE user_id = $1 AND $2 = ANY(uploaded_profile_ids)
            "#,
        )
        .bind(user_id)
        .bind(profile_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlock(&self, user_id: Uuid, profile_id: Uuid, cost: i32) -> Result<UnlockOutcome> {
        let unlocked = sqlx::query_as::<_, Dashboard>(
            r#"
            UPDATE dashboards SET
                available_points = available_points - $3,
                unlocked_contact_ids = array_append(unlocked_contact_ids, $2),
                unlocked_profiles = unlocked_profiles + 1,
                updated_at = NOW()
            WHERE user_id = $1
              AND available_points >= $3
              AND NOT ($2 = ANY(unlocked_contact_ids))
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(profile_id)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        if let Some(dashboard) = unlocked {
            return Ok(UnlockOutcome::Unlocked(dashboard));
        }

        let current = self
            .find(user_id)
            .await?
            .ok_or_else(|| LeadVaultError::NotFound(format!("dashboard for user {user_id}")))?;
        if current.unlocked_contact_ids.contains(&profile_id) {
            Ok(UnlockOutcome::AlreadyUnlocked(current))
        } else {
            Ok(UnlockOutcome::InsufficientPoints {
                available: current.available_points,
            })
        }
    }

    async fn apply_credit(&self, credit: &Credit) -> Result<bool> {
        let applied: Option<(Uuid,)> = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO ledger_credits (user_id, amount, reason, idempotency_key)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (idempotency_key) DO NOTHING
                RETURNING id
            )
            UPDATE dashboards SET
                available_points = available_points + $2,
                updated_at = NOW()
            WHERE user_id = $1 AND EXISTS (SELECT 1 FROM inserted)
            RETURNING user_id
            "#,
        )
        .bind(credit.user_id)
        .bind(credit.amount)
        .bind(&credit.reason)
        .bind(&credit.idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(applied.is_some())
    }
}

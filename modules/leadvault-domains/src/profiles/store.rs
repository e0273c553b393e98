use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use leadvault_common::Result;

use super::{NewProfile, Profile, ProfileQuery, ProfileStore};
use crate::db::map_db_err;

const MAX_PAGE: u32 = 100;

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_linkedin_id(&self, linkedin_id: &str) -> Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE linkedin_id = $1")
            .bind(linkedin_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn insert(
        &self,
        uploaded_by: Uuid,
        linkedin_id: Option<&str>,
        profile: &NewProfile,
    ) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (
                linkedin_id, name, job_title, company, location, industry, seniority_level,
                experience, skills, education, work_experience, company_size, avatar,
                email, phone, linkedin_url, extra_links, uploaded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(linkedin_id)
        .bind(&profile.name)
        .bind(&profile.job_title)
        .bind(&profile.company)
        .bind(&profile.location)
        .bind(&profile.industry)
        .bind(profile.seniority_level.as_str())
        .bind(profile.experience)
        .bind(&profile.skills)
        .bind(&profile.education)
        .bind(&profile.work_experience)
        .bind(&profile.company_size)
        .bind(&profile.avatar)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.linkedin_url)
        .bind(&profile.extra_links)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn update(&self, profile: &Profile) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                linkedin_id = $2, name = $3, job_title = $4, company = $5, location = $6,
                industry = $7, seniority_level = $8, experience = $9, skills = $10,
                education = $11, work_experience = $12, company_size = $13, avatar = $14,
                email = $15, phone = $16, linkedin_url = $17, extra_links = $18,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.linkedin_id)
        .bind(&profile.name)
        .bind(&profile.job_title)
        .bind(&profile.company)
        .bind(&profile.location)
        .bind(&profile.industry)
        .bind(&profile.seniority_level)
        .bind(profile.experience)
        .bind(&profile.skills)
        .bind(&profile.education)
        .bind(&profile.work_experience)
        .bind(&profile.company_size)
        .bind(&profile.avatar)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.linkedin_url)
        .bind(&profile.extra_links)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: ProfileQuery) -> Result<Vec<Profile>> {
        let limit = query.limit.clamp(1, MAX_PAGE) as i64;
        sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles
            WHERE ($1::uuid IS NULL OR uploaded_by = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query.uploaded_by)
        .bind(limit)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn count_by_uploader(&self, user_id: Uuid) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE uploaded_by = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;
        Ok(count)
    }
}

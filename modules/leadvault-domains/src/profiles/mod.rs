pub mod dedup;
mod service;
mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadvault_common::{Result, SeniorityLevel};

pub use dedup::{check_duplicate, DuplicateReport};
pub use service::ProfileService;
pub use store::PgProfileStore;

/// A contact record as stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub linkedin_id: Option<String>,
    pub name: String,
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub industry: String,
    pub seniority_level: String,
    pub experience: i32,
    pub skills: Vec<String>,
    pub education: String,
    pub work_experience: String,
    pub company_size: String,
    pub avatar: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub extra_links: Vec<String>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Contact details are visible to the uploader and to users who unlocked
    /// the profile.
    pub fn contact_visible_to(&self, viewer: Uuid, unlocked: &[Uuid]) -> bool {
        self.uploaded_by == viewer || unlocked.contains(&self.id)
    }

    /// Drop email, phone and extra links.
    pub fn without_contact(mut self) -> Self {
        self.email = None;
        self.phone = None;
        self.extra_links.clear();
        self
    }

    /// The profile as `viewer` may see it.
    pub fn view_for(self, viewer: Uuid, unlocked: &[Uuid]) -> Self {
        if self.contact_visible_to(viewer, unlocked) {
            self
        } else {
            self.without_contact()
        }
    }
}

/// Fields accepted when creating a profile, from manual entry or a scrape.
/// The owner and LinkedIn slug are never taken from the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProfile {
    pub name: String,
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub industry: String,
    pub seniority_level: SeniorityLevel,
    pub experience: i32,
    pub skills: Vec<String>,
    pub education: String,
    pub work_experience: String,
    pub company_size: String,
    pub avatar: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub extra_links: Vec<String>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub seniority_level: Option<SeniorityLevel>,
    pub experience: Option<i32>,
    pub skills: Option<Vec<String>>,
    pub education: Option<String>,
    pub work_experience: Option<String>,
    pub company_size: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub extra_links: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub(crate) fn apply(self, profile: &mut Profile) {
        if let Some(v) = self.name {
            profile.name = v;
        }
        if let Some(v) = self.job_title {
            profile.job_title = v;
        }
        if let Some(v) = self.company {
            profile.company = v;
        }
        if let Some(v) = self.location {
            profile.location = v;
        }
        if let Some(v) = self.industry {
            profile.industry = v;
        }
        if let Some(v) = self.seniority_level {
            profile.seniority_level = v.to_string();
        }
        if let Some(v) = self.experience {
            profile.experience = v;
        }
        if let Some(v) = self.skills {
            profile.skills = v;
        }
        if let Some(v) = self.education {
            profile.education = v;
        }
        if let Some(v) = self.work_experience {
            profile.work_experience = v;
        }
        if let Some(v) = self.company_size {
            profile.company_size = v;
        }
        if let Some(v) = self.avatar {
            profile.avatar = v;
        }
        if let Some(v) = self.email {
            profile.email = Some(v);
        }
        if let Some(v) = self.phone {
            profile.phone = Some(v);
        }
        if let Some(v) = self.linkedin_url {
            profile.linkedin_url = Some(v);
        }
        if let Some(v) = self.extra_links {
            profile.extra_links = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileQuery {
    pub uploaded_by: Option<Uuid>,
    pub limit: u32,
    pub offset: u32,
}

/// Storage boundary for contact records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>>;
    async fn find_by_linkedin_id(&self, linkedin_id: &str) -> Result<Option<Profile>>;
    async fn insert(
        &self,
        uploaded_by: Uuid,
        linkedin_id: Option<&str>,
        profile: &NewProfile,
    ) -> Result<Profile>;
    /// Persist every mutable column of `profile`, stamping `updated_at`.
    async fn update(&self, profile: &Profile) -> Result<Profile>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list(&self, query: ProfileQuery) -> Result<Vec<Profile>>;
    async fn count_by_uploader(&self, user_id: Uuid) -> Result<i64>;
}

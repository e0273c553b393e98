use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadvault_common::Result;

use crate::profiles::{NewProfile, Profile, ProfileService};

/// Summary of a persisted profile reported back per batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProfile {
    pub id: Uuid,
    pub name: String,
    pub linkedin_id: Option<String>,
}

impl From<&Profile> for SavedProfile {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            linkedin_id: profile.linkedin_id.clone(),
        }
    }
}

/// Where normalized profiles go. Implementations own duplicate detection.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    async fn persist(&self, user_id: Uuid, profile: NewProfile) -> Result<SavedProfile>;
}

/// Persists straight through the profile service.
pub struct StoreProfileSink {
    profiles: ProfileService,
}

impl StoreProfileSink {
    pub fn new(profiles: ProfileService) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ProfileSink for StoreProfileSink {
    async fn persist(&self, user_id: Uuid, profile: NewProfile) -> Result<SavedProfile> {
        let saved = self.profiles.create(user_id, profile).await?;
        Ok(SavedProfile::from(&saved))
    }
}

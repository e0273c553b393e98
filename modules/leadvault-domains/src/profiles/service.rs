use std::sync::Arc;

use uuid::Uuid;

use leadvault_common::{extract_linkedin_id, LeadVaultError, Result, MAX_SKILLS};

use super::{check_duplicate, NewProfile, Profile, ProfileQuery, ProfileStore, ProfileUpdate};
use crate::dashboards::Ledger;

const DEFAULT_PAGE: u32 = 20;

/// Profile CRUD with LinkedIn deduplication and ledger bookkeeping.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    ledger: Ledger,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    pub fn store(&self) -> &dyn ProfileStore {
        self.store.as_ref()
    }

    /// Create a profile owned by `uploader`.
    ///
    /// The LinkedIn slug is derived from `linkedin_url` right before the
    /// insert; a slug already on file is a `Conflict`.
    pub async fn create(&self, uploader: Uuid, mut input: NewProfile) -> Result<Profile> {
        input.name = input.name.trim().to_string();
        if input.name.is_empty() {
            return Err(LeadVaultError::Validation("name is required".to_string()));
        }
        if input.experience < 0 {
            return Err(LeadVaultError::Validation(
                "experience cannot be negative".to_string(),
            ));
        }
        input.skills.truncate(MAX_SKILLS);
        input.linkedin_url = input
            .linkedin_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        if let Some(report) = check_duplicate(self.store(), input.linkedin_url.as_deref()).await {
            return Err(LeadVaultError::Conflict(report.message));
        }

        let linkedin_id = input.linkedin_url.as_deref().and_then(extract_linkedin_id);
        let profile = self
            .store
            .insert(uploader, linkedin_id.as_deref(), &input)
            .await?;

        tracing::info!(
            profile_id = %profile.id,
            user_id = %uploader,
            linkedin_id = ?profile.linkedin_id,
            "Profile created"
        );

        // Profile and dashboard writes are not transactional; a failed counter
        // update is corrected by reconciliation on the next dashboard read.
        if let Err(e) = self.ledger.record_upload(uploader, profile.id).await {
            tracing::warn!(error = %e, user_id = %uploader, "Failed to record upload on dashboard");
        }
        if let Err(e) = self
            .ledger
            .append_activity(uploader, &format!("Uploaded contact: {}", profile.name))
            .await
        {
            tracing::warn!(error = %e, user_id = %uploader, "Failed to append upload activity");
        }

        Ok(profile)
    }

    pub async fn get(&self, id: Uuid) -> Result<Profile> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| LeadVaultError::NotFound(format!("profile {id}")))
    }

    pub async fn list(&self, mut query: ProfileQuery) -> Result<Vec<Profile>> {
        if query.limit == 0 {
            query.limit = DEFAULT_PAGE;
        }
        self.store.list(query).await
    }

    /// Apply a partial update. Only the uploader may edit a profile. The slug
    /// is recomputed whenever the LinkedIn URL changes.
    pub async fn update(&self, requester: Uuid, id: Uuid, update: ProfileUpdate) -> Result<Profile> {
        let mut profile = self.get(id).await?;
        if profile.uploaded_by != requester {
            return Err(LeadVaultError::Forbidden(
                "only the uploader can edit this profile".to_string(),
            ));
        }

        let previous_url = profile.linkedin_url.clone();
        update.apply(&mut profile);

        profile.name = profile.name.trim().to_string();
        if profile.name.is_empty() {
            return Err(LeadVaultError::Validation("name is required".to_string()));
        }
        if profile.experience < 0 {
            return Err(LeadVaultError::Validation(
                "experience cannot be negative".to_string(),
            ));
        }
        profile.skills.truncate(MAX_SKILLS);

        if profile.linkedin_url != previous_url {
            profile.linkedin_url = profile
                .linkedin_url
                .take()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
            if let Some(report) =
                check_duplicate(self.store(), profile.linkedin_url.as_deref()).await
            {
                if report.existing_id != profile.id {
                    return Err(LeadVaultError::Conflict(report.message));
                }
            }
            profile.linkedin_id = profile.linkedin_url.as_deref().and_then(extract_linkedin_id);
        }

        let saved = self.store.update(&profile).await?;
        tracing::info!(profile_id = %saved.id, "Profile updated");
        Ok(saved)
    }

    pub async fn delete(&self, requester: Uuid, id: Uuid) -> Result<()> {
        let profile = self.get(id).await?;
        if profile.uploaded_by != requester {
            return Err(LeadVaultError::Forbidden(
                "only the uploader can delete this profile".to_string(),
            ));
        }
        if !self.store.delete(id).await? {
            return Err(LeadVaultError::NotFound(format!("profile {id}")));
        }
        tracing::info!(profile_id = %id, user_id = %requester, "Profile deleted");

        if let Err(e) = self.ledger.record_removal(requester, id).await {
            tracing::warn!(error = %e, user_id = %requester, "Failed to remove upload from dashboard");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDashboardStore, InMemoryProfileStore};

    fn service() -> (ProfileService, Arc<InMemoryProfileStore>, Ledger) {
        let profiles = Arc::new(InMemoryProfileStore::new());
        let dashboards = Arc::new(InMemoryDashboardStore::new());
        let ledger = Ledger::new(dashboards, profiles.clone());
        (ProfileService::new(profiles.clone(), ledger.clone()), profiles, ledger)
    }

    fn jane() -> NewProfile {
        NewProfile {
            name: "Jane Doe".into(),
            job_title: "Engineer".into(),
            linkedin_url: Some("https://www.linkedin.com/in/Jane-Doe".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_records_upload() {
        let (svc, _, ledger) = service();
        let user = Uuid::new_v4();

        let profile = svc.create(user, jane()).await.unwrap();
        assert_eq!(profile.linkedin_id.as_deref(), Some("jane-doe"));

        let dashboard = ledger.load(user).await.unwrap();
        assert_eq!(dashboard.my_uploads, 1);
        assert_eq!(dashboard.total_contacts, 1);
        assert_eq!(dashboard.uploaded_profile_ids, vec![profile.id]);
        assert_eq!(
            dashboard.recent_activity.last().map(String::as_str),
            Some("Uploaded contact: Jane Doe")
        );
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let (svc, _, _) = service();
        svc.create(Uuid::new_v4(), jane()).await.unwrap();

        let mut again = jane();
        again.linkedin_url = Some("https://linkedin.com/in/jane-doe/?trk=x".into());
        let err = svc.create(Uuid::new_v4(), again).await.unwrap_err();
        assert!(matches!(err, LeadVaultError::Conflict(_)));
    }

    #[tokio::test]
    async fn profiles_without_slug_are_not_deduplicated() {
        let (svc, _, _) = service();
        let user = Uuid::new_v4();
        let manual = NewProfile {
            name: "No Link".into(),
            ..Default::default()
        };
        svc.create(user, manual.clone()).await.unwrap();
        svc.create(user, manual).await.unwrap();
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (svc, _, _) = service();
        let err = svc
            .create(
                Uuid::new_v4(),
                NewProfile {
                    name: "   ".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeadVaultError::Validation(_)));
    }

    #[tokio::test]
    async fn update_recomputes_slug_when_url_changes() {
        let (svc, _, _) = service();
        let user = Uuid::new_v4();
        let profile = svc.create(user, jane()).await.unwrap();

        let updated = svc
            .update(
                user,
                profile.id,
                ProfileUpdate {
                    linkedin_url: Some("https://linkedin.com/in/JaneD".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.linkedin_id.as_deref(), Some("janed"));
    }

    #[tokio::test]
    async fn update_rejects_url_owned_by_another_profile() {
        let (svc, _, _) = service();
        let user = Uuid::new_v4();
        svc.create(user, jane()).await.unwrap();
        let other = svc
            .create(
                user,
                NewProfile {
                    name: "Bob".into(),
                    linkedin_url: Some("https://linkedin.com/in/bob".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = svc
            .update(
                user,
                other.id,
                ProfileUpdate {
                    linkedin_url: Some("https://linkedin.com/in/jane-doe".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeadVaultError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_uploader_may_edit_or_delete() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let profile = svc.create(owner, jane()).await.unwrap();
        let stranger = Uuid::new_v4();

        let err = svc
            .update(stranger, profile.id, ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadVaultError::Forbidden(_)));

        let err = svc.delete(stranger, profile.id).await.unwrap_err();
        assert!(matches!(err, LeadVaultError::Forbidden(_)));

        svc.delete(owner, profile.id).await.unwrap();
        assert!(matches!(
            svc.get(profile.id).await.unwrap_err(),
            LeadVaultError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_prunes_the_uploaders_dashboard() {
        let (svc, _, ledger) = service();
        let user = Uuid::new_v4();
        let kept = svc
            .create(
                user,
                NewProfile {
                    name: "Kept".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let gone = svc.create(user, jane()).await.unwrap();

        svc.delete(user, gone.id).await.unwrap();

        let dashboard = ledger.load(user).await.unwrap();
        assert_eq!(dashboard.uploaded_profile_ids, vec![kept.id]);
        assert_eq!(dashboard.my_uploads, 1);
        assert_eq!(dashboard.total_contacts, 1);
    }
}

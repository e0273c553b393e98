use serde::Serialize;
use uuid::Uuid;

use leadvault_common::extract_linkedin_id;

use super::ProfileStore;

/// Result of a positive duplicate lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub exists: bool,
    pub message: String,
    pub existing_id: Uuid,
    pub linkedin_id: String,
}

/// Look up an existing profile for the LinkedIn slug in `url`.
///
/// `None` covers three cases: the URL carries no slug (no decision), no
/// record matches, or the lookup itself failed. Lookup errors are logged and
/// never block ingestion.
pub async fn check_duplicate(store: &dyn ProfileStore, url: Option<&str>) -> Option<DuplicateReport> {
    let linkedin_id = extract_linkedin_id(url?)?;

    match store.find_by_linkedin_id(&linkedin_id).await {
        Ok(Some(existing)) => Some(DuplicateReport {
            exists: true,
            message: format!(
                "A profile for this LinkedIn URL already exists ({})",
                existing.name
            ),
            existing_id: existing.id,
            linkedin_id,
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, linkedin_id, "Duplicate check failed, continuing without it");
            None
        }
    }
}

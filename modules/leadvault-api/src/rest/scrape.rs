use std::sync::Arc;

use axum::{extract::State, response::Json};

use leadvault_domains::scraping::{BatchSummary, ScrapeRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

/// Run a LinkedIn import batch for the caller. `userId` may be omitted; when
/// present it must name the caller.
pub async fn scrape_linkedin(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(mut body): Json<ScrapeRequest>,
) -> Result<Json<BatchSummary>, ApiError> {
    match body.user_id {
        Some(id) if id != auth.user_id => {
            return Err(ApiError::Forbidden(
                "Cannot import profiles for another user".into(),
            ));
        }
        Some(_) => {}
        None => body.user_id = Some(auth.user_id),
    }

    let summary = state.scraper.run(body).await?;
    Ok(Json(summary))
}

pub mod auth;
pub mod dashboard;
pub mod profiles;
pub mod scrape;

use axum::response::Json;
use serde_json::json;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

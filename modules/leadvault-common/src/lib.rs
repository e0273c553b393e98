pub mod config;
pub mod error;
pub mod linkedin;
pub mod types;

pub use config::AppConfig;
pub use error::{LeadVaultError, Result};
pub use linkedin::{extract_linkedin_id, is_profile_url, profile_url_key};
pub use types::*;

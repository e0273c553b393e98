use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeadVaultError>;

#[derive(Error, Debug)]
pub enum LeadVaultError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient points: {available} available, {required} required")]
    InsufficientPoints { available: i32, required: i32 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

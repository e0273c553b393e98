use leadvault_common::LeadVaultError;

/// Map a sqlx error into the domain taxonomy. Unique violations become
/// conflicts so callers can report duplicates instead of a generic failure.
pub(crate) fn map_db_err(err: sqlx::Error) -> LeadVaultError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LeadVaultError::Conflict(db.message().to_string())
        }
        sqlx::Error::RowNotFound => LeadVaultError::NotFound("row not found".to_string()),
        _ => LeadVaultError::Database(err.to_string()),
    }
}

use sqlx::FromRow;
use time::OffsetDateTime;

/// One row per phone number that has ever texted the service.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,                                // assigned by the store
    pub phone_number: String,                   // unique natural key
    pub is_active: bool,
    pub subscription_status: String,            // "trial" until billing exists
    pub onboarding_complete: bool,
    pub created_at: OffsetDateTime,
    pub last_interaction: Option<OffsetDateTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("user {0} not found")]
    NotFound(i64),
}

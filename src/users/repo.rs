use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::users::{StoreError, User};

const USER_COLUMNS: &str = "id, phone_number, is_active, subscription_status, \
                            onboarding_complete, created_at, last_interaction";

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the row for `phone_number`, inserting one with defaults if absent.
    async fn get_or_create(&self, phone_number: &str) -> Result<User, StoreError>;

    /// Stamps `last_interaction` with the current time. `user` is only
    /// updated once the write has been persisted.
    async fn touch_interaction(&self, user: &mut User) -> Result<(), StoreError>;

    #[cfg(test)]
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError>;

    #[cfg(test)]
    async fn set_onboarding_complete(&self, id: i64, complete: bool) -> Result<(), StoreError>;

    async fn migrate(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}

pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn UserStore>, StoreError> {
    let store: Arc<dyn UserStore> = match config {
        DatabaseConfig::Postgres(options) => Arc::new(PgUserStore::connect(options).await?),
        DatabaseConfig::Sqlite { url } => Arc::new(SqliteUserStore::connect(url).await?),
    };
    info!(backend = store.backend(), "user store connected");
    Ok(store)
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options.clone())
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_or_create(&self, phone_number: &str) -> Result<User, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (phone_number, created_at)
            VALUES ($1, $2)
            ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(phone_number)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;
        debug!(user_id = user.id, %phone_number, "user resolved");
        Ok(user)
    }

    async fn touch_interaction(&self, user: &mut User) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let res = sqlx::query("UPDATE users SET last_interaction = $1 WHERE id = $2")
            .bind(now)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(user.id));
        }
        user.last_interaction = Some(now);
        Ok(())
    }

    #[cfg(test)]
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[cfg(test)]
    async fn set_onboarding_complete(&self, id: i64, complete: bool) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE users SET onboarding_complete = $1 WHERE id = $2")
            .bind(complete)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Private in-memory database. A single long-lived connection keeps the
    /// schema alive for the lifetime of the pool.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_or_create(&self, phone_number: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (phone_number, created_at)
            VALUES (?, ?)
            ON CONFLICT (phone_number) DO UPDATE SET phone_number = excluded.phone_number
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(phone_number)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;
        debug!(user_id = user.id, %phone_number, "user resolved");
        Ok(user)
    }

    async fn touch_interaction(&self, user: &mut User) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let res = sqlx::query("UPDATE users SET last_interaction = ? WHERE id = ?")
            .bind(now)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(user.id));
        }
        user.last_interaction = Some(now);
        Ok(())
    }

    #[cfg(test)]
    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?"
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[cfg(test)]
    async fn set_onboarding_complete(&self, id: i64, complete: bool) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE users SET onboarding_complete = ? WHERE id = ?")
            .bind(complete)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

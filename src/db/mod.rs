pub mod models;
mod postgres;

#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use postgres::PgStore;

use self::models::{NewReading, Reading, Site};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Parameterized insert/select access to stored readings and sites.
///
/// Implementations carry no business logic; callers own defaults and
/// validation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Insert one reading and return its assigned sequence id.
    async fn insert_reading(&self, site_id: &str, reading: &NewReading) -> Result<i64, StoreError>;

    /// Readings with `from <= observed_at <= to`, newest first.
    async fn readings_between(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError>;

    /// The single most recent reading for `site_id`, if any.
    async fn latest_reading(&self, site_id: &str) -> Result<Option<Reading>, StoreError>;

    async fn list_sites(&self) -> Result<Vec<Site>, StoreError>;
}

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    models::{NewReading, Reading, Site},
    ReadingStore, StoreError,
};

/// `ReadingStore` backed by the `sensor_data` and `greenhouses` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, site_id: &str, reading: &NewReading) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sensor_data
                (greenhouse_id, air_temp, humidity, water_temp, turbidity, observed_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()))
            RETURNING id
            "#,
        )
        .bind(site_id)
        .bind(reading.values.air_temp)
        .bind(reading.values.humidity)
        .bind(reading.values.water_temp)
        .bind(reading.values.turbidity)
        .bind(reading.observed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn readings_between(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id,
                   greenhouse_id AS site_id,
                   air_temp,
                   humidity,
                   water_temp,
                   turbidity,
                   observed_at
            FROM sensor_data
            WHERE greenhouse_id = $1
              AND observed_at BETWEEN $2 AND $3
            ORDER BY observed_at DESC, id DESC
            "#,
        )
        .bind(site_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_reading(&self, site_id: &str) -> Result<Option<Reading>, StoreError> {
        let row = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id,
                   greenhouse_id AS site_id,
                   air_temp,
                   humidity,
                   water_temp,
                   turbidity,
                   observed_at
            FROM sensor_data
            WHERE greenhouse_id = $1
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_sites(&self) -> Result<Vec<Site>, StoreError> {
        let rows = sqlx::query_as::<_, Site>("SELECT id, name FROM greenhouses ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::{models::NewReading, ReadingStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("site id must not be empty")]
    MissingSiteId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write side: persists readings as received.
///
/// Sensor values pass through untouched. There is no unit conversion and no
/// bounds check.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn ReadingStore>,
}

impl IngestService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// Persist `reading` for `site_id` and return the assigned id.
    pub async fn ingest(&self, site_id: &str, reading: &NewReading) -> Result<i64, IngestError> {
        let site_id = site_id.trim();
        if site_id.is_empty() {
            return Err(IngestError::MissingSiteId);
        }

        debug!(site_id = %site_id, values = ?reading.values, "Persisting reading");
        let id = self.store.insert_reading(site_id, reading).await?;
        info!(site_id = %site_id, id, "Reading stored");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory::MemoryStore, models::SensorValues, MockReadingStore};

    #[tokio::test]
    async fn blank_site_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = IngestService::new(store.clone());

        let err = service.ingest("  ", &NewReading::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::MissingSiteId));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn partial_and_out_of_range_values_pass_through() {
        let store = Arc::new(MemoryStore::new());
        let service = IngestService::new(store.clone());
        let reading = NewReading {
            values: SensorValues {
                air_temp: Some(-400.0),
                turbidity: Some(1e6),
                ..Default::default()
            },
            observed_at: None,
        };

        let id = service.ingest("gh-1", &reading).await.unwrap();
        assert_eq!(id, 1);

        let stored = store.latest_reading("gh-1").await.unwrap().unwrap();
        assert_eq!(stored.air_temp, Some(-400.0));
        assert_eq!(stored.turbidity, Some(1e6));
        assert_eq!(stored.humidity, None);
    }

    #[tokio::test]
    async fn assigned_ids_are_returned_in_sequence() {
        let service = IngestService::new(Arc::new(MemoryStore::new()));
        let a = service.ingest("gh-1", &NewReading::default()).await.unwrap();
        let b = service.ingest("gh-2", &NewReading::default()).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn storage_failure_is_reported() {
        let mut store = MockReadingStore::new();
        store
            .expect_insert_reading()
            .times(1)
            .returning(|_, _| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        let service = IngestService::new(Arc::new(store));

        let err = service.ingest("gh-1", &NewReading::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
    }
}

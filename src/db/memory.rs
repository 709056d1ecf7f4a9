use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    models::{NewReading, Reading, Site},
    ReadingStore, StoreError,
};

/// In-memory `ReadingStore` for tests that need real insert/select behaviour.
#[derive(Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<Reading>>,
    sites: Mutex<Vec<Site>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sites(sites: &[(&str, &str)]) -> Self {
        let store = Self::new();
        *store.sites.lock().unwrap() = sites
            .iter()
            .map(|(id, name)| Site {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
            })
            .collect();
        store
    }

    pub fn len(&self) -> usize {
        self.readings.lock().unwrap().len()
    }
}

fn newest_first(a: &Reading, b: &Reading) -> std::cmp::Ordering {
    b.observed_at.cmp(&a.observed_at).then(b.id.cmp(&a.id))
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, site_id: &str, reading: &NewReading) -> Result<i64, StoreError> {
        let mut rows = self.readings.lock().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(Reading {
            id,
            site_id: site_id.to_owned(),
            air_temp: reading.values.air_temp,
            humidity: reading.values.humidity,
            water_temp: reading.values.water_temp,
            turbidity: reading.values.turbidity,
            observed_at: reading.observed_at.unwrap_or_else(Utc::now),
        });
        Ok(id)
    }

    async fn readings_between(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut rows: Vec<_> = self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.site_id == site_id && r.observed_at >= from && r.observed_at <= to)
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    async fn latest_reading(&self, site_id: &str) -> Result<Option<Reading>, StoreError> {
        Ok(self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.site_id == site_id)
            .min_by(|a, b| newest_first(a, b))
            .cloned())
    }

    async fn list_sites(&self) -> Result<Vec<Site>, StoreError> {
        let mut sites = self.sites.lock().unwrap().clone();
        sites.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sites)
    }
}

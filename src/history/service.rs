use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::{
    models::{Reading, Site},
    ReadingStore, StoreError,
};

/// Read side over stored readings: range listing, latest lookup and the
/// site list.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn ReadingStore>,
    default_window: Duration,
}

impl HistoryService {
    pub fn new(store: Arc<dyn ReadingStore>, default_window_days: i64) -> Self {
        Self {
            store,
            default_window: Duration::days(default_window_days),
        }
    }

    /// Readings for `site_id` with `observed_at` in the closed range
    /// `[from, to]`, newest first.
    ///
    /// `from` defaults to `now - default_window`, `to` to `now`.
    pub async fn query(
        &self,
        site_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, StoreError> {
        self.query_at(Utc::now(), site_id, from, to).await
    }

    pub async fn query_at(
        &self,
        now: DateTime<Utc>,
        site_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, StoreError> {
        let from = from.unwrap_or(now - self.default_window);
        let to = to.unwrap_or(now);

        if from > to {
            debug!(site_id = %site_id, %from, %to, "Empty history range");
            return Ok(Vec::new());
        }

        self.store.readings_between(site_id, from, to).await
    }

    pub async fn latest(&self, site_id: &str) -> Result<Option<Reading>, StoreError> {
        self.store.latest_reading(site_id).await
    }

    pub async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        self.store.list_sites().await
    }
}

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::classify::Band;
use crate::{
    db::models::{SensorKind, Site},
    liveness::Liveness,
};

/// A live value as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LiveValue {
    pub value: f64,
    /// Rounded value with unit, e.g. `24.5°C`.
    pub text: String,
    pub band: Band,
}

/// Display state of one sensor channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FieldView {
    pub live: Option<LiveValue>,
    /// `Last: …` text shown while the site is offline.
    pub fallback: Option<String>,
}

/// Everything the dashboard shows for one greenhouse.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SiteView {
    pub site_id: String,
    pub name: Option<String>,
    pub status: Liveness,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub air_temp: FieldView,
    pub humidity: FieldView,
    pub water_temp: FieldView,
    pub turbidity: FieldView,
}

impl SiteView {
    pub fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_owned(),
            name: None,
            status: Liveness::Unknown,
            last_seen_at: None,
            air_temp: FieldView::default(),
            humidity: FieldView::default(),
            water_temp: FieldView::default(),
            turbidity: FieldView::default(),
        }
    }

    pub fn field_mut(&mut self, kind: SensorKind) -> &mut FieldView {
        match kind {
            SensorKind::AirTemp => &mut self.air_temp,
            SensorKind::Humidity => &mut self.humidity,
            SensorKind::WaterTemp => &mut self.water_temp,
            SensorKind::Turbidity => &mut self.turbidity,
        }
    }
}

/// Shared per-site dashboard state, written by the reconciler and read by
/// the HTTP handlers.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
#[derive(Clone, Default)]
pub struct DisplayBoard {
    inner: Arc<RwLock<HashMap<String, SiteView>>>,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known site, or refresh the name of an existing one.
    pub async fn register(&self, site: &Site) {
        let mut guard = self.inner.write().await;
        guard
            .entry(site.id.clone())
            .or_insert_with(|| SiteView::new(&site.id))
            .name = Some(site.name.clone());
    }

    /// Apply `f` to the view of `site_id`, creating it if absent.
    pub async fn update<F>(&self, site_id: &str, f: F)
    where
        F: FnOnce(&mut SiteView),
    {
        let mut guard = self.inner.write().await;
        let view = guard
            .entry(site_id.to_owned())
            .or_insert_with(|| SiteView::new(site_id));
        f(view);
    }

    /// Snapshot of every view, ordered by site id.
    pub async fn all(&self) -> Vec<SiteView> {
        let mut views: Vec<_> = self.inner.read().await.values().cloned().collect();
        views.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        views
    }

    pub async fn get(&self, site_id: &str) -> Option<SiteView> {
        self.inner.read().await.get(site_id).cloned()
    }
}

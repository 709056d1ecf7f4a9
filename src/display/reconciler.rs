use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::{
    board::{DisplayBoard, LiveValue, SiteView},
    classify::{classify, fallback_text, live_text},
};
use crate::{
    db::models::{SensorKind, SensorValues},
    history::HistoryService,
    liveness::{Liveness, LivenessHandle, SiteUpdate},
};

/// Applies liveness updates to the display board.
///
/// Online sites show classified live values; offline sites show the most
/// recent stored reading as `Last: …` fallback text.
#[derive(Clone)]
pub struct Reconciler {
    board: DisplayBoard,
    history: HistoryService,
}

impl Reconciler {
    pub fn new(board: DisplayBoard, history: HistoryService) -> Self {
        Self { board, history }
    }

    /// Consumes liveness updates until `shutdown` flips or the update channel
    /// closes. Spawn this via `tokio::spawn`.
    ///
    /// The board is resynced from the tracker on start and whenever the
    /// update buffer overflowed, so no offline transition is lost.
    pub async fn run(self, liveness: LivenessHandle, mut shutdown: watch::Receiver<bool>) {
        let mut updates = liveness.subscribe();
        info!("Display reconciler started");
        self.resync(&liveness).await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                update = updates.recv() => match update {
                    Ok(update) => self.apply(update).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Display reconciler lagged; resyncing from tracker");
                        self.resync(&liveness).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("Display reconciler stopped");
    }

    /// Re-apply the tracker's current view of every evaluated site.
    ///
    /// Updates still buffered after the snapshot are newer and are applied
    /// afterwards as usual.
    async fn resync(&self, liveness: &LivenessHandle) {
        let Some(sites) = liveness.snapshot().await else {
            return;
        };
        debug!(sites = sites.len(), "Resyncing display board");

        for site in sites {
            match (site.status, site.last_seen_at) {
                (Liveness::Online, Some(at)) => self.mark_online(&site.site_id, at).await,
                (Liveness::Offline, seen) => {
                    if let Some(at) = seen {
                        self.board
                            .update(&site.site_id, |view| record_seen(view, at))
                            .await;
                    }
                    self.on_offline(&site.site_id).await;
                }
                _ => {}
            }
        }
    }

    pub async fn apply(&self, update: SiteUpdate) {
        debug!(site_id = %update.site_id(), "Applying site update");
        match update {
            SiteUpdate::Online { site_id, at } => self.mark_online(&site_id, at).await,
            SiteUpdate::Live { site_id, values, at } => {
                self.mark_online(&site_id, at).await;
                self.on_online(&site_id, &values).await;
            }
            SiteUpdate::Offline { site_id, .. } => self.on_offline(&site_id).await,
        }
    }

    async fn mark_online(&self, site_id: &str, at: DateTime<Utc>) {
        self.board
            .update(site_id, |view| {
                view.status = Liveness::Online;
                record_seen(view, at);
            })
            .await;
    }

    /// Clear fallback text and render the live values present in `values`.
    /// Fields absent from `values` keep their previous live value.
    pub async fn on_online(&self, site_id: &str, values: &SensorValues) {
        self.board
            .update(site_id, |view| {
                view.status = Liveness::Online;
                for kind in SensorKind::ALL {
                    view.field_mut(kind).fallback = None;
                }
                for (kind, value) in values.present() {
                    view.field_mut(kind).live = Some(LiveValue {
                        value,
                        text: live_text(kind, value),
                        band: classify(kind, value),
                    });
                }
            })
            .await;
    }

    /// Replace live values with the most recent stored reading.
    ///
    /// Without history the fallback stays blank. A failed lookup leaves the
    /// previous values on display.
    pub async fn on_offline(&self, site_id: &str) {
        self.board
            .update(site_id, |view| view.status = Liveness::Offline)
            .await;

        let latest = match self.history.latest(site_id).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(site_id = %site_id, error = %e, "Fallback lookup failed; keeping previous display");
                return;
            }
        };

        self.board
            .update(site_id, |view| {
                for kind in SensorKind::ALL {
                    let field = view.field_mut(kind);
                    field.live = None;
                    field.fallback = latest.as_ref().and_then(|reading| {
                        reading
                            .values()
                            .get(kind)
                            .map(|value| fallback_text(kind, value, reading.observed_at))
                    });
                }
            })
            .await;

        match latest {
            Some(reading) => debug!(site_id = %site_id, reading_id = reading.id, "Showing last known reading"),
            None => debug!(site_id = %site_id, "No stored reading to fall back to"),
        }
    }
}

fn record_seen(view: &mut SiteView, at: DateTime<Utc>) {
    view.last_seen_at = Some(view.last_seen_at.map_or(at, |seen| seen.max(at)));
}

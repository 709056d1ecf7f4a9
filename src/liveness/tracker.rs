use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::OfflineNotify;

/// Derived freshness of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Known but never evaluated (cold start).
    #[default]
    Unknown,
    Online,
    Offline,
}

/// A status change emitted by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub site_id: String,
    pub status: Liveness,
    pub at: DateTime<Utc>,
}

/// Last evaluated state of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatus {
    pub site_id: String,
    pub status: Liveness,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Record {
    last_seen_at: Option<DateTime<Utc>>,
    status: Liveness,
}

/// Per-site freshness state.
///
/// A site is online iff `now - last_seen_at < timeout`. Records are created
/// on first event (or `watch`) and never removed. Nothing is persisted, so
/// every site starts unknown after a restart.
#[derive(Debug)]
pub struct LivenessTracker {
    timeout: Duration,
    notify: OfflineNotify,
    sites: BTreeMap<String, Record>,
}

impl LivenessTracker {
    pub fn new(timeout: Duration, notify: OfflineNotify) -> Self {
        Self {
            timeout,
            notify,
            sites: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record an observed message for `site_id` at `at`.
    ///
    /// `last_seen_at` only moves forward, so replaying an event is a no-op.
    /// Returns an `Online` change when the site was unknown, offline or stale.
    pub fn on_event(&mut self, site_id: &str, at: DateTime<Utc>) -> Option<StatusChange> {
        let timeout = self.timeout;
        let record = self.sites.entry(site_id.to_owned()).or_default();

        let was_fresh = record.status == Liveness::Online
            && record.last_seen_at.is_some_and(|seen| at - seen < timeout);

        record.last_seen_at = Some(match record.last_seen_at {
            Some(seen) if seen > at => seen,
            _ => at,
        });
        record.status = Liveness::Online;

        (!was_fresh).then(|| StatusChange {
            site_id: site_id.to_owned(),
            status: Liveness::Online,
            at,
        })
    }

    /// Register `site_id` for evaluation without observing it.
    ///
    /// Returns `true` if the site was not known before.
    pub fn watch(&mut self, site_id: &str) -> bool {
        if self.sites.contains_key(site_id) {
            return false;
        }
        self.sites.insert(site_id.to_owned(), Record::default());
        true
    }

    /// Re-evaluate every known site against `now`.
    ///
    /// With `OfflineNotify::Once`, offline is reported once per transition;
    /// with `EveryTick`, on every call while the site stays offline.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<StatusChange> {
        let mut changes = Vec::new();

        for (site_id, record) in &mut self.sites {
            let online = is_online(record.last_seen_at, now, self.timeout);
            let status = if online { Liveness::Online } else { Liveness::Offline };

            let report = match (status, self.notify) {
                (Liveness::Offline, OfflineNotify::EveryTick) => true,
                _ => record.status != status,
            };
            record.status = status;

            if report {
                changes.push(StatusChange {
                    site_id: site_id.clone(),
                    status,
                    at: now,
                });
            }
        }

        changes
    }

    pub fn last_seen_at(&self, site_id: &str) -> Option<DateTime<Utc>> {
        self.sites.get(site_id).and_then(|r| r.last_seen_at)
    }

    /// State of every known site as of the last event or tick, ordered by
    /// site id. Lets consumers that missed status changes catch up.
    pub fn snapshot(&self) -> Vec<SiteStatus> {
        self.sites
            .iter()
            .map(|(site_id, record)| SiteStatus {
                site_id: site_id.clone(),
                status: record.status,
                last_seen_at: record.last_seen_at,
            })
            .collect()
    }
}

fn is_online(last_seen_at: Option<DateTime<Utc>>, now: DateTime<Utc>, timeout: Duration) -> bool {
    last_seen_at.is_some_and(|seen| now - seen < timeout)
}

#[cfg(test)]
impl LivenessTracker {
    /// Freshness of `site_id` as of `now`, computed without mutating state.
    fn status(&self, site_id: &str, now: DateTime<Utc>) -> Liveness {
        match self.sites.get(site_id) {
            None => Liveness::Unknown,
            Some(record) if is_online(record.last_seen_at, now, self.timeout) => Liveness::Online,
            Some(_) => Liveness::Offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_714_550_400_000 + ms).unwrap()
    }

    fn tracker(notify: OfflineNotify) -> LivenessTracker {
        LivenessTracker::new(Duration::milliseconds(5000), notify)
    }

    fn statuses(changes: &[StatusChange]) -> Vec<(&str, Liveness)> {
        changes.iter().map(|c| (c.site_id.as_str(), c.status)).collect()
    }

    #[test]
    fn never_observed_sites_are_never_online() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.watch("gh-1");
        tr.watch("gh-2");

        for ms in [0, 999, 5000, 100_000] {
            for change in tr.tick(t(ms)) {
                assert_eq!(change.status, Liveness::Offline);
            }
            assert_eq!(tr.status("gh-1", t(ms)), Liveness::Offline);
        }
        assert_eq!(tr.status("never-watched", t(0)), Liveness::Unknown);
    }

    #[test]
    fn online_strictly_before_timeout_offline_at_timeout() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(0));

        for ms in [0, 1, 2500, 4999] {
            assert_eq!(tr.status("gh-1", t(ms)), Liveness::Online, "at {ms}ms");
        }
        for ms in [5000, 5001, 60_000] {
            assert_eq!(tr.status("gh-1", t(ms)), Liveness::Offline, "at {ms}ms");
        }
    }

    #[test]
    fn first_event_reports_online_and_repeat_does_not() {
        let mut tr = tracker(OfflineNotify::Once);

        let first = tr.on_event("gh-1", t(0)).unwrap();
        assert_eq!(first.status, Liveness::Online);
        assert_eq!(first.site_id, "gh-1");

        assert!(tr.on_event("gh-1", t(1000)).is_none());
    }

    #[test]
    fn replaying_the_same_event_is_idempotent() {
        let mut once = tracker(OfflineNotify::Once);
        once.on_event("gh-1", t(100));

        let mut twice = tracker(OfflineNotify::Once);
        twice.on_event("gh-1", t(100));
        assert!(twice.on_event("gh-1", t(100)).is_none());

        assert_eq!(once.last_seen_at("gh-1"), twice.last_seen_at("gh-1"));
        for ms in [100, 5099, 5100] {
            assert_eq!(once.status("gh-1", t(ms)), twice.status("gh-1", t(ms)));
        }
        assert_eq!(once.tick(t(5100)), twice.tick(t(5100)));
    }

    #[test]
    fn older_event_does_not_move_last_seen_backwards() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(3000));
        tr.on_event("gh-1", t(1000));
        assert_eq!(tr.last_seen_at("gh-1"), Some(t(3000)));
    }

    #[test]
    fn offline_fires_once_per_transition() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(0));

        assert!(tr.tick(t(1000)).is_empty());
        assert!(tr.tick(t(4999)).is_empty());
        assert_eq!(statuses(&tr.tick(t(5000))), vec![("gh-1", Liveness::Offline)]);
        assert!(tr.tick(t(6000)).is_empty());
        assert!(tr.tick(t(7000)).is_empty());

        // Back online, then silent again: a second transition.
        assert!(tr.on_event("gh-1", t(8000)).is_some());
        assert!(tr.tick(t(9000)).is_empty());
        assert_eq!(statuses(&tr.tick(t(13_000))), vec![("gh-1", Liveness::Offline)]);
    }

    #[test]
    fn every_tick_policy_refires_while_offline() {
        let mut tr = tracker(OfflineNotify::EveryTick);
        tr.on_event("gh-1", t(0));

        assert!(tr.tick(t(4000)).is_empty());
        for ms in [5000, 6000, 7000] {
            assert_eq!(statuses(&tr.tick(t(ms))), vec![("gh-1", Liveness::Offline)]);
        }
    }

    #[test]
    fn stale_site_event_reports_online_again() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(0));
        // No tick ran in between; the event itself notices the staleness.
        assert!(tr.on_event("gh-1", t(7000)).is_some());
    }

    #[test]
    fn watched_site_goes_unknown_to_offline_once() {
        let mut tr = tracker(OfflineNotify::Once);
        assert!(tr.watch("gh-1"));
        assert!(!tr.watch("gh-1"));

        assert_eq!(statuses(&tr.tick(t(0))), vec![("gh-1", Liveness::Offline)]);
        assert!(tr.tick(t(1000)).is_empty());
    }

    #[test]
    fn watch_does_not_reset_an_observed_site() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(0));
        assert!(!tr.watch("gh-1"));
        assert_eq!(tr.last_seen_at("gh-1"), Some(t(0)));
    }

    #[test]
    fn sites_are_independent() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.on_event("gh-1", t(0));
        tr.on_event("gh-2", t(3000));

        assert_eq!(statuses(&tr.tick(t(5000))), vec![("gh-1", Liveness::Offline)]);
        assert_eq!(tr.status("gh-2", t(5000)), Liveness::Online);
        assert_eq!(statuses(&tr.tick(t(8000))), vec![("gh-2", Liveness::Offline)]);
        let ids: Vec<_> = tr.snapshot().into_iter().map(|s| s.site_id).collect();
        assert_eq!(ids, vec!["gh-1", "gh-2"]);
    }

    #[test]
    fn snapshot_reports_last_evaluated_status() {
        let mut tr = tracker(OfflineNotify::Once);
        tr.watch("gh-1");
        tr.on_event("gh-2", t(0));
        tr.watch("gh-3");
        tr.tick(t(1000));
        tr.watch("gh-4");

        assert_eq!(
            tr.snapshot(),
            vec![
                SiteStatus { site_id: "gh-1".into(), status: Liveness::Offline, last_seen_at: None },
                SiteStatus { site_id: "gh-2".into(), status: Liveness::Online, last_seen_at: Some(t(0)) },
                SiteStatus { site_id: "gh-3".into(), status: Liveness::Offline, last_seen_at: None },
                SiteStatus { site_id: "gh-4".into(), status: Liveness::Unknown, last_seen_at: None },
            ]
        );
    }
}

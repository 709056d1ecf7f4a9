use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::tracker::{Liveness, LivenessTracker, SiteStatus, StatusChange};
use crate::db::models::SensorValues;

const COMMAND_CAPACITY: usize = 1024;
const UPDATE_CAPACITY: usize = 256;

/// What the liveness actor publishes to display-side consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteUpdate {
    Online {
        site_id: String,
        at: DateTime<Utc>,
    },
    Offline {
        site_id: String,
        at: DateTime<Utc>,
    },
    /// Live values carried by a heartbeat.
    Live {
        site_id: String,
        values: SensorValues,
        at: DateTime<Utc>,
    },
}

impl SiteUpdate {
    pub fn site_id(&self) -> &str {
        match self {
            SiteUpdate::Online { site_id, .. }
            | SiteUpdate::Offline { site_id, .. }
            | SiteUpdate::Live { site_id, .. } => site_id,
        }
    }
}

impl From<StatusChange> for SiteUpdate {
    fn from(change: StatusChange) -> Self {
        match change.status {
            Liveness::Online => SiteUpdate::Online {
                site_id: change.site_id,
                at: change.at,
            },
            Liveness::Offline | Liveness::Unknown => SiteUpdate::Offline {
                site_id: change.site_id,
                at: change.at,
            },
        }
    }
}

#[derive(Debug)]
enum Command {
    Heartbeat {
        site_id: String,
        values: SensorValues,
        at: DateTime<Utc>,
    },
    Watch {
        site_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<SiteStatus>>,
    },
}

/// Cloneable sender side of the liveness actor.
#[derive(Debug, Clone)]
pub struct LivenessHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<SiteUpdate>,
}

impl LivenessHandle {
    /// Queue a heartbeat that arrived at `at`.
    pub async fn heartbeat(&self, site_id: &str, values: SensorValues, at: DateTime<Utc>) {
        let cmd = Command::Heartbeat {
            site_id: site_id.to_owned(),
            values,
            at,
        };
        if self.commands.send(cmd).await.is_err() {
            warn!(site_id = %site_id, "Liveness actor stopped; heartbeat dropped");
        }
    }

    /// Start evaluating `site_id` even if it never sends a heartbeat.
    pub async fn watch(&self, site_id: &str) {
        let cmd = Command::Watch {
            site_id: site_id.to_owned(),
        };
        if self.commands.send(cmd).await.is_err() {
            warn!(site_id = %site_id, "Liveness actor stopped; watch request dropped");
        }
    }

    /// Current state of every known site, or `None` once the actor stopped.
    ///
    /// Update subscribers that lagged use this to recover the transitions
    /// they missed.
    pub async fn snapshot(&self) -> Option<Vec<SiteStatus>> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }

    /// Updates are delivered through a bounded buffer; a receiver that falls
    /// behind gets `RecvError::Lagged` and should resync via `snapshot`.
    pub fn subscribe(&self) -> broadcast::Receiver<SiteUpdate> {
        self.updates.subscribe()
    }
}

/// Owns the `LivenessTracker` and drains two inputs: queued commands and a
/// fixed-period timer. All tracker mutation happens on this task.
pub struct LivenessActor {
    tracker: LivenessTracker,
    commands: mpsc::Receiver<Command>,
    updates: broadcast::Sender<SiteUpdate>,
    tick_every: StdDuration,
}

impl LivenessActor {
    pub fn new(tracker: LivenessTracker, tick_every: StdDuration) -> (Self, LivenessHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        let handle = LivenessHandle {
            commands: cmd_tx,
            updates: updates.clone(),
        };
        let actor = Self {
            tracker,
            commands: cmd_rx,
            updates,
            tick_every,
        };
        (actor, handle)
    }

    /// Runs until `shutdown` flips to `true` or every handle is dropped.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_ms = self.tick_every.as_millis() as u64,
            timeout_ms = self.tracker.timeout().num_milliseconds(),
            "Liveness loop started"
        );
        let mut ticker = time::interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = ticker.tick() => self.tick(Utc::now()),
            }
        }

        info!("Liveness loop stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Heartbeat { site_id, values, at } => {
                if let Some(change) = self.tracker.on_event(&site_id, at) {
                    info!(site_id = %site_id, "Site online");
                    self.publish(change.into());
                }
                self.publish(SiteUpdate::Live { site_id, values, at });
            }
            Command::Watch { site_id } => {
                if self.tracker.watch(&site_id) {
                    debug!(site_id = %site_id, "Watching site");
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.tracker.snapshot());
            }
        }
    }

    fn tick(&mut self, now: DateTime<Utc>) {
        for change in self.tracker.tick(now) {
            if change.status == Liveness::Offline {
                debug!(site_id = %change.site_id, last_seen_at = ?self.tracker.last_seen_at(&change.site_id), "Site offline");
            }
            self.publish(change.into());
        }
    }

    fn publish(&self, update: SiteUpdate) {
        // No subscribers is fine: nobody is displaying anything yet.
        let _ = self.updates.send(update);
    }
}

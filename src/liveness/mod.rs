//! Per-site freshness tracking.
//!
//! `tracker` holds the pure state machine; `actor` drives it from a command
//! channel and a fixed-period timer.

mod actor;
mod tracker;

pub use actor::{LivenessActor, LivenessHandle, SiteUpdate};
pub use tracker::{Liveness, LivenessTracker, SiteStatus, StatusChange};

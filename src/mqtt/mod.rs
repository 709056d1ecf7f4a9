//! Inbound heartbeat stream from the broker.

mod payload;
mod subscriber;
mod topic;

pub use payload::{parse_heartbeat, Heartbeat, PayloadError};
pub use subscriber::{HeartbeatRouter, MqttSubscriber};
pub use topic::{TopicError, TopicPattern};

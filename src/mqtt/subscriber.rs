use std::time::Duration;

use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{payload::parse_heartbeat, topic::TopicPattern};
use crate::{
    config::MqttConfig,
    db::models::NewReading,
    ingest::IngestService,
    liveness::LivenessHandle,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 10;

/// Routes one inbound message: topic → site id, payload → heartbeat, then
/// liveness and a best-effort copy into storage.
#[derive(Clone)]
pub struct HeartbeatRouter {
    topic: TopicPattern,
    liveness: LivenessHandle,
    ingest: IngestService,
}

impl HeartbeatRouter {
    pub fn new(topic: TopicPattern, liveness: LivenessHandle, ingest: IngestService) -> Self {
        Self {
            topic,
            liveness,
            ingest,
        }
    }

    pub fn topic(&self) -> &TopicPattern {
        &self.topic
    }

    /// Handle a message that arrived at `arrived_at`.
    ///
    /// Returns `false` when the message was dropped. Dropped messages never
    /// reach the liveness tracker.
    pub async fn handle(&self, topic: &str, payload: &[u8], arrived_at: DateTime<Utc>) -> bool {
        let Some(site_id) = self.topic.site_id(topic) else {
            warn!(topic = %topic, pattern = %self.topic, "Message on unexpected topic dropped");
            return false;
        };

        let heartbeat = match parse_heartbeat(payload) {
            Ok(hb) => hb,
            Err(e) => {
                warn!(site_id = %site_id, error = %e, "Malformed heartbeat dropped");
                return false;
            }
        };

        if heartbeat.values.is_empty() {
            debug!(site_id = %site_id, "Bare heartbeat received");
        } else {
            debug!(site_id = %site_id, values = ?heartbeat.values, "Heartbeat received");
        }
        self.liveness
            .heartbeat(site_id, heartbeat.values, arrived_at)
            .await;

        let reading = NewReading {
            values: heartbeat.values,
            observed_at: Some(heartbeat.observed_at.unwrap_or(arrived_at)),
        };
        let ingest = self.ingest.clone();
        let site_id = site_id.to_owned();
        tokio::spawn(async move {
            if let Err(e) = ingest.ingest(&site_id, &reading).await {
                warn!(site_id = %site_id, error = %e, "Forwarding heartbeat to storage failed");
            }
        });

        true
    }
}

/// Broker connection that feeds a `HeartbeatRouter`.
pub struct MqttSubscriber {
    options: MqttOptions,
    router: HeartbeatRouter,
}

impl MqttSubscriber {
    pub fn new(config: &MqttConfig, router: HeartbeatRouter) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(5));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or_default());
        }
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        Self { options, router }
    }

    /// Runs the event loop until `shutdown` flips.
    ///
    /// rumqttc reconnects on the next poll after an error; the subscription is
    /// re-issued on every ConnAck. Spawn this via `tokio::spawn`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let (broker_host, broker_port) = self.options.broker_address();
        info!(host = %broker_host, port = broker_port, topic = %self.router.topic(), "MQTT subscriber started");

        let (client, mut eventloop) = AsyncClient::new(self.options, REQUEST_CAPACITY);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                        if let Err(e) = client.try_subscribe(self.router.topic().as_str(), QoS::AtLeastOnce) {
                            warn!(error = %e, "MQTT subscribe request failed");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.router
                            .handle(&publish.topic, &publish.payload, Utc::now())
                            .await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "MQTT connection error; reconnecting");
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                },
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request failed");
        }
        info!("MQTT subscriber stopped");
    }
}

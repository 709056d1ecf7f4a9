use std::str::FromStr;

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// OfflineNotify
// ---------------------------------------------------------------------------

/// How often an offline site is reported by the liveness tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflineNotify {
    /// Once per online→offline transition.
    #[default]
    Once,
    /// On every tick while the site stays offline.
    EveryTick,
}

impl FromStr for OfflineNotify {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "once" => Ok(Self::Once),
            "every_tick" => Ok(Self::EveryTick),
            other => Err(anyhow::anyhow!("unknown offline notify mode: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub mqtt: MqttConfig,
    /// A site is offline once this long has passed since its last heartbeat.
    pub liveness_timeout_ms: u64,
    /// Liveness re-evaluation period.
    pub liveness_tick_ms: u64,
    pub offline_notify: OfflineNotify,
    /// Width of the history window when `date_from` is omitted.
    pub history_default_days: i64,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    /// Must contain exactly one `+` segment, which carries the site id.
    pub topic: String,
    pub client_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let liveness_tick_ms = positive("LIVENESS_TICK_MS", "1000")?;
        let liveness_timeout_ms = positive("LIVENESS_TIMEOUT_MS", "5000")?;
        if liveness_timeout_ms < liveness_tick_ms {
            anyhow::bail!(
                "LIVENESS_TIMEOUT_MS ({liveness_timeout_ms}) must not be shorter than \
                 LIVENESS_TICK_MS ({liveness_tick_ms})"
            );
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            mqtt: MqttConfig::from_env()?,
            liveness_timeout_ms,
            liveness_tick_ms,
            offline_notify: optional("OFFLINE_NOTIFY", "once")
                .parse()
                .context("OFFLINE_NOTIFY must be 'once' or 'every_tick'")?,
            history_default_days: positive("HISTORY_DEFAULT_DAYS", "7")? as i64,
        })
    }
}

impl MqttConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: required("MQTT_HOST")?,
            port: optional("MQTT_PORT", "1883")
                .parse()
                .context("MQTT_PORT must be a valid port number")?,
            username: std::env::var("MQTT_USERNAME").ok(),
            password: std::env::var("MQTT_PASSWORD").ok(),
            tls: parse_bool(&optional("MQTT_TLS", "false"))
                .context("MQTT_TLS must be a boolean")?,
            topic: optional("MQTT_TOPIC", "greenhouses/+/heartbeat"),
            client_id: std::env::var("MQTT_CLIENT_ID")
                .unwrap_or_else(|_| format!("greenhouse-monitor-{}", uuid::Uuid::new_v4().simple())),
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {other:?}")),
    }
}

fn positive(key: &str, default: &str) -> Result<u64> {
    let value: u64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    if value == 0 {
        anyhow::bail!("{key} must be a positive integer");
    }
    Ok(value)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    db::models::{SensorKind, SensorValues},
    time::parse_timestamp,
};

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("field {field} is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },
    #[error("unparsable timestamp in {field}: {value}")]
    Timestamp { field: &'static str, value: String },
}

/// A decoded heartbeat message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heartbeat {
    pub values: SensorValues,
    /// Device-side timestamp, when the device sends one.
    pub observed_at: Option<DateTime<Utc>>,
}

fn field_names(kind: SensorKind) -> &'static [&'static str] {
    match kind {
        SensorKind::AirTemp => &["air_temp", "dht_temp"],
        SensorKind::Humidity => &["humidity", "dht_hum"],
        SensorKind::WaterTemp => &["water_temp"],
        SensorKind::Turbidity => &["turbidity"],
    }
}

const TIMESTAMP_FIELDS: [&str; 2] = ["observed_at", "created_at"];

/// Decode a heartbeat payload.
///
/// An empty payload is a bare heartbeat. Otherwise the payload must be a JSON
/// object whose sensor fields are numbers, numeric strings or `null`.
pub fn parse_heartbeat(bytes: &[u8]) -> Result<Heartbeat, PayloadError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Heartbeat::default());
    }

    let Value::Object(obj) = serde_json::from_slice::<Value>(bytes)? else {
        return Err(PayloadError::NotAnObject);
    };

    let mut values = SensorValues::default();
    for kind in SensorKind::ALL {
        if let Some((field, raw)) = first_present(&obj, field_names(kind)) {
            values.set(kind, numeric(field, raw)?);
        }
    }

    let observed_at = match first_present(&obj, &TIMESTAMP_FIELDS) {
        None => None,
        Some((field, Value::String(s))) => Some(parse_timestamp(s).ok_or_else(|| {
            PayloadError::Timestamp {
                field,
                value: s.clone(),
            }
        })?),
        Some((field, other)) => {
            return Err(PayloadError::Timestamp {
                field,
                value: other.to_string(),
            })
        }
    };

    Ok(Heartbeat {
        values,
        observed_at,
    })
}

/// First of `names` present with a non-null value.
fn first_present<'a>(
    obj: &'a Map<String, Value>,
    names: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    names
        .iter()
        .find_map(|name| obj.get(*name).filter(|v| !v.is_null()).map(|v| (*name, v)))
}

fn numeric(field: &'static str, raw: &Value) -> Result<Option<f64>, PayloadError> {
    let parsed = match raw {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(PayloadError::NotNumeric {
            field,
            value: raw.to_string(),
        }),
    }
}

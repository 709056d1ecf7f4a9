use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::SensorKind;

/// Comfort band of a sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Normal,
    High,
    /// The value was not a finite number.
    Unclassified,
}

/// Classify `value` against the fixed thresholds for `kind`.
///
/// | kind       | low  | normal | high      |
/// |------------|------|--------|-----------|
/// | air_temp   | < 18 | 18–30  | > 30      |
/// | humidity   | n/a  | 40–70  | otherwise |
/// | water_temp | < 20 | 20–28  | > 28      |
/// | turbidity  | < 1  | 1–5    | > 5       |
///
/// Both ends of every normal range are inclusive.
pub fn classify(kind: SensorKind, value: f64) -> Band {
    if !value.is_finite() {
        return Band::Unclassified;
    }

    match kind {
        SensorKind::AirTemp => banded(value, 18.0, 30.0),
        SensorKind::Humidity if (40.0..=70.0).contains(&value) => Band::Normal,
        SensorKind::Humidity => Band::High,
        SensorKind::WaterTemp => banded(value, 20.0, 28.0),
        SensorKind::Turbidity => banded(value, 1.0, 5.0),
    }
}

fn banded(value: f64, low: f64, high: f64) -> Band {
    if value < low {
        Band::Low
    } else if value <= high {
        Band::Normal
    } else {
        Band::High
    }
}

/// Round to two decimals and drop trailing zeros (`21.456` → `21.46`, `21.0` → `21`).
pub fn format_value(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Live text for a value, e.g. `24.5°C`.
pub fn live_text(kind: SensorKind, value: f64) -> String {
    format!("{}{}", format_value(value), kind.unit())
}

/// Fallback text for an offline site, e.g. `Last: 24.5°C (01 May 10:00)`.
pub fn fallback_text(kind: SensorKind, value: f64, observed_at: DateTime<Utc>) -> String {
    format!(
        "Last: {}{} ({})",
        format_value(value),
        kind.unit(),
        observed_at.format("%d %b %H:%M")
    )
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::Reading;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    pub site_id: String,
    /// Degrees Celsius
    pub air_temp: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// Degrees Celsius
    pub water_temp: Option<f64>,
    pub turbidity: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            site_id: r.site_id,
            air_temp: r.air_temp,
            humidity: r.humidity,
            water_temp: r.water_temp,
            turbidity: r.turbidity,
            observed_at: r.observed_at,
        }
    }
}

/// Response for `POST /api/sensor/{greenhouse_id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub success: bool,
    /// Assigned reading id.
    pub id: i64,
}

/// Query for `GET /api/greenhouses/history`.
///
/// Dates accept RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Greenhouse id.
    pub gh: Option<String>,
    /// Start of range, inclusive. Defaults to seven days ago.
    pub date_from: Option<String>,
    /// End of range, inclusive. Defaults to now; a bare date means end of day.
    pub date_to: Option<String>,
}

/// Query for `GET /api/greenhouses/history/latest`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestParams {
    /// Greenhouse id.
    pub gh: Option<String>,
}

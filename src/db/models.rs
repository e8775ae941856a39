use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One persisted decision epoch: the inside reading, the outside snapshot it
/// was judged against, the derived quantities, and the relay outcome.
/// Immutable after insert.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Degrees Celsius
    pub temperature_in: f64,
    /// Relative humidity percentage
    pub humidity_in: f64,
    pub dew_point_in: f64,
    pub heat_index_in: f64,
    pub temperature_out: Option<f64>,
    pub humidity_out: Option<f64>,
    /// Hectopascals
    pub pressure_out: Option<f64>,
    pub wind_speed_out: Option<f64>,
    pub dew_point_out: Option<f64>,
    /// WMO weather interpretation code
    pub weather_condition: Option<i32>,
    pub weather_source: String,
    pub relay_state: String,
    pub relay_reason: String,
    pub location: String,
}

/// Insert shape for `environment_data`; `id` and `recorded_at` come from
/// column defaults.
#[derive(Debug, Clone)]
pub struct NewEnvironmentRecord {
    pub temperature_in: f64,
    pub humidity_in: f64,
    pub dew_point_in: f64,
    pub heat_index_in: f64,
    pub temperature_out: Option<f64>,
    pub humidity_out: Option<f64>,
    pub pressure_out: Option<f64>,
    pub wind_speed_out: Option<f64>,
    pub dew_point_out: Option<f64>,
    pub weather_condition: Option<i32>,
    pub weather_source: String,
    pub relay_state: String,
    pub relay_reason: String,
    pub location: String,
}

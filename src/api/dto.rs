use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    alarm::AlarmState,
    control::relay::{RelayMode, RelayState},
    db::models::EnvironmentRecord,
    sensors::EpochOutcome,
    state::{ArmedStatus, RelayStatus},
};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Raw sensor submission; fields are optional so that missing values can be
/// rejected as invalid input rather than as a deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SensorReadingRequest {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage, 0..=100
    pub humidity: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RelayCommandRequest {
    pub state: RelayState,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RelayModeRequest {
    pub mode: RelayMode,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ServerConfigUpdateRequest {
    pub read_interval_ms: Option<u64>,
    pub humidity_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MotionEventRequest {
    /// 1 = motion detected, 0 = motion stopped
    pub motion: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetArmedRequest {
    pub armed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisarmTimedRequest {
    pub minutes: Option<f64>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorDecisionDto {
    pub relay_state: RelayState,
    pub relay_reason: String,
    pub dew_point_in: f64,
    pub heat_index_in: f64,
}

impl From<EpochOutcome> for SensorDecisionDto {
    fn from(o: EpochOutcome) -> Self {
        Self {
            relay_state: o.relay_state,
            relay_reason: o.relay_reason,
            dew_point_in: o.dew_point_in,
            heat_index_in: o.heat_index_in,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RelayStatusDto {
    pub state: RelayState,
    pub mode: RelayMode,
    pub reason: String,
}

impl From<RelayStatus> for RelayStatusDto {
    fn from(s: RelayStatus) -> Self {
        Self {
            state: s.state,
            mode: s.mode,
            reason: s.reason,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RelayModeDto {
    pub mode: RelayMode,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MotionAckDto {
    pub motion_detected: bool,
    pub alarm_state: AlarmState,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlarmStateDto {
    pub state: AlarmState,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArmedStatusDto {
    pub armed: bool,
    /// Pending auto-rearm deadline, if a timed disarm is active.
    pub auto_arm_at: Option<DateTime<Utc>>,
}

impl From<ArmedStatus> for ArmedStatusDto {
    fn from(s: ArmedStatus) -> Self {
        Self {
            armed: s.armed,
            auto_arm_at: s.auto_arm_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnvironmentRecordDto {
    pub id: uuid::Uuid,
    pub recorded_at: DateTime<Utc>,
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

impl From<EnvironmentRecord> for EnvironmentRecordDto {
    fn from(r: EnvironmentRecord) -> Self {
        Self {
            id: r.id,
            recorded_at: r.recorded_at,
            temperature_in: r.temperature_in,
            humidity_in: r.humidity_in,
            dew_point_in: r.dew_point_in,
            heat_index_in: r.heat_index_in,
            temperature_out: r.temperature_out,
            humidity_out: r.humidity_out,
            pressure_out: r.pressure_out,
            wind_speed_out: r.wind_speed_out,
            dew_point_out: r.dew_point_out,
            weather_condition: r.weather_condition,
            weather_source: r.weather_source,
            relay_state: r.relay_state,
            relay_reason: r.relay_reason,
            location: r.location,
        }
    }
}

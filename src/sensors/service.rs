use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{error, info};

use crate::{
    control::climate,
    control::relay::{InsideReading, RelayState},
    db::models::NewEnvironmentRecord,
    state::SharedState,
    weather::{self, WeatherClient},
};

/// Per-epoch orchestration: takes a validated inside reading through the
/// weather snapshot, the relay decision, and the append log.
#[derive(Clone)]
pub struct SensorService {
    pool: PgPool,
    weather: WeatherClient,
    state: SharedState,
    location: String,
}

/// What the caller gets back from one decision epoch.
#[derive(Debug, Clone)]
pub struct EpochOutcome {
    pub relay_state: RelayState,
    pub relay_reason: String,
    pub dew_point_in: f64,
    pub heat_index_in: f64,
}

impl SensorService {
    pub fn new(pool: PgPool, weather: WeatherClient, state: SharedState, location: String) -> Self {
        Self {
            pool,
            weather,
            state,
            location,
        }
    }

    /// Runs one decision epoch. The reading must already be validated
    /// (humidity within 0..=100). Persistence is fire-and-forget: an insert
    /// failure is logged and the decision stands.
    pub async fn submit_reading(&self, inside: InsideReading) -> EpochOutcome {
        let outside = self.weather.get().await;

        let dew_point_in = climate::dew_point(inside.temperature, inside.humidity);
        let heat_index_in = climate::heat_index(inside.temperature, inside.humidity);
        let dew_point_out = match (outside.temperature, outside.humidity) {
            (Some(t), Some(h)) => Some(climate::dew_point(t, h)),
            _ => None,
        };

        let decision = self.state.decide(&inside, &outside).await;
        info!(
            humidity_in = inside.humidity,
            temperature_in = inside.temperature,
            relay_state = %decision.state,
            reason = %decision.reason,
            "Decision epoch evaluated"
        );

        let record = NewEnvironmentRecord {
            temperature_in: inside.temperature,
            humidity_in: inside.humidity,
            dew_point_in,
            heat_index_in,
            temperature_out: outside.temperature,
            humidity_out: outside.humidity,
            pressure_out: outside.pressure,
            wind_speed_out: outside.wind_speed,
            dew_point_out,
            weather_condition: outside.condition,
            weather_source: weather::SOURCE.to_owned(),
            relay_state: decision.state.to_string(),
            relay_reason: decision.reason.clone(),
            location: self.location.clone(),
        };

        if let Err(e) = self.persist(&record).await {
            error!(error = %e, "Failed to persist decision epoch");
        }

        EpochOutcome {
            relay_state: decision.state,
            relay_reason: decision.reason,
            dew_point_in,
            heat_index_in,
        }
    }

    async fn persist(&self, record: &NewEnvironmentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO environment_data
                (temperature_in, humidity_in, dew_point_in, heat_index_in,
                 temperature_out, humidity_out, pressure_out, wind_speed_out,
                 dew_point_out, weather_condition, weather_source,
                 relay_state, relay_reason, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.temperature_in)
        .bind(record.humidity_in)
        .bind(record.dew_point_in)
        .bind(record.heat_index_in)
        .bind(record.temperature_out)
        .bind(record.humidity_out)
        .bind(record.pressure_out)
        .bind(record.wind_speed_out)
        .bind(record.dew_point_out)
        .bind(record.weather_condition)
        .bind(&record.weather_source)
        .bind(&record.relay_state)
        .bind(&record.relay_reason)
        .bind(&record.location)
        .execute(&self.pool)
        .await
        .context("insert into environment_data failed")?;

        Ok(())
    }
}

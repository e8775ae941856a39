//! Outside-weather snapshot with a TTL cache.
//!
//! `get` never fails: a fetch or decode error is logged and yields the
//! all-`None` snapshot, so losing outside context can only ever suppress a
//! relay ON decision, never block an OFF one. Failures are not cached.

pub mod models;

use std::{sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use models::{CurrentConditions, ForecastResponse};

/// Tag written into each decision epoch's `weather_source` column.
pub const SOURCE: &str = "Open-Meteo";

/// Snapshots are reused for up to an hour before a refresh is attempted.
pub const CACHE_TTL_MS: i64 = 60 * 60 * 1000;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,surface_pressure,wind_speed_10m,weather_code";

const FETCH_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Outside conditions as last observed. All-`None` when the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct OutsideSnapshot {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    /// WMO weather interpretation code.
    pub condition: Option<i32>,
}

impl From<CurrentConditions> for OutsideSnapshot {
    fn from(c: CurrentConditions) -> Self {
        Self {
            temperature: c.temperature_2m,
            humidity: c.relative_humidity_2m,
            pressure: c.surface_pressure,
            wind_speed: c.wind_speed_10m,
            condition: c.weather_code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
    cache: Mutex<Option<CachedSnapshot>>,
}

#[derive(Debug)]
struct CachedSnapshot {
    snapshot: OutsideSnapshot,
    fetched_at: DateTime<Utc>,
}

impl WeatherClient {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.weather_base_url.clone(),
                latitude: config.weather_latitude,
                longitude: config.weather_longitude,
                cache: Mutex::new(None),
            }),
        }
    }

    /// Returns the current outside snapshot, refreshing at most once per
    /// TTL window.
    pub async fn get(&self) -> OutsideSnapshot {
        let mut guard = self.inner.cache.lock().await;

        if let Some(ref cached) = *guard {
            if Utc::now() - cached.fetched_at < Duration::milliseconds(CACHE_TTL_MS) {
                debug!("Using cached weather snapshot");
                return cached.snapshot.clone();
            }
        }

        match self.fetch().await {
            Ok(snapshot) => {
                info!(
                    temperature = ?snapshot.temperature,
                    humidity = ?snapshot.humidity,
                    "Weather fetched and cached"
                );
                *guard = Some(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    fetched_at: Utc::now(),
                });
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch outside weather; continuing without it");
                OutsideSnapshot::default()
            }
        }
    }

    async fn fetch(&self) -> Result<OutsideSnapshot> {
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current={}",
            self.inner.base_url, self.inner.latitude, self.inner.longitude, CURRENT_FIELDS
        );
        debug!(url = %url, "Requesting current weather");

        let resp = self
            .inner
            .http
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .context("Open-Meteo request failed")?
            .error_for_status()
            .context("Open-Meteo returned error status")?
            .json::<ForecastResponse>()
            .await
            .context("Failed to deserialize Open-Meteo response")?;

        Ok(resp.current.map(OutsideSnapshot::from).unwrap_or_default())
    }
}

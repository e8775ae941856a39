use serde::Deserialize;

/// Subset of the Open-Meteo forecast response this service consumes.
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    /// WMO weather interpretation code.
    pub weather_code: Option<i32>,
}

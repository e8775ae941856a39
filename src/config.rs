use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Base URL of the Open-Meteo API (overridable for tests).
    pub weather_base_url: String,
    pub weather_latitude: f64,
    pub weather_longitude: f64,
    /// Location tag written into every decision epoch.
    pub location: String,
    /// Base URL of the Twilio API (overridable for tests).
    pub twilio_base_url: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub whatsapp_to_number: Option<String>,
    /// Alarm evaluation cadence in milliseconds.
    pub alarm_tick_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "2000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            weather_base_url: optional("WEATHER_BASE_URL", "https://api.open-meteo.com"),
            weather_latitude: optional("WEATHER_LATITUDE", "45.3267")
                .parse()
                .context("WEATHER_LATITUDE must be a number")?,
            weather_longitude: optional("WEATHER_LONGITUDE", "14.4424")
                .parse()
                .context("WEATHER_LONGITUDE must be a number")?,
            location: optional("LOCATION", "Shed"),
            twilio_base_url: optional("TWILIO_BASE_URL", "https://api.twilio.com"),
            twilio_account_sid: maybe("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: maybe("TWILIO_AUTH_TOKEN"),
            whatsapp_to_number: maybe("WHATSAPP_TO_NUMBER"),
            alarm_tick_ms: optional("ALARM_TICK_MS", "1000")
                .parse()
                .context("ALARM_TICK_MS must be a positive integer")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Returns `None` when the variable is unset or empty.
fn maybe(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_falls_back_to_default() {
        assert_eq!(optional("SHED_CONTROL_TEST_UNSET_VAR", "2000"), "2000");
    }

    #[test]
    fn maybe_is_none_for_unset_or_empty() {
        assert_eq!(maybe("SHED_CONTROL_TEST_UNSET_VAR"), None);
        std::env::set_var("SHED_CONTROL_TEST_EMPTY_VAR", "");
        assert_eq!(maybe("SHED_CONTROL_TEST_EMPTY_VAR"), None);
    }

    #[test]
    fn maybe_returns_set_value() {
        std::env::set_var("SHED_CONTROL_TEST_SET_VAR", "abc");
        assert_eq!(maybe("SHED_CONTROL_TEST_SET_VAR"), Some("abc".to_owned()));
    }
}

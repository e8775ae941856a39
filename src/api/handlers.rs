use anyhow::Context;
use axum::{extract::State, Json};
use chrono::Utc;
use tracing::error;
use utoipa::OpenApi;

use super::{
    dto::{
        AlarmStateDto, ArmedStatusDto, DisarmTimedRequest, EnvironmentRecordDto,
        MotionAckDto, MotionEventRequest, RelayCommandRequest, RelayModeDto, RelayModeRequest,
        SensorDecisionDto, SensorReadingRequest, ServerConfigUpdateRequest, SetArmedRequest,
        RelayStatusDto,
    },
    errors::ApiError,
    AppState,
};
use crate::{
    alarm::AlarmState,
    control::relay::{InsideReading, RelayMode, RelayState},
    db::models::EnvironmentRecord,
    state::ServerConfig,
};

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

/// Submit one inside reading and run a decision epoch.
#[utoipa::path(
    post,
    path = "/api/sensor",
    request_body = SensorReadingRequest,
    responses(
        (status = 200, description = "Decision epoch evaluated", body = SensorDecisionDto),
        (status = 400, description = "Missing or out-of-range sensor data"),
    ),
    tag = "sensor"
)]
pub async fn submit_sensor_reading(
    State(app): State<AppState>,
    Json(req): Json<SensorReadingRequest>,
) -> Result<Json<SensorDecisionDto>, ApiError> {
    let (Some(temperature), Some(humidity)) = (req.temperature, req.humidity) else {
        return Err(ApiError::InvalidInput("Invalid sensor data".to_owned()));
    };
    if !temperature.is_finite() || !humidity.is_finite() || !(0.0..=100.0).contains(&humidity) {
        return Err(ApiError::InvalidInput("Invalid sensor data".to_owned()));
    }

    let outcome = app
        .sensors
        .submit_reading(InsideReading {
            temperature,
            humidity,
        })
        .await;

    Ok(Json(outcome.into()))
}

/// Fetch the 10 most recent decision epochs.
#[utoipa::path(
    get,
    path = "/api/data",
    responses(
        (status = 200, description = "Most recent decision epochs", body = Vec<EnvironmentRecordDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensor"
)]
pub async fn get_recent_data(
    State(app): State<AppState>,
) -> Result<Json<Vec<EnvironmentRecordDto>>, ApiError> {
    let rows: Vec<EnvironmentRecord> = sqlx::query_as(
        r#"
        SELECT id, recorded_at,
               temperature_in, humidity_in, dew_point_in, heat_index_in,
               temperature_out, humidity_out, pressure_out, wind_speed_out,
               dew_point_out, weather_condition, weather_source,
               relay_state, relay_reason, location
        FROM environment_data
        ORDER BY recorded_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&app.pool)
    .await
    .context("failed to query environment_data")?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Current relay state, mode, and last transition reason.
#[utoipa::path(
    get,
    path = "/api/relay",
    responses(
        (status = 200, description = "Relay status", body = RelayStatusDto),
    ),
    tag = "relay"
)]
pub async fn get_relay(State(app): State<AppState>) -> Json<RelayStatusDto> {
    Json(app.state.relay_status().await.into())
}

/// Set the relay directly. Permitted only while the mode is MANUAL.
#[utoipa::path(
    post,
    path = "/api/relay",
    request_body = RelayCommandRequest,
    responses(
        (status = 200, description = "Relay updated", body = RelayStatusDto),
        (status = 403, description = "Mode is not MANUAL"),
    ),
    tag = "relay"
)]
pub async fn set_relay(
    State(app): State<AppState>,
    Json(req): Json<RelayCommandRequest>,
) -> Result<Json<RelayStatusDto>, ApiError> {
    let status = app.state.set_relay(req.state).await?;
    Ok(Json(status.into()))
}

/// Current relay mode.
#[utoipa::path(
    get,
    path = "/api/relay/mode",
    responses(
        (status = 200, description = "Relay mode", body = RelayModeDto),
    ),
    tag = "relay"
)]
pub async fn get_relay_mode(State(app): State<AppState>) -> Json<RelayModeDto> {
    Json(RelayModeDto {
        mode: app.state.relay_mode().await,
    })
}

/// Switch between AUTO and MANUAL.
#[utoipa::path(
    post,
    path = "/api/relay/mode",
    request_body = RelayModeRequest,
    responses(
        (status = 200, description = "Relay mode updated", body = RelayModeDto),
    ),
    tag = "relay"
)]
pub async fn set_relay_mode(
    State(app): State<AppState>,
    Json(req): Json<RelayModeRequest>,
) -> Json<RelayModeDto> {
    Json(RelayModeDto {
        mode: app.state.set_relay_mode(req.mode).await,
    })
}

// ---------------------------------------------------------------------------
// Server config
// ---------------------------------------------------------------------------

/// Current runtime configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    responses(
        (status = 200, description = "Server config", body = ServerConfig),
    ),
    tag = "config"
)]
pub async fn get_server_config(State(app): State<AppState>) -> Json<ServerConfig> {
    Json(app.state.server_config().await)
}

/// Patch the runtime configuration; absent fields are left unchanged.
#[utoipa::path(
    post,
    path = "/api/config",
    request_body = ServerConfigUpdateRequest,
    responses(
        (status = 200, description = "Updated server config", body = ServerConfig),
    ),
    tag = "config"
)]
pub async fn update_server_config(
    State(app): State<AppState>,
    Json(req): Json<ServerConfigUpdateRequest>,
) -> Json<ServerConfig> {
    Json(
        app.state
            .update_server_config(req.read_interval_ms, req.humidity_threshold)
            .await,
    )
}

// ---------------------------------------------------------------------------
// Motion & alarm
// ---------------------------------------------------------------------------

/// Submit a motion event (`{"motion": 1}` or `{"motion": 0}`).
#[utoipa::path(
    post,
    path = "/api/motion",
    request_body = MotionEventRequest,
    responses(
        (status = 200, description = "Motion event recorded", body = MotionAckDto),
        (status = 400, description = "Motion value outside {0, 1}"),
    ),
    tag = "alarm"
)]
pub async fn submit_motion_event(
    State(app): State<AppState>,
    Json(req): Json<MotionEventRequest>,
) -> Result<Json<MotionAckDto>, ApiError> {
    let Some(motion) = req.motion else {
        return Err(ApiError::InvalidInput("Invalid motion data".to_owned()));
    };

    let alarm_state = app.state.motion(motion, Utc::now()).await?;
    Ok(Json(MotionAckDto {
        motion_detected: motion == 1,
        alarm_state,
    }))
}

/// Current alarm state. Runs the unified evaluation, so an expired
/// motion-quiet window is applied before the value is returned.
#[utoipa::path(
    get,
    path = "/api/alarm",
    responses(
        (status = 200, description = "Alarm state", body = AlarmStateDto),
    ),
    tag = "alarm"
)]
pub async fn get_alarm_state(State(app): State<AppState>) -> Json<AlarmStateDto> {
    let evaluation = app.state.evaluate_alarm(Utc::now()).await;

    // This read may be the first to observe the OFF→ON edge; the evaluation
    // hands the alert out at most once, so delivery stays exactly-once.
    if let Some(message) = evaluation.alert {
        let notifier = app.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(message).await {
                error!(error = %e, "Failed to send alarm notification");
            }
        });
    }

    Json(AlarmStateDto {
        state: evaluation.state,
    })
}

/// Current armed flag and any pending auto-rearm deadline.
#[utoipa::path(
    get,
    path = "/api/alarm/armed",
    responses(
        (status = 200, description = "Armed status", body = ArmedStatusDto),
    ),
    tag = "alarm"
)]
pub async fn get_armed(State(app): State<AppState>) -> Json<ArmedStatusDto> {
    Json(app.state.armed_status().await.into())
}

/// Explicitly arm or disarm. Clears any pending auto-rearm deadline.
#[utoipa::path(
    post,
    path = "/api/alarm/armed",
    request_body = SetArmedRequest,
    responses(
        (status = 200, description = "Armed status updated", body = ArmedStatusDto),
    ),
    tag = "alarm"
)]
pub async fn set_armed(
    State(app): State<AppState>,
    Json(req): Json<SetArmedRequest>,
) -> Json<ArmedStatusDto> {
    Json(app.state.set_armed(req.armed).await.into())
}

/// Disarm for a number of minutes; the system re-arms itself afterwards.
#[utoipa::path(
    post,
    path = "/api/alarm/disarm-timed",
    request_body = DisarmTimedRequest,
    responses(
        (status = 200, description = "Alarm temporarily disarmed", body = ArmedStatusDto),
        (status = 400, description = "Minutes missing or not a positive number"),
    ),
    tag = "alarm"
)]
pub async fn disarm_timed(
    State(app): State<AppState>,
    Json(req): Json<DisarmTimedRequest>,
) -> Result<Json<ArmedStatusDto>, ApiError> {
    let Some(minutes) = req.minutes else {
        return Err(ApiError::InvalidInput("Invalid minutes".to_owned()));
    };

    let status = app.state.disarm_timed(minutes, Utc::now()).await?;
    Ok(Json(status.into()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        submit_sensor_reading,
        get_recent_data,
        get_relay,
        set_relay,
        get_relay_mode,
        set_relay_mode,
        get_server_config,
        update_server_config,
        submit_motion_event,
        get_alarm_state,
        get_armed,
        set_armed,
        disarm_timed,
        health,
    ),
    components(schemas(
        SensorReadingRequest,
        SensorDecisionDto,
        EnvironmentRecordDto,
        RelayCommandRequest,
        RelayModeRequest,
        RelayStatusDto,
        RelayModeDto,
        ServerConfig,
        ServerConfigUpdateRequest,
        MotionEventRequest,
        MotionAckDto,
        AlarmStateDto,
        SetArmedRequest,
        ArmedStatusDto,
        DisarmTimedRequest,
        RelayState,
        RelayMode,
        AlarmState,
    )),
    tags(
        (name = "sensor", description = "Sensor readings and decision epochs"),
        (name = "relay",  description = "Dehumidifier relay control"),
        (name = "config", description = "Runtime configuration"),
        (name = "alarm",  description = "Motion and alarm endpoints"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Shed Control API",
        version = "0.1.0",
        description = "REST API for the shed environment and alarm control node"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::{
        api::{router, AppState},
        config::Config,
        db,
        notify::Notifier,
        sensors::SensorService,
        state::SharedState,
        weather::WeatherClient,
    };

    /// Config with unreachable collaborators: weather fetches fail (all-None
    /// snapshot), persistence inserts fail (logged and swallowed), and the
    /// notifier is disabled.
    fn test_config() -> Config {
        Config {
            database_url: "postgres://postgres@127.0.0.1:1/shed_control".to_owned(),
            server_host: "127.0.0.1".to_owned(),
            server_port: 0,
            weather_base_url: "http://127.0.0.1:1".to_owned(),
            weather_latitude: 45.3267,
            weather_longitude: 14.4424,
            location: "Shed".to_owned(),
            twilio_base_url: "http://127.0.0.1:1".to_owned(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            whatsapp_to_number: None,
            alarm_tick_ms: 1000,
        }
    }

    fn test_state() -> AppState {
        let config = test_config();
        let pool = db::connect_lazy(&config.database_url).expect("connect_lazy");
        let state = SharedState::new();
        let weather = WeatherClient::new(&config);
        let notifier = Notifier::new(&config);
        let sensors = SensorService::new(
            pool.clone(),
            weather,
            state.clone(),
            config.location.clone(),
        );
        AppState {
            pool,
            state,
            sensors,
            notifier,
        }
    }

    fn test_server() -> TestServer {
        TestServer::new(router(test_state())).unwrap()
    }

    // -----------------------------------------------------------------------
    // System
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = test_server();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Shed Control API");
    }

    // -----------------------------------------------------------------------
    // Relay
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn relay_defaults_to_off_in_auto_mode() {
        let server = test_server();
        let resp = server.get("/api/relay").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["state"], "OFF");
        assert_eq!(body["mode"], "AUTO");
    }

    #[tokio::test]
    async fn relay_set_is_forbidden_in_auto_mode() {
        let server = test_server();
        let resp = server.post("/api/relay").json(&json!({ "state": "ON" })).await;
        resp.assert_status(StatusCode::FORBIDDEN);

        // No mutation happened.
        let body: Value = server.get("/api/relay").await.json();
        assert_eq!(body["state"], "OFF");
    }

    #[tokio::test]
    async fn relay_set_applies_in_manual_mode() {
        let server = test_server();
        server
            .post("/api/relay/mode")
            .json(&json!({ "mode": "MANUAL" }))
            .await
            .assert_status_ok();

        let resp = server.post("/api/relay").json(&json!({ "state": "ON" })).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["state"], "ON");

        let body: Value = server.get("/api/relay").await.json();
        assert_eq!(body["state"], "ON");
        assert_eq!(body["mode"], "MANUAL");
    }

    #[tokio::test]
    async fn relay_set_rejects_unknown_state() {
        let server = test_server();
        let resp = server
            .post("/api/relay")
            .json(&json!({ "state": "BLINK" }))
            .await;
        assert!(resp.status_code().is_client_error());
    }

    #[tokio::test]
    async fn relay_mode_roundtrip() {
        let server = test_server();
        let body: Value = server.get("/api/relay/mode").await.json();
        assert_eq!(body["mode"], "AUTO");

        server
            .post("/api/relay/mode")
            .json(&json!({ "mode": "MANUAL" }))
            .await
            .assert_status_ok();

        let body: Value = server.get("/api/relay/mode").await.json();
        assert_eq!(body["mode"], "MANUAL");
    }

    // -----------------------------------------------------------------------
    // Server config
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn config_defaults_and_partial_update() {
        let server = test_server();
        let body: Value = server.get("/api/config").await.json();
        assert_eq!(body["read_interval_ms"], 5000);
        assert_eq!(body["humidity_threshold"], 55.0);

        let resp = server
            .post("/api/config")
            .json(&json!({ "humidity_threshold": 60.5 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["read_interval_ms"], 5000);
        assert_eq!(body["humidity_threshold"], 60.5);

        let body: Value = server.get("/api/config").await.json();
        assert_eq!(body["humidity_threshold"], 60.5);
    }

    // -----------------------------------------------------------------------
    // Sensor readings
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sensor_missing_fields_rejected() {
        let server = test_server();
        let resp = server.post("/api/sensor").json(&json!({})).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server
            .post("/api/sensor")
            .json(&json!({ "temperature": 21.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sensor_out_of_range_humidity_rejected() {
        let server = test_server();
        for humidity in [-1.0, 100.5, 150.0] {
            let resp = server
                .post("/api/sensor")
                .json(&json!({ "temperature": 21.0, "humidity": humidity }))
                .await;
            resp.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn sensor_dead_zone_reports_no_change() {
        let server = test_server();
        let resp = server
            .post("/api/sensor")
            .json(&json!({ "temperature": 22.0, "humidity": 55.0 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["relay_state"], "OFF");
        assert_eq!(body["relay_reason"], "No change");
    }

    #[tokio::test]
    async fn sensor_high_humidity_without_outside_data_stays_off() {
        // The test weather endpoint is unreachable, so the snapshot is
        // all-None and the ON guard can never pass.
        let server = test_server();
        let resp = server
            .post("/api/sensor")
            .json(&json!({ "temperature": 22.0, "humidity": 85.0 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["relay_state"], "OFF");
        assert_eq!(body["relay_reason"], "No change");
    }

    #[tokio::test]
    async fn sensor_low_humidity_turns_relay_off() {
        let server = test_server();

        // Force the relay ON manually, then hand it back to AUTO.
        server
            .post("/api/relay/mode")
            .json(&json!({ "mode": "MANUAL" }))
            .await
            .assert_status_ok();
        server
            .post("/api/relay")
            .json(&json!({ "state": "ON" }))
            .await
            .assert_status_ok();
        server
            .post("/api/relay/mode")
            .json(&json!({ "mode": "AUTO" }))
            .await
            .assert_status_ok();

        let resp = server
            .post("/api/sensor")
            .json(&json!({ "temperature": 22.0, "humidity": 40.0 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["relay_state"], "OFF");
        assert!(body["relay_reason"]
            .as_str()
            .unwrap()
            .contains("Auto OFF"));
    }

    #[tokio::test]
    async fn sensor_in_manual_mode_reports_manual_reason() {
        let server = test_server();
        server
            .post("/api/relay/mode")
            .json(&json!({ "mode": "MANUAL" }))
            .await
            .assert_status_ok();

        let resp = server
            .post("/api/sensor")
            .json(&json!({ "temperature": 22.0, "humidity": 40.0 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["relay_reason"], "Manual mode active");
    }

    // -----------------------------------------------------------------------
    // Motion & alarm
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn motion_invalid_values_rejected() {
        let server = test_server();
        let resp = server.post("/api/motion").json(&json!({})).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server.post("/api/motion").json(&json!({ "motion": 5 })).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        // Alarm untouched.
        let body: Value = server.get("/api/alarm").await.json();
        assert_eq!(body["state"], "OFF");
    }

    #[tokio::test]
    async fn motion_while_armed_raises_alarm() {
        let server = test_server();
        let resp = server.post("/api/motion").json(&json!({ "motion": 1 })).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["motion_detected"], true);
        assert_eq!(body["alarm_state"], "ON");

        let body: Value = server.get("/api/alarm").await.json();
        assert_eq!(body["state"], "ON");
    }

    #[tokio::test]
    async fn motion_while_disarmed_leaves_alarm_off() {
        let server = test_server();
        server
            .post("/api/alarm/armed")
            .json(&json!({ "armed": false }))
            .await
            .assert_status_ok();

        let resp = server.post("/api/motion").json(&json!({ "motion": 1 })).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["alarm_state"], "OFF");
    }

    #[tokio::test]
    async fn alarm_reads_off_after_quiet_duration() {
        let server = test_server();
        server
            .post("/api/motion")
            .json(&json!({ "motion": 1 }))
            .await
            .assert_status_ok();

        let body: Value = server.get("/api/alarm").await.json();
        assert_eq!(body["state"], "ON");

        // Past ALARM_DURATION_MS without fresh motion the next read applies
        // the auto-off.
        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
        let body: Value = server.get("/api/alarm").await.json();
        assert_eq!(body["state"], "OFF");
    }

    #[tokio::test]
    async fn armed_roundtrip_and_deadline_reporting() {
        let server = test_server();
        let body: Value = server.get("/api/alarm/armed").await.json();
        assert_eq!(body["armed"], true);
        assert!(body["auto_arm_at"].is_null());

        server
            .post("/api/alarm/armed")
            .json(&json!({ "armed": false }))
            .await
            .assert_status_ok();
        let body: Value = server.get("/api/alarm/armed").await.json();
        assert_eq!(body["armed"], false);
    }

    #[tokio::test]
    async fn disarm_timed_sets_deadline_and_set_armed_clears_it() {
        let server = test_server();
        let resp = server
            .post("/api/alarm/disarm-timed")
            .json(&json!({ "minutes": 5 }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["armed"], false);
        assert!(!body["auto_arm_at"].is_null());

        // An explicit arm command supersedes the pending deadline.
        server
            .post("/api/alarm/armed")
            .json(&json!({ "armed": true }))
            .await
            .assert_status_ok();
        let body: Value = server.get("/api/alarm/armed").await.json();
        assert_eq!(body["armed"], true);
        assert!(body["auto_arm_at"].is_null());
    }

    #[tokio::test]
    async fn disarm_timed_rejects_bad_minutes() {
        let server = test_server();
        for body in [json!({}), json!({ "minutes": 0 }), json!({ "minutes": -3 })] {
            let resp = server.post("/api/alarm/disarm-timed").json(&body).await;
            resp.assert_status(StatusCode::BAD_REQUEST);
        }

        let body: Value = server.get("/api/alarm/armed").await.json();
        assert_eq!(body["armed"], true);
    }
}

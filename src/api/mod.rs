pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{notify::Notifier, sensors::SensorService, state::SharedState};
use handlers::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub state: SharedState,
    pub sensors: SensorService,
    pub notifier: Notifier,
}

pub fn router(app: AppState) -> Router {
    // The sensor node firmware and the dashboard are served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/sensor", post(handlers::submit_sensor_reading))
        .route("/api/data", get(handlers::get_recent_data))
        .route(
            "/api/relay",
            get(handlers::get_relay).post(handlers::set_relay),
        )
        .route(
            "/api/relay/mode",
            get(handlers::get_relay_mode).post(handlers::set_relay_mode),
        )
        .route(
            "/api/config",
            get(handlers::get_server_config).post(handlers::update_server_config),
        )
        .route("/api/motion", post(handlers::submit_motion_event))
        .route("/api/alarm", get(handlers::get_alarm_state))
        .route(
            "/api/alarm/armed",
            get(handlers::get_armed).post(handlers::set_armed),
        )
        .route("/api/alarm/disarm-timed", post(handlers::disarm_timed))
        .with_state(app)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

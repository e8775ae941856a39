use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shed_control_service::{
    alarm::service::AlarmService,
    api::{self, AppState},
    config::Config,
    db,
    notify::Notifier,
    sensors::SensorService,
    state::SharedState,
    weather::WeatherClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    // Process-wide control state with documented defaults
    let state = SharedState::new();

    // Outside-weather client (1 h TTL cache) and WhatsApp notifier
    let weather = WeatherClient::new(&config);
    let notifier = Notifier::new(&config);

    let sensors = SensorService::new(
        pool.clone(),
        weather,
        state.clone(),
        config.location.clone(),
    );

    // Spawn the periodic alarm evaluation loop
    {
        let alarm = AlarmService::new(state.clone(), notifier.clone(), config.alarm_tick_ms);
        tokio::spawn(alarm.run());
    }

    // Start HTTP server
    let app = AppState {
        pool,
        state,
        sensors,
        notifier,
    };
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{error, info};

use crate::{notify::Notifier, state::SharedState};

/// Periodic alarm evaluation loop. Runs the unified evaluation at a fixed
/// cadence and forwards the OFF→ON edge alert to the notifier.
pub struct AlarmService {
    state: SharedState,
    notifier: Notifier,
    interval: Duration,
}

impl AlarmService {
    pub fn new(state: SharedState, notifier: Notifier, interval_ms: u64) -> Self {
        Self {
            state,
            notifier,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Runs the evaluation loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Alarm evaluation loop started"
        );
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            let evaluation = self.state.evaluate_alarm(Utc::now()).await;
            if let Some(message) = evaluation.alert {
                info!("Alarm triggered; sending notification");
                if let Err(e) = self.notifier.send(message).await {
                    error!(error = %e, "Failed to send alarm notification");
                }
            }
        }
    }
}

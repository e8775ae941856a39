//! Process-wide control state.
//!
//! All mutable state of the node — relay, relay mode, runtime config, and
//! the alarm machine — lives in one `ControlState` behind a single lock, so
//! every mutation (sensor decision, command, motion event, tick evaluation)
//! is serialized. Created with documented defaults at startup; nothing
//! survives a restart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    alarm::{AlarmCore, AlarmEvaluation, AlarmInputError, AlarmState},
    control::relay::{self, Decision, InsideReading, RelayCommandError, RelayMode, RelayState},
    weather::OutsideSnapshot,
};

pub const DEFAULT_READ_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_HUMIDITY_THRESHOLD: f64 = 55.0;

/// Runtime-mutable settings. Read fresh on every decision, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// How often the sensor device should submit readings.
    pub read_interval_ms: u64,
    pub humidity_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: DEFAULT_READ_INTERVAL_MS,
            humidity_threshold: DEFAULT_HUMIDITY_THRESHOLD,
        }
    }
}

/// Relay as reported to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayStatus {
    pub state: RelayState,
    pub mode: RelayMode,
    pub reason: String,
}

/// Armed flag plus any pending auto-rearm deadline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmedStatus {
    pub armed: bool,
    pub auto_arm_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ControlState {
    pub relay: RelayState,
    /// Reason recorded at the last relay transition.
    pub relay_reason: String,
    pub mode: RelayMode,
    pub config: ServerConfig,
    pub alarm: AlarmCore,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            relay: RelayState::Off,
            relay_reason: "No change".to_owned(),
            mode: RelayMode::Auto,
            config: ServerConfig::default(),
            alarm: AlarmCore::new(),
        }
    }
}

impl ControlState {
    /// Runs the decision engine against the current mode, threshold, and
    /// relay state, applying at most one relay write.
    pub fn decide_and_apply(
        &mut self,
        inside: &InsideReading,
        outside: &OutsideSnapshot,
    ) -> Decision {
        let decision = relay::decide(
            inside,
            outside,
            self.mode,
            self.config.humidity_threshold,
            self.relay,
        );

        if decision.state != self.relay {
            info!(
                from = %self.relay,
                to = %decision.state,
                reason = %decision.reason,
                "Relay state changed"
            );
            self.relay = decision.state;
            self.relay_reason = decision.reason.clone();
        }

        decision
    }

    /// Direct relay command; permitted only in MANUAL mode.
    pub fn set_relay(&mut self, requested: RelayState) -> Result<(), RelayCommandError> {
        if self.mode != RelayMode::Manual {
            return Err(RelayCommandError::ManualModeRequired);
        }

        if self.relay != requested {
            self.relay = requested;
            self.relay_reason = format!("Manual set to {requested}");
            info!(state = %requested, "Relay manually set");
        }
        Ok(())
    }
}

/// Cheaply clonable handle to the single `ControlState` instance.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<ControlState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn relay_status(&self) -> RelayStatus {
        let state = self.inner.lock().await;
        RelayStatus {
            state: state.relay,
            mode: state.mode,
            reason: state.relay_reason.clone(),
        }
    }

    pub async fn set_relay(&self, requested: RelayState) -> Result<RelayStatus, RelayCommandError> {
        let mut state = self.inner.lock().await;
        state.set_relay(requested)?;
        Ok(RelayStatus {
            state: state.relay,
            mode: state.mode,
            reason: state.relay_reason.clone(),
        })
    }

    pub async fn relay_mode(&self) -> RelayMode {
        self.inner.lock().await.mode
    }

    pub async fn set_relay_mode(&self, mode: RelayMode) -> RelayMode {
        let mut state = self.inner.lock().await;
        state.mode = mode;
        info!(mode = %mode, "Relay mode updated");
        mode
    }

    pub async fn server_config(&self) -> ServerConfig {
        self.inner.lock().await.config.clone()
    }

    /// Applies the present fields and returns the resulting config.
    pub async fn update_server_config(
        &self,
        read_interval_ms: Option<u64>,
        humidity_threshold: Option<f64>,
    ) -> ServerConfig {
        let mut state = self.inner.lock().await;
        if let Some(interval) = read_interval_ms {
            state.config.read_interval_ms = interval;
        }
        if let Some(threshold) = humidity_threshold {
            state.config.humidity_threshold = threshold;
        }
        info!(
            read_interval_ms = state.config.read_interval_ms,
            humidity_threshold = state.config.humidity_threshold,
            "Server config updated"
        );
        state.config.clone()
    }

    pub async fn decide(&self, inside: &InsideReading, outside: &OutsideSnapshot) -> Decision {
        self.inner.lock().await.decide_and_apply(inside, outside)
    }

    pub async fn motion(
        &self,
        value: i64,
        now: DateTime<Utc>,
    ) -> Result<AlarmState, AlarmInputError> {
        self.inner.lock().await.alarm.on_motion(value, now)
    }

    pub async fn set_armed(&self, armed: bool) -> ArmedStatus {
        let mut state = self.inner.lock().await;
        state.alarm.set_armed(armed);
        ArmedStatus {
            armed: state.alarm.armed(),
            auto_arm_at: state.alarm.auto_arm_at(),
        }
    }

    pub async fn disarm_timed(
        &self,
        minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<ArmedStatus, AlarmInputError> {
        let mut state = self.inner.lock().await;
        state.alarm.disarm_timed(minutes, now)?;
        Ok(ArmedStatus {
            armed: state.alarm.armed(),
            auto_arm_at: state.alarm.auto_arm_at(),
        })
    }

    pub async fn armed_status(&self) -> ArmedStatus {
        let state = self.inner.lock().await;
        ArmedStatus {
            armed: state.alarm.armed(),
            auto_arm_at: state.alarm.auto_arm_at(),
        }
    }

    pub async fn evaluate_alarm(&self, now: DateTime<Utc>) -> AlarmEvaluation {
        self.inner.lock().await.alarm.evaluate(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry_outside() -> OutsideSnapshot {
        OutsideSnapshot {
            temperature: Some(15.0),
            humidity: Some(50.0),
            ..OutsideSnapshot::default()
        }
    }

    #[test]
    fn set_relay_is_rejected_outside_manual_mode() {
        let mut state = ControlState::default();
        assert_eq!(
            state.set_relay(RelayState::On).unwrap_err(),
            RelayCommandError::ManualModeRequired
        );
        assert_eq!(state.relay, RelayState::Off);
    }

    #[test]
    fn set_relay_applies_in_manual_mode() {
        let mut state = ControlState::default();
        state.mode = RelayMode::Manual;
        state.set_relay(RelayState::On).unwrap();
        assert_eq!(state.relay, RelayState::On);
        assert!(state.relay_reason.contains("Manual set"));
    }

    #[test]
    fn decide_and_apply_records_transition_reason() {
        let mut state = ControlState::default();
        let inside = InsideReading {
            temperature: 25.0,
            humidity: 60.0,
        };

        let decision = state.decide_and_apply(&inside, &dry_outside());
        assert_eq!(decision.state, RelayState::On);
        assert_eq!(state.relay, RelayState::On);
        assert!(state.relay_reason.contains("Auto ON"));
    }

    #[test]
    fn decide_and_apply_keeps_last_transition_reason_through_no_change() {
        let mut state = ControlState::default();
        let inside = InsideReading {
            temperature: 25.0,
            humidity: 60.0,
        };
        state.decide_and_apply(&inside, &dry_outside());

        // Second identical epoch: no transition, reason string retained.
        let decision = state.decide_and_apply(&inside, &dry_outside());
        assert_eq!(decision.reason, "No change");
        assert!(state.relay_reason.contains("Auto ON"));
    }

    #[test]
    fn decide_and_apply_reads_latest_threshold() {
        let mut state = ControlState::default();
        state.config.humidity_threshold = 70.0;
        let inside = InsideReading {
            temperature: 25.0,
            humidity: 60.0,
        };

        // 60% is now well below threshold - H: the relay stays off.
        let decision = state.decide_and_apply(&inside, &dry_outside());
        assert_eq!(decision.state, RelayState::Off);
    }
}

//! Motion-triggered security alarm.
//!
//! Two independent state variables evolve here: the alarm itself (ON/OFF)
//! and the armed flag with an optional auto-rearm deadline. All operations
//! take an explicit `now` so the machine can be driven with virtual time.
//!
//! `evaluate` is the single source of truth for time-driven transitions:
//! auto-rearm, auto-off after the motion-quiet duration, and OFF→ON edge
//! detection for notifications. Both the periodic tick and every status read
//! go through it, so a notification can never disagree with what a
//! concurrent reader observes.

pub mod service;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// How long the alarm stays ON after the last motion event.
pub const ALARM_DURATION_MS: i64 = 2000;

/// Message delivered exactly once per OFF→ON transition.
pub const ALARM_ALERT_MESSAGE: &str = "Alert: Alarm triggered!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    On,
    Off,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlarmState::On => "ON",
            AlarmState::Off => "OFF",
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AlarmInputError {
    #[error("motion value must be 0 or 1, got {0}")]
    InvalidMotion(i64),
    #[error("minutes must be a positive number")]
    InvalidMinutes,
}

/// Result of one unified evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvaluation {
    pub state: AlarmState,
    /// Present exactly once per OFF→ON transition.
    pub alert: Option<&'static str>,
}

#[derive(Debug)]
pub struct AlarmCore {
    state: AlarmState,
    armed: bool,
    auto_arm_at: Option<DateTime<Utc>>,
    motion_detected: bool,
    last_motion_at: Option<DateTime<Utc>>,
    /// State seen by the previous `evaluate` pass; edge-detection reference.
    last_observed: AlarmState,
}

impl Default for AlarmCore {
    fn default() -> Self {
        Self {
            state: AlarmState::Off,
            armed: true,
            auto_arm_at: None,
            motion_detected: false,
            last_motion_at: None,
            last_observed: AlarmState::Off,
        }
    }
}

impl AlarmCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn auto_arm_at(&self) -> Option<DateTime<Utc>> {
        self.auto_arm_at
    }

    pub fn motion_detected(&self) -> bool {
        self.motion_detected
    }

    /// Records a motion event. `value` must be 0 or 1; anything else is
    /// rejected without touching state. A `1` raises the alarm only while
    /// armed; a `0` never lowers it (only the quiet-duration expiry does).
    pub fn on_motion(&mut self, value: i64, now: DateTime<Utc>) -> Result<AlarmState, AlarmInputError> {
        if value != 0 && value != 1 {
            return Err(AlarmInputError::InvalidMotion(value));
        }

        self.motion_detected = value == 1;
        self.last_motion_at = Some(now);

        if value == 1 && self.armed && self.state != AlarmState::On {
            self.state = AlarmState::On;
            info!("Alarm ON (motion while armed)");
        }

        Ok(self.state)
    }

    /// Explicitly arms or disarms. An explicit command supersedes any
    /// pending auto-rearm deadline.
    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
        self.auto_arm_at = None;
        info!(armed, "Armed state set");
    }

    /// Disarms for `minutes`, after which `evaluate` re-arms automatically.
    pub fn disarm_timed(
        &mut self,
        minutes: f64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, AlarmInputError> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(AlarmInputError::InvalidMinutes);
        }

        let deadline = now + Duration::milliseconds((minutes * 60_000.0).round() as i64);
        self.armed = false;
        self.auto_arm_at = Some(deadline);
        info!(minutes, "Alarm disarmed with auto-rearm deadline");
        Ok(deadline)
    }

    /// Unified evaluation: auto-rearm, then quiet-duration auto-off, then
    /// edge detection against the post-transition state.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> AlarmEvaluation {
        if !self.armed {
            if let Some(deadline) = self.auto_arm_at {
                if now >= deadline {
                    self.armed = true;
                    self.auto_arm_at = None;
                    info!("Auto-rearm: disarm window expired");
                }
            }
        }

        if self.state == AlarmState::On {
            if let Some(last_motion) = self.last_motion_at {
                if now - last_motion > Duration::milliseconds(ALARM_DURATION_MS) {
                    self.state = AlarmState::Off;
                    info!("Alarm AUTO-OFF (duration expired)");
                }
            }
        }

        let alert = (self.state == AlarmState::On && self.last_observed != AlarmState::On)
            .then_some(ALARM_ALERT_MESSAGE);
        self.last_observed = self.state;

        AlarmEvaluation {
            state: self.state,
            alert,
        }
    }
}

//! Dehumidifier relay decision engine.
//!
//! In AUTO mode the relay follows inside humidity with a fixed hysteresis
//! band around the configured threshold. Turning ON is additionally gated on
//! the outside snapshot: energizing a dehumidifier while outside air is at
//! least as humid, or while outside condensation conditions dominate, is
//! counter-productive. Turning OFF needs no outside context.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::control::climate::dew_point;
use crate::weather::OutsideSnapshot;

/// Width of the dead zone on each side of the humidity threshold.
pub const HYSTERESIS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    On,
    Off,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayMode {
    Auto,
    Manual,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayMode::Auto => "AUTO",
            RelayMode::Manual => "MANUAL",
        })
    }
}

/// A single validated sensor submission. Humidity is a percentage in
/// `0..=100`; the caller rejects anything else before a decision is made.
#[derive(Debug, Clone, Copy)]
pub struct InsideReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Outcome of one decision: the (possibly unchanged) relay state and a
/// human-readable justification.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: RelayState,
    pub reason: String,
}

/// Raised when a relay command arrives while the engine owns the relay.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelayCommandError {
    #[error("relay can only be changed manually in MANUAL mode")]
    ManualModeRequired,
}

/// Decides the next relay state for one inside reading.
///
/// MANUAL mode never changes state. AUTO mode applies hysteresis: above
/// `threshold + HYSTERESIS` the relay may turn ON, but only when outside
/// humidity is known, inside air is more humid than outside, and the inside
/// dew point exceeds the outside one (unknown outside dew point compares as
/// negative infinity). Below `threshold - HYSTERESIS` the relay turns OFF
/// unconditionally. Inside the band nothing changes.
pub fn decide(
    inside: &InsideReading,
    outside: &OutsideSnapshot,
    mode: RelayMode,
    threshold: f64,
    current: RelayState,
) -> Decision {
    if mode == RelayMode::Manual {
        return Decision {
            state: current,
            reason: "Manual mode active".to_owned(),
        };
    }

    if inside.humidity > threshold + HYSTERESIS {
        let dew_point_in = dew_point(inside.temperature, inside.humidity);
        let dew_point_out = match (outside.temperature, outside.humidity) {
            (Some(t), Some(h)) => dew_point(t, h),
            _ => f64::NEG_INFINITY,
        };
        let drier_outside = outside
            .humidity
            .is_some_and(|humidity_out| inside.humidity > humidity_out);

        if drier_outside && dew_point_in > dew_point_out && current != RelayState::On {
            return Decision {
                state: RelayState::On,
                reason: format!("Auto ON: inside humidity high ({}%)", inside.humidity),
            };
        }
    } else if inside.humidity < threshold - HYSTERESIS && current != RelayState::Off {
        return Decision {
            state: RelayState::Off,
            reason: format!("Auto OFF: inside humidity low ({}%)", inside.humidity),
        };
    }

    Decision {
        state: current,
        reason: "No change".to_owned(),
    }
}

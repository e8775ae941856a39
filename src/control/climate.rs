//! Derived climate quantities: dew point (Magnus approximation) and heat
//! index (Rothfusz regression). Both are pure functions of temperature in
//! degrees Celsius and relative humidity in percent.

/// Magnus formula coefficients.
const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Dew point in °C for temperature `t` (°C) and relative humidity `h` (%).
pub fn dew_point(t: f64, h: f64) -> f64 {
    let alpha = (MAGNUS_A * t) / (MAGNUS_B + t) + (h / 100.0).ln();
    (MAGNUS_B * alpha) / (MAGNUS_A - alpha)
}

/// Perceived temperature in °C for temperature `t` (°C) and relative
/// humidity `h` (%). Stored alongside each reading; never feeds the relay
/// decision.
pub fn heat_index(t: f64, h: f64) -> f64 {
    -8.784695
        + 1.61139411 * t
        + 2.338549 * h
        - 0.14611605 * t * h
        - 0.012308094 * t * t
        - 0.016424828 * h * h
        + 0.002211732 * t * t * h
        + 0.00072546 * t * h * h
        - 0.000003582 * t * t * h * h
}

//! Deciding what has to go on the wire.

use serde::{Deserialize, Serialize};

use crate::state::LightState;

const EPSILON: f64 = 1e-6;

/// What a commit has to send to move the controller to the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Nothing to send.
    KeepState,
    /// Only the power-off frame.
    ToggleState,
    /// A single color frame, which also switches the controller on.
    SetColor,
}

/// Compare the desired state with the last one written.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::{Intent, LightState, Transition, classify};
///
/// let off = LightState::default();
/// let mut intent = Intent::new();
/// intent.power(true);
/// let on = off.apply(&intent);
///
/// assert_eq!(classify(&off, &off), Transition::KeepState);
/// assert_eq!(classify(&on, &off), Transition::SetColor);
/// assert_eq!(classify(&off, &on), Transition::ToggleState);
/// ```
pub fn classify(desired: &LightState, last_written: &LightState) -> Transition {
    if !desired.is_on() && !last_written.is_on() {
        return Transition::KeepState;
    }
    if desired.is_on() == last_written.is_on() && same_color(desired, last_written) {
        return Transition::KeepState;
    }
    if last_written.is_on() && !desired.is_on() {
        return Transition::ToggleState;
    }
    Transition::SetColor
}

fn same_color(a: &LightState, b: &LightState) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() < EPSILON;
    let temperature = match (a.color_temperature(), b.color_temperature()) {
        (None, None) => true,
        (Some(x), Some(y)) => close(x.value(), y.value()),
        _ => false,
    };
    close(a.hsl().hue(), b.hsl().hue())
        && close(a.hsl().saturation(), b.hsl().saturation())
        && close(a.brightness(), b.brightness())
        && temperature
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Intent;

    fn state(on: bool, hue: f64, brightness: f64) -> LightState {
        let mut intent = Intent::new();
        intent.power(on);
        intent.hue(hue);
        intent.saturation(100.0);
        intent.brightness(brightness);
        LightState::default().apply(&intent)
    }

    #[test]
    fn test_both_off_is_kept_even_if_color_differs() {
        assert_eq!(
            classify(&state(false, 10.0, 50.0), &state(false, 200.0, 90.0)),
            Transition::KeepState
        );
    }

    #[test]
    fn test_identical_on_is_kept() {
        assert_eq!(
            classify(&state(true, 120.0, 80.0), &state(true, 120.0, 80.0)),
            Transition::KeepState
        );
    }

    #[test]
    fn test_turning_off_only_toggles() {
        assert_eq!(
            classify(&state(false, 120.0, 80.0), &state(true, 10.0, 30.0)),
            Transition::ToggleState
        );
    }

    #[test]
    fn test_color_change_and_power_on() {
        assert_eq!(
            classify(&state(true, 121.0, 80.0), &state(true, 120.0, 80.0)),
            Transition::SetColor
        );
        assert_eq!(
            classify(&state(true, 120.0, 81.0), &state(true, 120.0, 80.0)),
            Transition::SetColor
        );
        assert_eq!(
            classify(&state(true, 120.0, 80.0), &state(false, 120.0, 80.0)),
            Transition::SetColor
        );
    }

    #[test]
    fn test_temperature_intent_counts() {
        let base = state(true, 31.0, 80.0);
        let mut intent = Intent::new();
        intent.color_temperature(500.0);
        let warm = base.apply(&intent);
        assert_eq!(classify(&warm, &base), Transition::SetColor);
    }
}

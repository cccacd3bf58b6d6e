//! Light state tracking.

use serde::{Deserialize, Serialize};

use crate::codec::DeviceResponse;
use crate::color::{self, NativeColor};
use crate::errors::Error;
use crate::types::{ChannelMask, Hsl, Mired, OperatingMode, PowerMode, Rgb, WhiteValues};

type Result<T> = std::result::Result<T, Error>;

/// Snapshot of a light, in both the presentation and the native domain.
///
/// A `LightState` is a value: every transformation returns a new state.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    is_on: bool,
    mask: ChannelMask,
    hsl: Hsl,
    rgb: Rgb,
    white: WhiteValues,
    color_temperature: Option<Mired>,
    brightness: f64,
}

impl Default for LightState {
    fn default() -> Self {
        LightState {
            is_on: false,
            mask: ChannelMask::default(),
            hsl: Hsl::default(),
            rgb: Rgb::default(),
            white: WhiteValues::default(),
            color_temperature: None,
            brightness: 100.0,
        }
    }
}

impl LightState {
    /// Build a state from a parsed status response.
    ///
    /// `mode` selects how the native channels are read back (see
    /// [`color::native_to_hsb`]).
    pub fn from_response(response: &DeviceResponse, mode: OperatingMode) -> Self {
        let reading = color::native_to_hsb(response.rgb, response.white, mode);
        LightState {
            is_on: response.is_on,
            mask: response.mask,
            hsl: reading.hsl,
            rgb: response.rgb,
            white: response.white,
            color_temperature: reading.color_temperature,
            brightness: reading.brightness,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn power(&self) -> PowerMode {
        PowerMode::from(self.is_on)
    }

    /// Mask byte last sent to or received from the controller.
    pub fn mask(&self) -> ChannelMask {
        self.mask
    }

    /// Derived from the mask byte.
    pub fn operating_mode(&self) -> OperatingMode {
        self.mask.operating_mode()
    }

    pub fn hsl(&self) -> &Hsl {
        &self.hsl
    }

    pub fn rgb(&self) -> Rgb {
        self.rgb
    }

    pub fn white(&self) -> WhiteValues {
        self.white
    }

    pub fn color_temperature(&self) -> Option<Mired> {
        self.color_temperature
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    /// Apply a user intent.
    ///
    /// Native channels are left untouched; they are only recomputed when the
    /// state is written to a controller.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_lights_rs::{Intent, LightState};
    ///
    /// let mut intent = Intent::new();
    /// intent.power(true);
    /// intent.hue(120.0);
    /// intent.brightness(80.0);
    ///
    /// let state = LightState::default().apply(&intent);
    /// assert!(state.is_on());
    /// assert_eq!(state.hsl().hue(), 120.0);
    /// assert_eq!(state.brightness(), 80.0);
    /// ```
    pub fn apply(&self, intent: &Intent) -> LightState {
        let mut next = *self;
        if let Some(on) = intent.is_on {
            next.is_on = on;
        }
        if let Some(brightness) = intent.brightness {
            next.brightness = brightness;
        }
        if let Some(hue) = intent.hue {
            next.hsl = next.hsl.with_hue(hue);
            next.color_temperature = None;
        }
        if let Some(saturation) = intent.saturation {
            next.hsl = next.hsl.with_saturation(saturation);
            next.color_temperature = None;
        }
        if let Some(temperature) = intent.color_temperature {
            let temperature = Mired::clamped(temperature);
            next.hsl = color::temperature_display_point(temperature);
            next.color_temperature = Some(temperature);
        }
        next
    }

    pub(crate) fn with_power(&self, is_on: bool) -> LightState {
        LightState { is_on, ..*self }
    }

    /// The same state carrying the native channels that were written for it.
    pub(crate) fn with_native(&self, native: &NativeColor) -> LightState {
        LightState {
            mask: native.mask,
            rgb: native.rgb,
            white: native.white,
            ..*self
        }
    }

    /// Whether the controller shows what this state says, allowing one step
    /// of rounding per channel.
    pub(crate) fn matches_device(&self, device: &LightState) -> bool {
        if self.is_on != device.is_on {
            return false;
        }
        if !self.is_on {
            return true;
        }
        let close = |a: u8, b: u8| a.abs_diff(b) <= 1;
        close(self.rgb.red, device.rgb.red)
            && close(self.rgb.green, device.rgb.green)
            && close(self.rgb.blue, device.rgb.blue)
            && close(self.white.warm_white, device.white.warm_white)
            && close(self.white.cold_white, device.white.cold_white)
    }
}

/// A partial update requested by the presentation layer.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::Intent;
///
/// let mut intent = Intent::new();
/// assert!(intent.is_empty());
///
/// intent.saturation(40.0);
/// assert!(!intent.is_empty());
/// assert!(intent.validate().is_ok());
///
/// intent.hue(400.0);
/// assert!(intent.validate().is_err());
/// ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub(crate) is_on: Option<bool>,
    pub(crate) hue: Option<f64>,
    pub(crate) saturation: Option<f64>,
    pub(crate) brightness: Option<f64>,
    pub(crate) color_temperature: Option<f64>,
}

impl Intent {
    /// Create a new empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.is_on.is_none()
            && self.hue.is_none()
            && self.saturation.is_none()
            && self.brightness.is_none()
            && self.color_temperature.is_none()
    }

    pub fn power(&mut self, on: bool) {
        self.is_on = Some(on);
    }

    /// Hue in degrees (0-360).
    pub fn hue(&mut self, hue: f64) {
        self.hue = Some(hue);
    }

    /// Saturation in percent (0-100).
    pub fn saturation(&mut self, saturation: f64) {
        self.saturation = Some(saturation);
    }

    /// Brightness in percent (0-100).
    pub fn brightness(&mut self, brightness: f64) {
        self.brightness = Some(brightness);
    }

    /// Color temperature in mired (140-500).
    pub fn color_temperature(&mut self, mired: f64) {
        self.color_temperature = Some(mired);
    }

    /// Combine with a later intent. Values set in `later` win, and a later
    /// hue or saturation drops an earlier color temperature and vice versa,
    /// the same way [`LightState::apply`] treats them.
    pub(crate) fn merge(&self, later: &Intent) -> Intent {
        let mut merged = *self;
        if later.hue.is_some() || later.saturation.is_some() {
            merged.color_temperature = None;
        }
        if later.color_temperature.is_some() {
            merged.hue = None;
            merged.saturation = None;
        }
        Intent {
            is_on: later.is_on.or(merged.is_on),
            hue: later.hue.or(merged.hue),
            saturation: later.saturation.or(merged.saturation),
            brightness: later.brightness.or(merged.brightness),
            color_temperature: later.color_temperature.or(merged.color_temperature),
        }
    }

    /// Reject values outside their domain.
    pub fn validate(&self) -> Result<()> {
        check("hue", self.hue, 0.0, 360.0)?;
        check("saturation", self.saturation, 0.0, 100.0)?;
        check("brightness", self.brightness, 0.0, 100.0)?;
        check("color temperature", self.color_temperature, Mired::MIN, Mired::MAX)
    }
}

impl From<PowerMode> for Intent {
    fn from(power: PowerMode) -> Self {
        Intent {
            is_on: Some(power.is_on()),
            ..Self::default()
        }
    }
}

fn check(field: &'static str, value: Option<f64>, min: f64, max: f64) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(Error::range(field, v, min, max)),
        _ => Ok(()),
    }
}

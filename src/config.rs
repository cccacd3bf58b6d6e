//! Controller configuration and LED profile detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::errors::Error;
use crate::types::OperatingMode;

type Result<T> = std::result::Result<T, Error>;

/// Saturation thresholds deciding when the color engine switches to white LEDs.
///
/// The JSON keys match the ones used by existing bridge configurations,
/// including their spelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    /// Below this saturation a color/white controller shows white instead of color.
    #[serde(rename = "colorWhiteThreshold")]
    pub color_white_threshold: f64,
    /// Below this saturation a simultaneous controller blends white into the color.
    #[serde(rename = "colorWhiteThresholdSimultaniousDevices")]
    pub color_white_threshold_simultaneous: f64,
    /// Below this saturation a simultaneous controller turns its color LEDs off.
    #[serde(rename = "colorOffThresholdSimultaniousDevices")]
    pub color_off_threshold_simultaneous: f64,
    /// Whether simultaneous controllers blend white in at all.
    #[serde(rename = "simultaniousDevicesColorWhite")]
    pub simultaneous_color_white: bool,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        ColorThresholds {
            color_white_threshold: 10.0,
            color_white_threshold_simultaneous: 50.0,
            color_off_threshold_simultaneous: 5.0,
            simultaneous_color_white: true,
        }
    }
}

/// Timers driving the command scheduler, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerTiming {
    /// Idle window coalescing rapid set calls into one command.
    pub debounce_ms: u64,
    /// Delay before the read-back following a write.
    pub consistency_delay_ms: u64,
    /// Delay between convergence polls while the device is busy.
    pub poll_interval_ms: u64,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        SchedulerTiming {
            debounce_ms: 20,
            consistency_delay_ms: 1000,
            poll_interval_ms: 500,
        }
    }
}

impl SchedulerTiming {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn consistency_delay(&self) -> Duration {
        Duration::from_millis(self.consistency_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything a [`DeviceController`](crate::DeviceController) needs besides the device identity.
///
/// # Examples
///
/// ```
/// use magichome_lights_rs::ControllerConfig;
///
/// let config = ControllerConfig::from_json(r#"{
///     "thresholds": { "colorWhiteThreshold": 15 },
///     "timing": { "debounceMs": 5 },
///     "queryAttempts": 5
/// }"#).unwrap();
///
/// assert_eq!(config.thresholds.color_white_threshold, 15.0);
/// assert_eq!(config.thresholds.color_off_threshold_simultaneous, 5.0);
/// assert_eq!(config.timing.debounce_ms, 5);
/// assert_eq!(config.query_attempts, 5);
/// assert_eq!(config.port, 5577);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub thresholds: ColorThresholds,
    pub timing: SchedulerTiming,
    /// TCP port of the controllers.
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// How long a set command waits for an (optional) reply.
    pub command_timeout_ms: u64,
    /// How long a status query waits for its reply.
    pub query_timeout_ms: u64,
    /// Query attempts before a device is marked offline.
    pub query_attempts: u32,
    /// Delay between re-probes of an offline device.
    pub reprobe_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            thresholds: ColorThresholds::default(),
            timing: SchedulerTiming::default(),
            port: crate::codec::PORT,
            connect_timeout_ms: 200,
            command_timeout_ms: 200,
            query_timeout_ms: 500,
            query_attempts: 3,
            reprobe_interval_ms: 5000,
        }
    }
}

impl ControllerConfig {
    /// Parse a configuration document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonLoad)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn reprobe_interval(&self) -> Duration {
        Duration::from_millis(self.reprobe_interval_ms)
    }
}

/// LED layout of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum LedProfile {
    /// Color LEDs only.
    Rgb,
    /// Color plus one white group, never lit together.
    Rgbw,
    /// Color plus warm and cold white groups, never lit together.
    Rgbww,
    /// Color plus warm and cold white groups that may be lit together.
    RgbwwSimultaneous,
    /// Warm and cold white only, driven with the dedicated CCT frame.
    Cct,
}

impl LedProfile {
    /// Classify a controller by the hardware-version byte of its status response.
    ///
    /// Unlisted hardware falls back to [`LedProfile::Rgbww`].
    ///
    /// ```
    /// use magichome_lights_rs::LedProfile;
    ///
    /// assert_eq!(LedProfile::from_hardware_version(0x25), LedProfile::RgbwwSimultaneous);
    /// assert_eq!(LedProfile::from_hardware_version(0x33), LedProfile::Rgb);
    /// assert_eq!(LedProfile::from_hardware_version(0x44), LedProfile::Rgbw);
    /// ```
    pub fn from_hardware_version(version: u8) -> Self {
        match version {
            0x08 | 0x33 | 0xA1 => LedProfile::Rgb,
            0x04 | 0x06 | 0x44 => LedProfile::Rgbw,
            0x35 => LedProfile::Rgbww,
            0x07 | 0x25 => LedProfile::RgbwwSimultaneous,
            0x09 | 0x1C | 0x52 | 0x62 => LedProfile::Cct,
            _ => LedProfile::Rgbww,
        }
    }

    /// Whether the controller has a separate cold white group.
    pub fn has_cold_white(&self) -> bool {
        matches!(
            self,
            LedProfile::Rgbww | LedProfile::RgbwwSimultaneous | LedProfile::Cct
        )
    }

    /// Whether the controller has any white LEDs.
    pub fn has_white(&self) -> bool {
        !matches!(self, LedProfile::Rgb)
    }

    /// Conversion mode for color (hue/saturation) intent.
    pub fn color_mode(&self) -> OperatingMode {
        match self {
            LedProfile::Rgb => OperatingMode::RgbMode,
            LedProfile::Rgbw | LedProfile::Rgbww => OperatingMode::Unknown,
            LedProfile::RgbwwSimultaneous => OperatingMode::Simultaneous,
            LedProfile::Cct => OperatingMode::TemperatureMode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = ControllerConfig::from_json("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_threshold_keys() {
        let thresholds: ColorThresholds = serde_json::from_str(
            r#"{
                "colorWhiteThreshold": 12,
                "colorWhiteThresholdSimultaniousDevices": 40,
                "colorOffThresholdSimultaniousDevices": 3,
                "simultaniousDevicesColorWhite": false
            }"#,
        )
        .unwrap();
        assert_eq!(thresholds.color_white_threshold, 12.0);
        assert_eq!(thresholds.color_white_threshold_simultaneous, 40.0);
        assert_eq!(thresholds.color_off_threshold_simultaneous, 3.0);
        assert!(!thresholds.simultaneous_color_white);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            ControllerConfig::from_json("{\"port\": \"x\"}"),
            Err(Error::JsonLoad(_))
        ));
    }

    #[test]
    fn test_profiles_cover_every_mode() {
        let modes: Vec<OperatingMode> = LedProfile::iter().map(|p| p.color_mode()).collect();
        assert!(modes.contains(&OperatingMode::RgbMode));
        assert!(modes.contains(&OperatingMode::TemperatureMode));
        assert!(modes.contains(&OperatingMode::Simultaneous));
        assert!(modes.contains(&OperatingMode::Unknown));
        assert!(!LedProfile::Rgb.has_white());
        assert!(!LedProfile::Rgbw.has_cold_white());
        assert!(LedProfile::Cct.has_cold_white());
    }
}

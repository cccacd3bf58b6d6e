//! Channel mask byte and the operating mode derived from it.

use serde::{Deserialize, Serialize};

/// The wire byte selecting which LED group a color command activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelMask(pub(crate) u8);

impl Default for ChannelMask {
    fn default() -> Self {
        ChannelMask(0x00)
    }
}

impl ChannelMask {
    /// Color LEDs only.
    pub const COLOR: ChannelMask = ChannelMask(0xF0);
    /// White LEDs only.
    pub const WHITE: ChannelMask = ChannelMask(0x0F);
    /// Color and white LEDs together.
    pub const BOTH: ChannelMask = ChannelMask(0xFF);

    pub fn new(byte: u8) -> Self {
        ChannelMask(byte)
    }

    pub fn byte(&self) -> u8 {
        self.0
    }

    /// # Examples
    ///
    /// ```
    /// use magichome_lights_rs::{ChannelMask, OperatingMode};
    ///
    /// assert_eq!(ChannelMask::COLOR.operating_mode(), OperatingMode::RgbMode);
    /// assert_eq!(ChannelMask::WHITE.operating_mode(), OperatingMode::TemperatureMode);
    /// assert_eq!(ChannelMask::BOTH.operating_mode(), OperatingMode::Simultaneous);
    /// assert_eq!(ChannelMask::new(0x42).operating_mode(), OperatingMode::Unknown);
    /// ```
    pub fn operating_mode(&self) -> OperatingMode {
        match self.0 {
            0xF0 => OperatingMode::RgbMode,
            0x0F => OperatingMode::TemperatureMode,
            0xFF => OperatingMode::Simultaneous,
            _ => OperatingMode::Unknown,
        }
    }
}

/// Which LED group is authoritative for a light.
///
/// As a conversion mode it also picks the path the color engine takes:
/// `RgbMode` is the color-only path, `TemperatureMode` the white-curve path,
/// `Simultaneous` allows color and white together, and `Unknown` lets the
/// engine choose between color and white from the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingMode {
    RgbMode,
    TemperatureMode,
    Simultaneous,
    Unknown,
}

//! White LED channel control.

use serde::{Deserialize, Serialize};

/// Warm and cold white LED levels (0-255 each).
///
/// RGBW and RGBWW controllers drive separate white LED groups next to the
/// color LEDs. Single-white controllers only use the warm channel.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct WhiteValues {
    pub(crate) warm_white: u8,
    pub(crate) cold_white: u8,
}

impl WhiteValues {
    pub fn new(warm_white: u8, cold_white: u8) -> Self {
        WhiteValues {
            warm_white,
            cold_white,
        }
    }

    pub fn warm_white(&self) -> u8 {
        self.warm_white
    }

    pub fn cold_white(&self) -> u8 {
        self.cold_white
    }

    /// Returns `true` when both white groups are dark.
    pub fn is_zero(&self) -> bool {
        self.warm_white == 0 && self.cold_white == 0
    }
}

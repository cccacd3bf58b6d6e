//! RGB channel values as sent on the wire.

use serde::{Deserialize, Serialize};

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Rgb {
    /// Create a color with the given RGB values.
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// Returns `true` when every color LED is dark.
    pub fn is_zero(&self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }

    pub(crate) fn max(&self) -> u8 {
        self.red.max(self.green).max(self.blue)
    }

    pub(crate) fn min(&self) -> u8 {
        self.red.min(self.green).min(self.blue)
    }
}

//! Hue, saturation and luminance as seen by the presentation layer.

use serde::{Deserialize, Serialize};

/// Hue and saturation of a light, plus the luminance of its last native color.
///
/// - Hue: the color angle on the color wheel (0-360 degrees)
/// - Saturation: the intensity of the color (0-100 percent)
/// - Luminance: HSL lightness of the emitted RGB (0-100 percent), informational
///
/// Values are kept as `f64` so that colors read back from a controller survive
/// a round trip to the wire without drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub(crate) hue: f64,
    pub(crate) saturation: f64,
    pub(crate) luminance: f64,
}

impl Default for Hsl {
    fn default() -> Self {
        Hsl {
            hue: 0.0,
            saturation: 0.0,
            luminance: 50.0,
        }
    }
}

impl Hsl {
    /// Hue/saturation pair the engine treats as "warm white".
    pub const WARM_WHITE: (f64, f64) = (31.0, 33.0);
    /// Hue/saturation pair the engine treats as "cold white".
    pub const COLD_WHITE: (f64, f64) = (208.0, 17.0);
    /// Hue/saturation pair the engine treats as neutral white (both white groups).
    pub const NEUTRAL_WHITE: (f64, f64) = (0.0, 0.0);

    /// Create a new Hsl with the given hue and saturation.
    ///
    /// Returns `None` if values are outside valid ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_lights_rs::Hsl;
    ///
    /// assert!(Hsl::create(0.0, 100.0).is_some());
    /// assert!(Hsl::create(120.5, 50.0).is_some());
    /// assert!(Hsl::create(361.0, 50.0).is_none());
    /// assert!(Hsl::create(180.0, 101.0).is_none());
    /// assert!(Hsl::create(f64::NAN, 10.0).is_none());
    /// ```
    pub fn create(hue: f64, saturation: f64) -> Option<Self> {
        if (0.0..=360.0).contains(&hue) && (0.0..=100.0).contains(&saturation) {
            Some(Hsl {
                hue,
                saturation,
                ..Self::default()
            })
        } else {
            None
        }
    }

    pub(crate) fn from_parts(hue: f64, saturation: f64, luminance: f64) -> Self {
        Hsl {
            hue,
            saturation,
            luminance,
        }
    }

    pub(crate) fn from_pair((hue, saturation): (f64, f64)) -> Self {
        Hsl {
            hue,
            saturation,
            ..Self::default()
        }
    }

    /// Get the hue value.
    pub fn hue(&self) -> f64 {
        self.hue
    }

    /// Get the saturation value.
    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Get the luminance value.
    pub fn luminance(&self) -> f64 {
        self.luminance
    }

    pub(crate) fn with_hue(self, hue: f64) -> Self {
        Hsl { hue, ..self }
    }

    pub(crate) fn with_saturation(self, saturation: f64) -> Self {
        Hsl { saturation, ..self }
    }

    /// Whether hue and saturation name the given marker pair.
    pub(crate) fn is_marker(&self, (hue, saturation): (f64, f64)) -> bool {
        (self.hue - hue).abs() < 0.5 && (self.saturation - saturation).abs() < 0.5
    }
}

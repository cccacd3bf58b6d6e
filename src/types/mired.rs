//! Color temperature control.

use serde::{Deserialize, Serialize};

/// Color temperature in mired (micro reciprocal degrees), from 140 to 500.
///
/// Lower values are cooler (more blue) light, higher values warmer (more
/// yellow/orange). 140 mired is roughly 7100K, 500 mired is 2000K.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, PartialOrd)]
pub struct Mired(pub(crate) f64);

impl Default for Mired {
    fn default() -> Self {
        Mired(Self::NEUTRAL)
    }
}

impl Mired {
    pub const MIN: f64 = 140.0;
    pub const MAX: f64 = 500.0;
    const NEUTRAL: f64 = (Self::MIN + Self::MAX) / 2.0;

    /// Get the mired value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Create a new Mired with the given value.
    ///
    /// Returns `None` if value is outside the valid range (140-500).
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_lights_rs::Mired;
    ///
    /// assert!(Mired::create(139.0).is_none());
    /// assert!(Mired::create(140.0).is_some());
    /// assert!(Mired::create(500.0).is_some());
    /// assert!(Mired::create(500.5).is_none());
    /// ```
    pub fn create(value: f64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Mired(value))
        } else {
            None
        }
    }

    /// Share of the cold white group, from 0.0 (warmest) to 1.0 (coldest).
    pub fn cold_ratio(&self) -> f64 {
        (Self::MAX - self.0) / (Self::MAX - Self::MIN)
    }

    pub(crate) fn from_cold_ratio(ratio: f64) -> Self {
        Self::clamped(Self::MAX - ratio * (Self::MAX - Self::MIN))
    }

    pub(crate) fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Mired(value.clamp(Self::MIN, Self::MAX))
    }
}
